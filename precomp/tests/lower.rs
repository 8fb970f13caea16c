mod common;

use precomp::Project;
use precomp::code::{Arg, Builtin, Expr, Parser, Script, Stmt};
use precomp::compile::{BlockCompiler, CompiledBody, Compiler, TargetResults};
use serde_json::{Value, json};

use common::{counting_blocks, counting_project, flag_script, nested_warp_blocks, project, sprite, stage};

fn compile_sprite(blocks: Value) -> TargetResults {
    let project: Project = project(json!({ "targets": [stage(), sprite("Sprite1", blocks)] }));
    BlockCompiler.compile_target(&project.targets[1])
}

fn hat_script(results: &TargetResults, hat: &str) -> Script {
    match &results.hats[hat].result {
        Ok(CompiledBody::Function(script)) => script.clone(),
        other => panic!("expected a compiled function for `{hat}`, got {other:?}"),
    }
}

fn hat_failure(results: &TargetResults, hat: &str) -> String {
    match &results.hats[hat].result {
        Err(failure) => failure.reason.clone(),
        Ok(body) => panic!("expected `{hat}` to fail, got {body:?}"),
    }
}

fn procedure_script(results: &TargetResults, index: usize) -> Script {
    match &results.procedures[index].result {
        Ok(CompiledBody::Source(text)) => Parser::new(text.as_str(), 0)
            .parse_script()
            .expect("procedure source parses"),
        other => panic!("expected procedure source, got {other:?}"),
    }
}

fn say(message: Expr) -> Stmt {
    Stmt::Op {
        opcode: "looks_say".to_string(),
        args: vec![Arg {
            name: "MESSAGE".to_string(),
            value: message,
        }],
    }
}

fn text(s: &str) -> Expr {
    Expr::Text(s.to_string())
}

// ---------------------------------------------------------------------------
// Scripts
// ---------------------------------------------------------------------------

#[test]
fn counting_hat() {
    let results = compile_sprite(counting_blocks());
    assert_eq!(results.hats.len(), 1);
    assert_eq!(results.procedures.len(), 1);

    let script = hat_script(&results, "flag");
    assert!(script.params.is_empty());
    assert_eq!(
        script.body,
        vec![
            Stmt::Set {
                var: "counter".to_string(),
                value: text("0"),
            },
            Stmt::Repeat {
                times: Expr::Number(3.0),
                body: vec![
                    Stmt::Change {
                        var: "counter".to_string(),
                        by: Expr::Number(1.0),
                    },
                    say(Expr::Builtin {
                        op: Builtin::Join,
                        args: vec![text("n"), Expr::Var("counter".to_string())],
                    }),
                    Stmt::Yield,
                ],
            },
            Stmt::Call {
                signature: "Zadd %s".to_string(),
                args: vec![Expr::Var("counter".to_string())],
            },
        ]
    );
}

#[test]
fn counting_procedure() {
    let results = compile_sprite(counting_blocks());
    assert_eq!(results.procedures[0].top_block_id, "def");
    let script = procedure_script(&results, 0);
    assert_eq!(script.params, vec!["amount".to_string()]);
    assert_eq!(
        script.body,
        vec![
            Stmt::Change {
                var: "total".to_string(),
                by: Expr::Param("amount".to_string()),
            },
            say(Expr::Param("amount".to_string())),
        ]
    );
}

#[test]
fn warp_call_and_loops() {
    let mut blocks = counting_blocks();
    blocks["proto"]["mutation"]["warp"] = json!("true");
    blocks["padd"]["next"] = json!("loop");
    blocks["psay"]["parent"] = json!("loop");
    blocks["loop"] = json!({
        "opcode": "control_forever", "next": null, "parent": "padd",
        "inputs": { "SUBSTACK": [2, "psay"] }, "fields": {}, "shadow": false, "topLevel": false
    });

    let results = compile_sprite(blocks);
    let hat = hat_script(&results, "flag");
    assert!(matches!(&hat.body[2], Stmt::Call { signature, .. } if signature == "Wadd %s"));

    let procedure = procedure_script(&results, 0);
    let stuck_check = Stmt::If {
        cond: Expr::Helper {
            name: "is_stuck".to_string(),
            args: Vec::new(),
        },
        then: vec![Stmt::Yield],
        otherwise: Vec::new(),
    };
    assert_eq!(
        procedure.body[1],
        Stmt::Forever {
            body: vec![say(Expr::Param("amount".to_string())), stuck_check],
        }
    );
}

#[test]
fn calls_from_warp_bodies_are_warp() {
    let results = compile_sprite(nested_warp_blocks());
    let hat = hat_script(&results, "flag");
    assert!(matches!(&hat.body[0], Stmt::Call { signature, .. } if signature == "Wouter"));

    // `inner` is not warp itself, but its caller is.
    assert_eq!(results.procedures[0].top_block_id, "def_outer");
    let outer = procedure_script(&results, 0);
    assert_eq!(
        outer.body,
        vec![Stmt::Call {
            signature: "Winner".to_string(),
            args: Vec::new(),
        }]
    );

    // Its own loop still yields every iteration when called normally.
    let inner = procedure_script(&results, 1);
    assert!(matches!(&inner.body[0], Stmt::Repeat { body, .. } if body.last() == Some(&Stmt::Yield)));
}

#[test]
fn stop_this_script_returns() {
    let results = compile_sprite(flag_script(&[(
        "control_stop",
        json!({}),
        json!({ "STOP_OPTION": ["this script", null] }),
    )]));
    assert_eq!(hat_script(&results, "hat").body, vec![Stmt::Return(None)]);
}

#[test]
fn stop_all_stays_an_operation() {
    let results = compile_sprite(flag_script(&[(
        "control_stop",
        json!({}),
        json!({ "STOP_OPTION": ["all", null] }),
    )]));
    assert_eq!(
        hat_script(&results, "hat").body,
        vec![Stmt::Op {
            opcode: "control_stop".to_string(),
            args: vec![Arg {
                name: "STOP_OPTION".to_string(),
                value: text("all"),
            }],
        }]
    );
}

#[test]
fn empty_hat_compiles_to_empty_body() {
    let results = compile_sprite(flag_script(&[]));
    assert!(hat_script(&results, "hat").body.is_empty());
}

// ---------------------------------------------------------------------------
// Reporters
// ---------------------------------------------------------------------------

#[test]
fn modulo_and_comparisons_use_helpers() {
    let mut blocks = flag_script(&[(
        "data_setvariableto",
        json!({ "VALUE": [3, "mod", [10, ""]] }),
        json!({ "VARIABLE": ["x", "var-x"] }),
    )]);
    blocks["mod"] = json!({
        "opcode": "operator_mod", "next": null, "parent": "b0",
        "inputs": { "NUM1": [1, [4, "7"]], "NUM2": [3, "eq", [4, ""]] },
        "fields": {}, "shadow": false, "topLevel": false
    });
    blocks["eq"] = json!({
        "opcode": "operator_equals", "next": null, "parent": "mod",
        "inputs": { "OPERAND1": [1, [10, "a"]], "OPERAND2": [1, [10, "A"]] },
        "fields": {}, "shadow": false, "topLevel": false
    });

    let script = hat_script(&compile_sprite(blocks), "hat");
    let Stmt::Set { value, .. } = &script.body[0] else {
        panic!("expected set, got {:?}", script.body[0]);
    };
    assert_eq!(
        *value,
        Expr::Helper {
            name: "modulo".to_string(),
            args: vec![
                Expr::Number(7.0),
                Expr::Helper {
                    name: "compare_equal".to_string(),
                    args: vec![text("a"), text("A")],
                },
            ],
        }
    );
}

#[test]
fn unknown_reporter_becomes_report() {
    let mut blocks = flag_script(&[("looks_say", json!({ "MESSAGE": [3, "answer", [10, ""]] }), json!({}))]);
    blocks["answer"] = json!({
        "opcode": "sensing_of", "next": null, "parent": "b0",
        "inputs": { "OBJECT": [1, [10, "_stage_"]] },
        "fields": { "PROPERTY": ["backdrop #", null] },
        "shadow": false, "topLevel": false
    });

    let script = hat_script(&compile_sprite(blocks), "hat");
    assert_eq!(
        script.body[0],
        say(Expr::Report {
            opcode: "sensing_of".to_string(),
            args: vec![
                Arg {
                    name: "OBJECT".to_string(),
                    value: text("_stage_"),
                },
                Arg {
                    name: "PROPERTY".to_string(),
                    value: text("backdrop #"),
                },
            ],
        })
    );
}

#[test]
fn non_numeric_number_slot_stays_text() {
    let results = compile_sprite(flag_script(&[(
        "control_repeat",
        json!({ "TIMES": [1, [4, "lots"]] }),
        json!({}),
    )]));
    let script = hat_script(&results, "hat");
    assert!(matches!(&script.body[0], Stmt::Repeat { times, .. } if *times == text("lots")));
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn unsupported_c_block_fails() {
    let results = compile_sprite(flag_script(&[(
        "control_for_each",
        json!({ "SUBSTACK": [2, null], "VALUE": [1, [6, "3"]] }),
        json!({ "VARIABLE": ["i", "var-i"] }),
    )]));
    assert_eq!(hat_failure(&results, "hat"), "unsupported C block `control_for_each`");
}

#[test]
fn list_input_fails() {
    let results = compile_sprite(flag_script(&[(
        "looks_say",
        json!({ "MESSAGE": [3, [13, "things", "list-id"], [10, ""]] }),
        json!({}),
    )]));
    assert_eq!(hat_failure(&results, "hat"), "list inputs are not supported");
}

#[test]
fn dangling_reference_fails() {
    let mut blocks = flag_script(&[("looks_say", json!({}), json!({}))]);
    blocks["b0"]["next"] = json!("ghost");
    let results = compile_sprite(blocks);
    assert_eq!(hat_failure(&results, "hat"), "dangling block reference `ghost`");
}

#[test]
fn definition_without_prototype_fails() {
    let mut blocks = counting_blocks();
    blocks["def"]["inputs"] = json!({});
    let results = compile_sprite(blocks);
    let failure = results.procedures[0].result.as_ref().expect_err("no prototype");
    assert_eq!(failure.reason, "procedure definition has no prototype");
    // the hat is unaffected
    assert!(results.hats["flag"].success());
}

#[test]
fn stage_without_blocks_has_no_units() {
    let project = counting_project();
    let results = BlockCompiler.compile_target(&project.targets[0]);
    assert_eq!(results.units().count(), 0);
}

#[test]
fn runtime_helpers_parse() {
    let helpers = BlockCompiler.runtime_helpers();
    assert!(helpers.contains_key("modulo"));
    for (name, source) in &helpers {
        let helper = Parser::new(source.as_str(), 0).parse_helper().expect("helper parses");
        assert_eq!(&helper.name, name);
    }
}
