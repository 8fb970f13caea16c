#![allow(dead_code)]

use std::rc::Rc;

use precomp::compile::{BlockCompiler, Compiler};
use precomp::rebuild::payload::{bootstrap_source, data_url};
use precomp::{MARKER_OPCODE, Project, SHIM_ID, VERSION};
use runtime::host::ManualClock;
use runtime::{Capabilities, Runtime};
use serde_json::{Value, json};

pub fn project(value: Value) -> Project {
    serde_json::from_value(value).expect("fixture is a valid descriptor")
}

/// Green flag: set counter to 0, repeat 3 { change counter by 1, say
/// (join "n" counter) }, then call `add %s` with counter. `add %s` adds its
/// argument to total and says it.
pub fn counting_blocks() -> Value {
    json!({
        "flag": {
            "opcode": "event_whenflagclicked", "next": "set", "parent": null,
            "inputs": {}, "fields": {}, "shadow": false, "topLevel": true, "x": 0, "y": 0
        },
        "set": {
            "opcode": "data_setvariableto", "next": "rep", "parent": "flag",
            "inputs": { "VALUE": [1, [10, "0"]] },
            "fields": { "VARIABLE": ["counter", "var-counter"] },
            "shadow": false, "topLevel": false
        },
        "rep": {
            "opcode": "control_repeat", "next": "call", "parent": "set",
            "inputs": { "TIMES": [1, [4, "3"]], "SUBSTACK": [2, "chg"] },
            "fields": {}, "shadow": false, "topLevel": false
        },
        "chg": {
            "opcode": "data_changevariableby", "next": "say", "parent": "rep",
            "inputs": { "VALUE": [1, [4, "1"]] },
            "fields": { "VARIABLE": ["counter", "var-counter"] },
            "shadow": false, "topLevel": false
        },
        "say": {
            "opcode": "looks_say", "next": null, "parent": "chg",
            "inputs": { "MESSAGE": [3, "join", [10, "hi"]] },
            "fields": {}, "shadow": false, "topLevel": false
        },
        "join": {
            "opcode": "operator_join", "next": null, "parent": "say",
            "inputs": {
                "STRING1": [1, [10, "n"]],
                "STRING2": [3, [12, "counter", "var-counter"], [10, ""]]
            },
            "fields": {}, "shadow": false, "topLevel": false
        },
        "call": {
            "opcode": "procedures_call", "next": null, "parent": "rep",
            "inputs": { "arg1": [3, [12, "counter", "var-counter"], [10, ""]] },
            "fields": {}, "shadow": false, "topLevel": false,
            "mutation": {
                "tagName": "mutation", "children": [],
                "proccode": "add %s", "argumentids": "[\"arg1\"]", "warp": "false"
            }
        },
        "def": {
            "opcode": "procedures_definition", "next": "padd", "parent": null,
            "inputs": { "custom_block": [1, "proto"] },
            "fields": {}, "shadow": false, "topLevel": true, "x": 400, "y": 40
        },
        "proto": {
            "opcode": "procedures_prototype", "next": null, "parent": "def",
            "inputs": { "arg1": [1, "argrep"] },
            "fields": {}, "shadow": true, "topLevel": false,
            "mutation": {
                "tagName": "mutation", "children": [],
                "proccode": "add %s", "argumentids": "[\"arg1\"]",
                "argumentnames": "[\"amount\"]", "argumentdefaults": "[\"\"]", "warp": "false"
            }
        },
        "argrep": {
            "opcode": "argument_reporter_string_number", "next": null, "parent": "proto",
            "inputs": {}, "fields": { "VALUE": ["amount", null] },
            "shadow": true, "topLevel": false
        },
        "padd": {
            "opcode": "data_changevariableby", "next": "psay", "parent": "def",
            "inputs": { "VALUE": [3, "argrep2", [4, "0"]] },
            "fields": { "VARIABLE": ["total", "var-total"] },
            "shadow": false, "topLevel": false
        },
        "argrep2": {
            "opcode": "argument_reporter_string_number", "next": null, "parent": "padd",
            "inputs": {}, "fields": { "VALUE": ["amount", null] },
            "shadow": false, "topLevel": false
        },
        "psay": {
            "opcode": "looks_say", "next": null, "parent": "padd",
            "inputs": { "MESSAGE": [3, "argrep3", [10, ""]] },
            "fields": {}, "shadow": false, "topLevel": false
        },
        "argrep3": {
            "opcode": "argument_reporter_string_number", "next": null, "parent": "psay",
            "inputs": {}, "fields": { "VALUE": ["amount", null] },
            "shadow": false, "topLevel": false
        }
    })
}

/// Green flag calls warp procedure `outer`, which calls the non-warp
/// procedure `inner`: repeat 5 { change x by 1 }.
pub fn nested_warp_blocks() -> Value {
    json!({
        "flag": {
            "opcode": "event_whenflagclicked", "next": "call_outer", "parent": null,
            "inputs": {}, "fields": {}, "shadow": false, "topLevel": true, "x": 0, "y": 0
        },
        "call_outer": {
            "opcode": "procedures_call", "next": null, "parent": "flag",
            "inputs": {}, "fields": {}, "shadow": false, "topLevel": false,
            "mutation": { "proccode": "outer", "argumentids": "[]", "warp": "true" }
        },
        "def_outer": {
            "opcode": "procedures_definition", "next": "call_inner", "parent": null,
            "inputs": { "custom_block": [1, "proto_outer"] },
            "fields": {}, "shadow": false, "topLevel": true, "x": 300, "y": 0
        },
        "proto_outer": {
            "opcode": "procedures_prototype", "next": null, "parent": "def_outer",
            "inputs": {}, "fields": {}, "shadow": true, "topLevel": false,
            "mutation": { "proccode": "outer", "argumentids": "[]", "argumentnames": "[]", "warp": "true" }
        },
        "call_inner": {
            "opcode": "procedures_call", "next": null, "parent": "def_outer",
            "inputs": {}, "fields": {}, "shadow": false, "topLevel": false,
            "mutation": { "proccode": "inner", "argumentids": "[]", "warp": "false" }
        },
        "def_inner": {
            "opcode": "procedures_definition", "next": "rep", "parent": null,
            "inputs": { "custom_block": [1, "proto_inner"] },
            "fields": {}, "shadow": false, "topLevel": true, "x": 300, "y": 200
        },
        "proto_inner": {
            "opcode": "procedures_prototype", "next": null, "parent": "def_inner",
            "inputs": {}, "fields": {}, "shadow": true, "topLevel": false,
            "mutation": { "proccode": "inner", "argumentids": "[]", "argumentnames": "[]", "warp": "false" }
        },
        "rep": {
            "opcode": "control_repeat", "next": null, "parent": "def_inner",
            "inputs": { "TIMES": [1, [4, "5"]], "SUBSTACK": [2, "chg"] },
            "fields": {}, "shadow": false, "topLevel": false
        },
        "chg": {
            "opcode": "data_changevariableby", "next": null, "parent": "rep",
            "inputs": { "VALUE": [1, [4, "1"]] },
            "fields": { "VARIABLE": ["x", "var-x"] },
            "shadow": false, "topLevel": false
        }
    })
}

pub fn stage() -> Value {
    json!({
        "isStage": true,
        "name": "Stage",
        "variables": {
            "var-counter": ["counter", 0],
            "var-total": ["total", 0],
            "var-x": ["x", 0],
            "var-after": ["after", 0],
            "var-result": ["result", 0]
        },
        "blocks": {},
        "comments": {}
    })
}

pub fn sprite(name: &str, blocks: Value) -> Value {
    json!({
        "isStage": false,
        "name": name,
        "variables": {},
        "blocks": blocks,
        "comments": {}
    })
}

pub fn counting_project() -> Project {
    project(json!({
        "targets": [stage(), sprite("Sprite1", counting_blocks())],
        "extensions": [],
        "meta": { "semver": "3.0.0" }
    }))
}

/// A lone green-flag hat with `body` as its script, ids `hat`, `b0`, `b1`...
pub fn flag_script(body: &[(&str, Value, Value)]) -> Value {
    let mut blocks = serde_json::Map::new();
    let first = if body.is_empty() { Value::Null } else { json!("b0") };
    blocks.insert(
        "hat".to_string(),
        json!({
            "opcode": "event_whenflagclicked", "next": first, "parent": null,
            "inputs": {}, "fields": {}, "shadow": false, "topLevel": true, "x": 10, "y": 10
        }),
    );
    for (i, (opcode, inputs, fields)) in body.iter().enumerate() {
        let parent = if i == 0 { json!("hat") } else { json!(format!("b{}", i - 1)) };
        let next = if i + 1 < body.len() {
            json!(format!("b{}", i + 1))
        } else {
            Value::Null
        };
        blocks.insert(
            format!("b{i}"),
            json!({
                "opcode": opcode, "next": next, "parent": parent,
                "inputs": inputs, "fields": fields, "shadow": false, "topLevel": false
            }),
        );
    }
    Value::Object(blocks)
}

// ---------------------------------------------------------------------------
// Runtime helpers
// ---------------------------------------------------------------------------

pub const SPRITE: usize = 1;

pub fn unsandboxed() -> Capabilities {
    Capabilities { unsandboxed: true }
}

/// The shim's extension URL, carrying the reference compiler's helpers.
pub fn shim_url() -> String {
    data_url(&bootstrap_source(&BlockCompiler.runtime_helpers(), VERSION, true))
}

pub fn marker_block(parent: &str, source: &str) -> Value {
    json!({
        "opcode": MARKER_OPCODE, "next": null, "parent": parent,
        "inputs": { "CODE": [1, [10, source]] },
        "fields": {}, "shadow": false, "topLevel": false
    })
}

/// One green-flag hat per source, each followed by a marker carrying it.
pub fn compiled_blocks(scripts: &[&str]) -> Value {
    let mut blocks = serde_json::Map::new();
    for (i, source) in scripts.iter().enumerate() {
        let hat = format!("hat{i}");
        let marker = format!("m{i}");
        blocks.insert(
            hat.clone(),
            json!({
                "opcode": "event_whenflagclicked", "next": marker, "parent": null,
                "inputs": {}, "fields": {}, "shadow": false, "topLevel": true,
                "x": 0, "y": i * 150
            }),
        );
        blocks.insert(marker, marker_block(&hat, source));
    }
    Value::Object(blocks)
}

/// A program whose sprite carries `blocks`, with the shim injected.
pub fn with_shim(blocks: Value) -> Project {
    let mut project = project(json!({ "targets": [stage(), sprite("Sprite1", blocks)] }));
    project.extensions.push(SHIM_ID.to_string());
    project.extension_urls.insert(SHIM_ID.to_string(), shim_url());
    project
}

pub fn compiled_project(scripts: &[&str]) -> Project {
    with_shim(compiled_blocks(scripts))
}

/// Load unsandboxed on a clock that only moves when the test says so.
pub fn load(project: &Project) -> (Runtime, Rc<ManualClock>) {
    let clock = Rc::new(ManualClock::new());
    let runtime = runtime::load_project_with_clock(project, unsandboxed(), clock.clone()).expect("shim installs");
    (runtime, clock)
}

pub fn started(project: &Project) -> (Runtime, Rc<ManualClock>) {
    let (mut runtime, clock) = load(project);
    runtime.green_flag();
    (runtime, clock)
}

pub fn var(runtime: &Runtime, name: &str) -> runtime::Value {
    runtime.variable(SPRITE, name)
}

pub fn said(runtime: &Runtime) -> Vec<String> {
    runtime.targets[SPRITE].said.clone()
}
