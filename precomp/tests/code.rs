use precomp::code::{Builtin, Expr, Parser, Script, Stmt, minify};

fn parse(source: &str) -> Script {
    Parser::new(source, 0)
        .parse_script()
        .unwrap_or_else(|e| panic!("failed to parse: {e}\n{source}"))
}

fn parse_err(source: &str) -> precomp::code::ParseError {
    match Parser::new(source, 0).parse_script() {
        Ok(script) => panic!("expected a parse error, got {script:?}"),
        Err(e) => e,
    }
}

const COUNTER: &str = r#"
; count to ten, yielding between steps
(script ("limit")
  (set "i" 0)
  (until (helper greater_than (get "i") (param "limit"))
    (change "i" 1)
    (op "looks_say" ("MESSAGE" (join "i = " (get "i"))))
    (yield))
  (if (== (get "i") 11)
    (then (return (get "i")))
    (else (call "Zreport %s" (get "i")))))
"#;

// ---------------------------------------------------------------------------
// Grammar
// ---------------------------------------------------------------------------

#[test]
fn script_shape() {
    let script = parse(COUNTER);
    assert_eq!(script.params, vec!["limit".to_string()]);
    assert_eq!(script.body.len(), 3);
    assert_eq!(
        script.body[0],
        Stmt::Set {
            var: "i".to_string(),
            value: Expr::Number(0.0)
        }
    );
    let Stmt::Until { cond, body } = &script.body[1] else {
        panic!("expected an until loop, got {:?}", script.body[1]);
    };
    assert_eq!(cond.helper_names(), vec!["greater_than".to_string()]);
    assert_eq!(body.len(), 3);
    assert_eq!(body[2], Stmt::Yield);
    assert!(matches!(&script.body[2], Stmt::If { then, otherwise, .. }
        if then.len() == 1 && otherwise.len() == 1));
}

#[test]
fn builtin_operators() {
    let script = parse(r#"(script () (set "x" (? (and true (not false)) (% 7 3) (cmp "a" "B"))))"#);
    let Stmt::Set { value, .. } = &script.body[0] else {
        panic!("expected set");
    };
    let Expr::Choose { cond, then, .. } = value else {
        panic!("expected a choice, got {value:?}");
    };
    assert!(matches!(**cond, Expr::Builtin { op: Builtin::And, .. }));
    assert_eq!(
        **then,
        Expr::Builtin {
            op: Builtin::Rem,
            args: vec![Expr::Number(7.0), Expr::Number(3.0)]
        }
    );
}

#[test]
fn empty_params_and_body() {
    let script = parse("(script ())");
    assert!(script.params.is_empty());
    assert!(script.body.is_empty());
}

#[test]
fn helper_names_are_collected_once() {
    let script = parse(
        r#"(script ()
             (set "a" (helper modulo (helper modulo 1 2) 3))
             (repeat (helper is_stuck) (set "b" 1)))"#,
    );
    assert_eq!(script.helper_names(), vec!["modulo".to_string(), "is_stuck".to_string()]);
}

#[test]
fn helper_definition() {
    let helper = Parser::new(r#"(helper twice ("n") (* (param "n") 2))"#, 0)
        .parse_helper()
        .expect("helper parses");
    assert_eq!(helper.name, "twice");
    assert_eq!(helper.params, vec!["n".to_string()]);
    assert_eq!(
        helper.body,
        Expr::Builtin {
            op: Builtin::Mul,
            args: vec![Expr::Param("n".to_string()), Expr::Number(2.0)]
        }
    );
}

#[test]
fn bootstrap_document() {
    let document = r#"; notice line
(bootstrap "1.2.3"
  (helper one () 1)
  (helper two () 2))"#;
    let bootstrap = Parser::new(document, 0).parse_bootstrap().expect("bootstrap parses");
    assert_eq!(bootstrap.version, "1.2.3");
    let names: Vec<_> = bootstrap.helpers.iter().map(|h| h.name.as_str()).collect();
    assert_eq!(names, ["one", "two"]);
}

// ---------------------------------------------------------------------------
// Printing
// ---------------------------------------------------------------------------

#[test]
fn printed_script_parses_back() {
    let script = parse(COUNTER);
    let printed = script.to_string();
    assert_eq!(parse(&printed), script);
}

#[test]
fn printed_text_escapes_parse_back() {
    let script = parse(r#"(script () (set "quote" "say \"hi\"\n\\ done"))"#);
    assert_eq!(parse(&script.to_string()), script);
}

#[test]
fn minify_drops_comments_and_whitespace() {
    let small = minify(COUNTER).expect("minifies");
    assert!(!small.contains(';'));
    assert!(!small.contains('\n'));
    assert!(small.len() < COUNTER.len());
    assert_eq!(parse(&small), parse(COUNTER));
}

#[test]
fn minify_keeps_adjacent_words_apart() {
    let small = minify(r#"(set "x" (+ 1 2))"#).expect("minifies");
    assert_eq!(small, r#"(set"x"(+ 1 2))"#);
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn unclosed_list_points_at_the_paren() {
    let err = parse_err("  (script ()");
    assert_eq!(err.message, "unclosed list");
    assert_eq!(err.span, 2..3);
    assert!(!err.notes.is_empty());
}

#[test]
fn unknown_statement_points_at_the_keyword() {
    let source = r#"(script () (launch "rocket"))"#;
    let err = parse_err(source);
    assert_eq!(err.message, "unknown statement `launch`");
    assert_eq!(&source[err.span.clone()], "launch");
}

#[test]
fn wrong_arity_is_rejected() {
    let err = parse_err(r#"(script () (set "x" (+ 1)))"#);
    assert!(err.message.contains("wrong number of operands"), "{}", err.message);
}

#[test]
fn several_top_level_forms_are_rejected() {
    let err = parse_err("(script ()) (script ())");
    assert_eq!(err.message, "expected a single top-level form");
    assert_eq!(err.span.start, 12);
}

#[test]
fn yield_takes_no_operands() {
    let err = parse_err("(script () (yield 1))");
    assert_eq!(err.message, "yield takes no operands");
}

#[test]
fn diagnostic_carries_label_and_notes() {
    let err = parse_err("(script () (nope))");
    let diagnostic = err.to_diagnostic();
    assert_eq!(diagnostic.message, "unknown statement `nope`");
    assert_eq!(diagnostic.labels.len(), 1);
    assert_eq!(diagnostic.labels[0].range, err.span);
    assert_eq!(diagnostic.notes, err.notes);
}
