mod common;

use std::rc::Rc;
use std::time::Duration;

use runtime::host::{Args, BlockUtility, Extension, ExtensionInfo, ThreadStatus};
use runtime::{RuntimeError, Value};

use common::{compiled_project, load, started, var};

/// Reports 7, then asks to yield as a broadcast would.
struct Slow;

impl Extension for Slow {
    fn info(&self, _locale: &str) -> ExtensionInfo {
        ExtensionInfo {
            id: "slow".to_string(),
            name: "Slow".to_string(),
            color: "#808080".to_string(),
            blocks: Vec::new(),
            requires_unsandboxed: false,
        }
    }

    fn call(&self, _opcode: &str, _args: &Args, util: &mut BlockUtility<'_>) -> Result<Value, RuntimeError> {
        util.yield_after_completion();
        Ok(Value::Number(7.0))
    }
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

#[test]
fn attaching_takes_one_tick() {
    let (mut runtime, _) = started(&compiled_project(&[r#"(script () (set "x" 1))"#]));

    runtime.step();
    assert_eq!(var(&runtime, "x"), Value::Number(0.0));
    assert_eq!(runtime.threads().len(), 1);
    assert!(runtime.threads()[0].is_compiled());
    assert_eq!(runtime.threads()[0].status, ThreadStatus::YieldTick);

    runtime.step();
    assert_eq!(var(&runtime, "x"), Value::Number(1.0));
    assert!(runtime.threads().is_empty());
}

#[test]
fn explicit_yield_ends_the_tick() {
    let (mut runtime, _) = started(&compiled_project(&[
        r#"(script () (set "x" 1) (yield) (set "x" 2))"#,
    ]));
    runtime.step();
    runtime.step();
    assert_eq!(var(&runtime, "x"), Value::Number(1.0));
    runtime.step();
    assert_eq!(var(&runtime, "x"), Value::Number(2.0));
    assert!(runtime.threads().is_empty());
}

#[test]
fn loops_yield_once_per_iteration() {
    let (mut runtime, _) = started(&compiled_project(&[
        r#"(script () (repeat 3 (change "x" 1) (yield)))"#,
    ]));
    let mut seen = Vec::new();
    for _ in 0..4 {
        runtime.step();
        seen.push(var(&runtime, "x").to_number());
    }
    assert_eq!(seen, [0.0, 1.0, 2.0, 3.0]);
    assert_eq!(runtime.threads().len(), 1);
    runtime.step();
    assert!(runtime.threads().is_empty());
}

#[test]
fn repeat_count_rounds_half_up() {
    let (mut runtime, _) = started(&compiled_project(&[
        r#"(script () (repeat 2.5 (change "x" 1)) (repeat -1 (change "x" 100)))"#,
    ]));
    runtime.run_until_idle(10);
    assert_eq!(var(&runtime, "x"), Value::Number(3.0));
}

#[test]
fn warp_loop_runs_in_one_tick_while_not_stuck() {
    let (mut runtime, _) = started(&compiled_project(&[
        r#"(script () (repeat 5 (change "x" 1) (if (helper is_stuck) (then (yield)))))"#,
    ]));
    runtime.step();
    runtime.step();
    assert_eq!(var(&runtime, "x"), Value::Number(5.0));
    assert!(runtime.threads().is_empty());
}

#[test]
fn while_and_until_recheck_their_condition() {
    let (mut runtime, _) = started(&compiled_project(&[
        r#"(script ()
             (while (< (get "x") 4) (change "x" 1))
             (until (> (get "x") 9) (change "x" 2))
             (set "after" (get "x")))"#,
    ]));
    runtime.run_until_idle(10);
    assert_eq!(var(&runtime, "after"), Value::Number(10.0));
}

#[test]
fn return_ends_the_script() {
    let (mut runtime, _) = started(&compiled_project(&[
        r#"(script () (set "x" 1) (forever (return)) (set "x" 2))"#,
    ]));
    runtime.run_until_idle(10);
    assert_eq!(var(&runtime, "x"), Value::Number(1.0));
    assert!(runtime.threads().is_empty());
}

// ---------------------------------------------------------------------------
// Compatibility calls
// ---------------------------------------------------------------------------

#[test]
fn completed_call_does_not_cost_a_tick() {
    // Broadcasting leaves the thread yielding after completion; compiled
    // code keeps going in the same tick.
    let (mut runtime, _) = started(&compiled_project(&[
        r#"(script () (op "event_broadcast" ("BROADCAST_INPUT" "go")) (set "x" "after"))"#,
    ]));
    runtime.step();
    runtime.step();
    assert_eq!(var(&runtime, "x"), text("after"));
    assert!(runtime.threads().is_empty());
}

#[test]
fn unfinished_call_reruns_next_tick() {
    let (mut runtime, clock) = started(&compiled_project(&[
        r#"(script () (op "control_wait" ("DURATION" 1)) (set "x" "done"))"#,
    ]));
    runtime.step();
    runtime.step();
    runtime.step();
    assert_eq!(var(&runtime, "x"), Value::Number(0.0));
    assert_eq!(runtime.threads().len(), 1);

    clock.advance(Duration::from_millis(999));
    runtime.step();
    assert_eq!(var(&runtime, "x"), Value::Number(0.0));

    clock.advance(Duration::from_millis(1));
    runtime.step();
    assert_eq!(var(&runtime, "x"), text("done"));
    assert!(runtime.threads().is_empty());
}

#[test]
fn reporters_run_through_the_compatibility_layer() {
    let (mut runtime, _) = started(&compiled_project(&[
        r#"(script () (set "x" (report "operator_mathop" ("NUM" -4.5) ("OPERATOR" "abs"))))"#,
    ]));
    runtime.run_until_idle(10);
    assert_eq!(var(&runtime, "x"), Value::Number(4.5));
}

#[test]
fn yielding_reporter_keeps_the_next_explicit_yield() {
    let (mut runtime, _) = load(&compiled_project(&[
        r#"(script () (set "x" (report "slow_value")) (yield) (set "x" 2))"#,
    ]));
    runtime.register_extension(Rc::new(Slow)).expect("registers");
    runtime.green_flag();

    runtime.step();
    runtime.step();
    assert_eq!(var(&runtime, "x"), Value::Number(7.0));
    assert_eq!(runtime.threads().len(), 1);

    runtime.step();
    assert_eq!(var(&runtime, "x"), Value::Number(2.0));
    assert!(runtime.threads().is_empty());
}

// ---------------------------------------------------------------------------
// Stopping
// ---------------------------------------------------------------------------

#[test]
fn stop_all_from_compiled_code_ends_every_thread() {
    let (mut runtime, _) = started(&compiled_project(&[
        r#"(script () (forever (change "x" 1) (yield)))"#,
        r#"(script () (yield) (yield) (op "control_stop" ("STOP_OPTION" "all")))"#,
    ]));
    let ticks = runtime.run_until_idle(50);
    assert_eq!(ticks, 4);
    assert_eq!(var(&runtime, "x"), Value::Number(3.0));
    assert!(runtime.threads().is_empty());
}

#[test]
fn host_stop_drops_compiled_threads() {
    let (mut runtime, _) = started(&compiled_project(&[r#"(script () (forever (change "x" 1) (yield)))"#]));
    runtime.step();
    runtime.step();
    assert!(runtime.threads()[0].is_compiled());

    runtime.stop_all();
    assert!(runtime.threads().is_empty());
    runtime.step();
    assert_eq!(var(&runtime, "x"), Value::Number(1.0));
}

#[test]
fn green_flag_restarts_compiled_scripts() {
    let (mut runtime, _) = started(&compiled_project(&[r#"(script () (forever (change "x" 1) (yield)))"#]));
    runtime.step();
    runtime.step();
    runtime.green_flag();
    assert_eq!(runtime.threads().len(), 1);
    assert!(!runtime.threads()[0].is_compiled());

    runtime.step();
    runtime.step();
    assert_eq!(var(&runtime, "x"), Value::Number(2.0));
}
