use std::collections::HashMap;

use precomp::project::block::HAT_OPCODES;

use crate::error::RuntimeError;
use crate::host::util::{Args, BlockUtility};
use crate::value::{Value, round_half_up};

pub type PrimitiveFn = fn(&Args, &mut BlockUtility<'_>) -> Result<Value, RuntimeError>;

static EMPTY: Value = Value::Empty;

fn arg<'a>(args: &'a Args, name: &str) -> &'a Value {
    args.get(name).unwrap_or(&EMPTY)
}

/// Built-in block implementations, by opcode.
#[derive(Debug, Clone, Default)]
pub struct Primitives {
    table: HashMap<&'static str, PrimitiveFn>,
}

impl Primitives {
    pub fn standard() -> Self {
        let mut primitives = Primitives::default();
        for hat in HAT_OPCODES {
            primitives.register(*hat, no_op);
        }
        primitives.register("procedures_definition", no_op);
        primitives.register("procedures_call", procedures_call);

        primitives.register("data_setvariableto", data_setvariableto);
        primitives.register("data_changevariableby", data_changevariableby);
        primitives.register("data_variable", data_variable);

        primitives.register("looks_say", looks_say);
        primitives.register("looks_think", looks_say);

        primitives.register("control_wait", control_wait);
        primitives.register("control_repeat", control_repeat);
        primitives.register("control_forever", control_forever);
        primitives.register("control_if", control_if);
        primitives.register("control_if_else", control_if_else);
        primitives.register("control_repeat_until", control_repeat_until);
        primitives.register("control_while", control_while);
        primitives.register("control_stop", control_stop);

        primitives.register("event_broadcast", event_broadcast);

        primitives.register("operator_add", |a, _| Ok(num2(a, "NUM1", "NUM2", |x, y| x + y)));
        primitives.register("operator_subtract", |a, _| Ok(num2(a, "NUM1", "NUM2", |x, y| x - y)));
        primitives.register("operator_multiply", |a, _| Ok(num2(a, "NUM1", "NUM2", |x, y| x * y)));
        primitives.register("operator_divide", |a, _| Ok(num2(a, "NUM1", "NUM2", |x, y| x / y)));
        primitives.register("operator_mod", |a, _| {
            Ok(num2(a, "NUM1", "NUM2", |x, y| x - y * (x / y).floor()))
        });
        primitives.register("operator_lt", |a, _| {
            Ok(Value::Bool(arg(a, "OPERAND1").compare(arg(a, "OPERAND2")).is_lt()))
        });
        primitives.register("operator_gt", |a, _| {
            Ok(Value::Bool(arg(a, "OPERAND1").compare(arg(a, "OPERAND2")).is_gt()))
        });
        primitives.register("operator_equals", |a, _| {
            Ok(Value::Bool(arg(a, "OPERAND1").loosely_equals(arg(a, "OPERAND2"))))
        });
        primitives.register("operator_and", |a, _| {
            Ok(Value::Bool(arg(a, "OPERAND1").to_bool() && arg(a, "OPERAND2").to_bool()))
        });
        primitives.register("operator_or", |a, _| {
            Ok(Value::Bool(arg(a, "OPERAND1").to_bool() || arg(a, "OPERAND2").to_bool()))
        });
        primitives.register("operator_not", |a, _| Ok(Value::Bool(!arg(a, "OPERAND").to_bool())));
        primitives.register("operator_join", |a, _| {
            Ok(Value::Text(format!("{}{}", arg(a, "STRING1"), arg(a, "STRING2"))))
        });
        primitives.register("operator_length", |a, _| {
            Ok(Value::Number(arg(a, "STRING").to_string().chars().count() as f64))
        });
        primitives.register("operator_letter_of", operator_letter_of);
        primitives.register("operator_contains", |a, _| {
            let haystack = arg(a, "STRING1").to_string().to_lowercase();
            let needle = arg(a, "STRING2").to_string().to_lowercase();
            Ok(Value::Bool(haystack.contains(&needle)))
        });
        primitives.register("operator_round", |a, _| {
            Ok(Value::Number(round_half_up(arg(a, "NUM").to_number())))
        });
        primitives.register("operator_mathop", operator_mathop);

        for shadow in [
            "math_number",
            "math_positive_number",
            "math_whole_number",
            "math_integer",
            "math_angle",
        ] {
            primitives.register(shadow, |a, _| Ok(arg(a, "NUM").clone()));
        }
        primitives.register("text", |a, _| Ok(arg(a, "TEXT").clone()));
        primitives.register("colour_picker", |a, _| Ok(arg(a, "COLOUR").clone()));
        primitives.register("argument_reporter_string_number", |a, util| {
            let name = arg(a, "VALUE").to_string();
            Ok(util.param(&name)?.unwrap_or(Value::Number(0.0)))
        });
        primitives.register("argument_reporter_boolean", |a, util| {
            let name = arg(a, "VALUE").to_string();
            Ok(util.param(&name)?.unwrap_or(Value::Bool(false)))
        });

        primitives
    }

    pub fn register(&mut self, opcode: &'static str, primitive: PrimitiveFn) {
        self.table.insert(opcode, primitive);
    }

    pub fn get(&self, opcode: &str) -> Option<PrimitiveFn> {
        self.table.get(opcode).copied()
    }
}

fn no_op(_: &Args, _: &mut BlockUtility<'_>) -> Result<Value, RuntimeError> {
    Ok(Value::Empty)
}

fn num2(args: &Args, a: &str, b: &str, op: fn(f64, f64) -> f64) -> Value {
    Value::Number(op(arg(args, a).to_number(), arg(args, b).to_number()))
}

// ---------------------------------------------------------------------------
// Data & looks
// ---------------------------------------------------------------------------

fn data_setvariableto(args: &Args, util: &mut BlockUtility<'_>) -> Result<Value, RuntimeError> {
    let name = arg(args, "VARIABLE").to_string();
    util.set_variable(&name, arg(args, "VALUE").clone());
    Ok(Value::Empty)
}

fn data_changevariableby(args: &Args, util: &mut BlockUtility<'_>) -> Result<Value, RuntimeError> {
    let name = arg(args, "VARIABLE").to_string();
    let current = util.variable(&name).to_number();
    util.set_variable(&name, Value::Number(current + arg(args, "VALUE").to_number()));
    Ok(Value::Empty)
}

fn data_variable(args: &Args, util: &mut BlockUtility<'_>) -> Result<Value, RuntimeError> {
    Ok(util.variable(&arg(args, "VARIABLE").to_string()))
}

fn looks_say(args: &Args, util: &mut BlockUtility<'_>) -> Result<Value, RuntimeError> {
    let message = arg(args, "MESSAGE").to_string();
    let target = util.thread.target;
    util.runtime.targets[target].said.push(message);
    Ok(Value::Empty)
}

// ---------------------------------------------------------------------------
// Control
// ---------------------------------------------------------------------------

fn control_wait(args: &Args, util: &mut BlockUtility<'_>) -> Result<Value, RuntimeError> {
    if util.stack_timer_needs_init() {
        let seconds = arg(args, "DURATION").to_number().max(0.0);
        util.start_stack_timer(seconds * 1000.0);
        util.yield_tick();
    } else if !util.stack_timer_finished() {
        util.yield_tick();
    }
    Ok(Value::Empty)
}

fn control_repeat(args: &Args, util: &mut BlockUtility<'_>) -> Result<Value, RuntimeError> {
    let state = util.state();
    let remaining = state
        .loop_counter
        .get_or_insert_with(|| round_half_up(arg(args, "TIMES").to_number()) as i64);
    if *remaining > 0 {
        *remaining -= 1;
        util.start_branch(1, true)?;
    }
    Ok(Value::Empty)
}

fn control_forever(_: &Args, util: &mut BlockUtility<'_>) -> Result<Value, RuntimeError> {
    util.start_branch(1, true)?;
    Ok(Value::Empty)
}

fn control_if(args: &Args, util: &mut BlockUtility<'_>) -> Result<Value, RuntimeError> {
    if arg(args, "CONDITION").to_bool() {
        util.start_branch(1, false)?;
    }
    Ok(Value::Empty)
}

fn control_if_else(args: &Args, util: &mut BlockUtility<'_>) -> Result<Value, RuntimeError> {
    let branch = if arg(args, "CONDITION").to_bool() { 1 } else { 2 };
    util.start_branch(branch, false)?;
    Ok(Value::Empty)
}

fn control_repeat_until(args: &Args, util: &mut BlockUtility<'_>) -> Result<Value, RuntimeError> {
    if !arg(args, "CONDITION").to_bool() {
        util.start_branch(1, true)?;
    }
    Ok(Value::Empty)
}

fn control_while(args: &Args, util: &mut BlockUtility<'_>) -> Result<Value, RuntimeError> {
    if arg(args, "CONDITION").to_bool() {
        util.start_branch(1, true)?;
    }
    Ok(Value::Empty)
}

fn control_stop(args: &Args, util: &mut BlockUtility<'_>) -> Result<Value, RuntimeError> {
    match arg(args, "STOP_OPTION").to_string().as_str() {
        "all" => {
            util.runtime.request_stop_all();
            util.thread.retire();
        }
        "other scripts in sprite" | "other scripts in stage" => {
            let (target, keep) = (util.thread.target, util.thread.id);
            util.runtime.request_stop_others(target, keep);
        }
        _ => util.stop_this_script()?,
    }
    Ok(Value::Empty)
}

fn procedures_call(_: &Args, util: &mut BlockUtility<'_>) -> Result<Value, RuntimeError> {
    let proccode = util
        .block_id()
        .and_then(|id| util.target().block(id))
        .and_then(|block| block.proccode())
        .map(str::to_string);
    match proccode {
        Some(proccode) => util.start_procedure(&proccode)?,
        None => return Err(RuntimeError::CompatUnsupported("procedures_call")),
    }
    Ok(Value::Empty)
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Starts the receiving scripts, then gives them a chance to run before
/// this thread continues.
fn event_broadcast(args: &Args, util: &mut BlockUtility<'_>) -> Result<Value, RuntimeError> {
    let message = arg(args, "BROADCAST_INPUT").to_string();
    util.runtime.broadcast(&message);
    util.yield_after_completion();
    Ok(Value::Empty)
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

fn operator_letter_of(args: &Args, _: &mut BlockUtility<'_>) -> Result<Value, RuntimeError> {
    let index = arg(args, "LETTER").to_number() as i64;
    let text = arg(args, "STRING").to_string();
    let letter = usize::try_from(index - 1)
        .ok()
        .and_then(|i| text.chars().nth(i))
        .map(String::from)
        .unwrap_or_default();
    Ok(Value::Text(letter))
}

fn operator_mathop(args: &Args, _: &mut BlockUtility<'_>) -> Result<Value, RuntimeError> {
    let n = arg(args, "NUM").to_number();
    let result = match arg(args, "OPERATOR").to_string().to_lowercase().as_str() {
        "abs" => n.abs(),
        "floor" => n.floor(),
        "ceiling" => n.ceil(),
        "sqrt" => n.sqrt(),
        "sin" => n.to_radians().sin(),
        "cos" => n.to_radians().cos(),
        "tan" => n.to_radians().tan(),
        "ln" => n.ln(),
        "log" => n.log10(),
        "e ^" => n.exp(),
        "10 ^" => 10f64.powf(n),
        _ => 0.0,
    };
    Ok(Value::Number(result))
}
