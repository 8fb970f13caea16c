//! The default per-thread stepping path: a block-at-a-time interpreter over
//! the thread's frame stack.

use indexmap::IndexMap;
use precomp::project::block::{Block, BlockId, InputValue, PROCEDURE_CALL, primitive};

use crate::error::RuntimeError;
use crate::host::Runtime;
use crate::host::thread::{BlockState, ExecFrame, Thread, ThreadStatus};
use crate::host::util::{Args, BlockUtility, Signals, UtilMode};
use crate::value::Value;

/// What the interpreter does after a block returns.
#[derive(Debug)]
enum Flow {
    Next,
    /// Move on, but give the other threads this tick.
    NextThenYield,
    /// Run the same block again next tick.
    Unfinished,
    Branch {
        substack: Option<BlockId>,
        is_loop: bool,
    },
    Call {
        definition: BlockId,
        params: IndexMap<String, Value>,
        warp: bool,
    },
    Return,
    Halted,
}

/// Step `thread` until it yields, finishes or fails.
pub fn step_thread(runtime: &mut Runtime, thread: &mut Thread) {
    while thread.status == ThreadStatus::Running {
        let Some(frame) = thread.frames.last() else {
            thread.retire();
            return;
        };
        let Some(block_id) = frame.pc.clone() else {
            if !unwind_frame(runtime, thread) {
                return;
            }
            continue;
        };

        let flow = match execute(runtime, thread, &block_id) {
            Ok(flow) => flow,
            Err(error) => {
                runtime.report_error(thread, error);
                return;
            }
        };

        match flow {
            Flow::Next => advance(runtime, thread),
            Flow::NextThenYield => {
                advance(runtime, thread);
                return;
            }
            Flow::Unfinished | Flow::Halted => return,
            Flow::Branch {
                substack: Some(substack),
                is_loop,
            } => {
                let warp = thread.in_warp();
                if !is_loop {
                    advance(runtime, thread);
                }
                thread.frames.push(ExecFrame {
                    is_loop,
                    warp,
                    ..ExecFrame::at(substack)
                });
            }
            Flow::Branch {
                substack: None,
                is_loop: true,
            } => {
                if !end_iteration(runtime, thread) {
                    return;
                }
            }
            Flow::Branch { substack: None, .. } => advance(runtime, thread),
            Flow::Call {
                definition,
                params,
                warp,
            } => {
                let warp = warp || thread.in_warp();
                advance(runtime, thread);
                thread.frames.push(ExecFrame {
                    warp,
                    params: Some(params),
                    ..ExecFrame::at(definition)
                });
            }
            Flow::Return => stop_this_script(thread),
        }
    }
}

/// Move the innermost frame to the block after its current one.
pub fn advance(runtime: &Runtime, thread: &mut Thread) {
    let target = &runtime.targets[thread.target];
    if let Some(frame) = thread.frames.last_mut() {
        frame.pc = frame
            .pc
            .as_deref()
            .and_then(|id| target.block(id))
            .and_then(|block| block.next.clone());
        frame.state = BlockState::default();
    }
}

/// Pop the innermost frame. Returns whether the thread keeps running in
/// this tick.
pub fn unwind_frame(runtime: &Runtime, thread: &mut Thread) -> bool {
    let Some(popped) = thread.frames.pop() else {
        thread.retire();
        return false;
    };
    if thread.frames.is_empty() {
        thread.retire();
        return false;
    }
    if popped.is_loop {
        return end_iteration(runtime, thread);
    }
    true
}

/// A loop iteration finished. Outside warp mode the thread yields; the loop
/// block runs again next tick.
fn end_iteration(runtime: &Runtime, thread: &mut Thread) -> bool {
    if thread.in_warp() && !runtime.is_stuck() {
        return true;
    }
    thread.status = ThreadStatus::YieldTick;
    false
}

/// Leave the innermost procedure, or end the thread outside of one.
fn stop_this_script(thread: &mut Thread) {
    while let Some(frame) = thread.frames.pop() {
        if frame.params.is_some() {
            if thread.frames.is_empty() {
                thread.retire();
            }
            return;
        }
    }
    thread.retire();
}

// ---------------------------------------------------------------------------
// Block execution
// ---------------------------------------------------------------------------

fn execute(runtime: &mut Runtime, thread: &mut Thread, block_id: &str) -> Result<Flow, RuntimeError> {
    let block = runtime.targets[thread.target]
        .block(block_id)
        .cloned()
        .ok_or_else(|| RuntimeError::MissingBlock(block_id.to_string()))?;
    let args = evaluate_args(runtime, thread, &block)?;

    let mut state = thread
        .frames
        .last_mut()
        .map(|frame| std::mem::take(&mut frame.state))
        .unwrap_or_default();
    let mut util = BlockUtility::new(
        runtime,
        thread,
        &mut state,
        UtilMode::Interpreted,
        Some(block_id.to_string()),
    );
    let result = Runtime::dispatch(&block.opcode, &args, &mut util);
    let signals = std::mem::take(&mut util.signals);
    if let Some(frame) = thread.frames.last_mut() {
        frame.state = state;
    }
    result?;

    Ok(flow_after(runtime, thread, &block, &args, signals))
}

fn flow_after(runtime: &Runtime, thread: &Thread, block: &Block, args: &Args, signals: Signals) -> Flow {
    if thread.status == ThreadStatus::Done {
        return Flow::Halted;
    }
    if signals.stop_script {
        return Flow::Return;
    }
    if signals.rerun {
        return Flow::Unfinished;
    }
    if let Some((branch, is_loop)) = signals.branch {
        let name = match branch {
            1 => "SUBSTACK".to_string(),
            n => format!("SUBSTACK{n}"),
        };
        return Flow::Branch {
            substack: block.input_block(&name).map(str::to_string),
            is_loop,
        };
    }
    if let Some(proccode) = signals.procedure {
        if let Some(call) = procedure_call(runtime, thread, block, args, &proccode) {
            return call;
        }
    }
    if thread.status == ThreadStatus::YieldTick {
        return Flow::NextThenYield;
    }
    Flow::Next
}

/// Find the definition for `proccode` and bind the call's arguments to the
/// prototype's parameter names.
fn procedure_call(runtime: &Runtime, thread: &Thread, call: &Block, args: &Args, proccode: &str) -> Option<Flow> {
    let target = &runtime.targets[thread.target];
    let (_, prototype) = target.data.find_prototype(proccode)?;
    let definition = prototype.parent.clone()?;
    let mutation = prototype.mutation.as_ref()?;
    let ids = call.mutation.as_ref().map(|m| m.argument_ids()).unwrap_or_default();
    let params = mutation
        .argument_names()
        .into_iter()
        .zip(ids.iter().map(|id| args.get(id).cloned().unwrap_or_default()))
        .collect();
    Some(Flow::Call {
        definition,
        params,
        warp: mutation.is_warp(),
    })
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Evaluate every value input of `block`, then add its fields as text.
/// Substacks and procedure prototypes are statements, not values.
pub fn evaluate_args(runtime: &mut Runtime, thread: &mut Thread, block: &Block) -> Result<Args, RuntimeError> {
    let mut args = Args::new();
    for name in block.inputs.keys() {
        if name.starts_with("SUBSTACK") || name == "custom_block" {
            continue;
        }
        let value = evaluate_input(runtime, thread, block, name)?;
        args.insert(name.clone(), value);
    }
    for name in block.fields.keys() {
        let value = match block.opcode.as_str() {
            "math_number" | "math_positive_number" | "math_whole_number" | "math_integer"
            | "math_angle" => block.field(name).map(Value::numeric_literal).unwrap_or_default(),
            _ => Value::Text(block.field_text(name).unwrap_or_default()),
        };
        args.insert(name.clone(), value);
    }
    Ok(args)
}

fn evaluate_input(runtime: &mut Runtime, thread: &mut Thread, block: &Block, name: &str) -> Result<Value, RuntimeError> {
    match block.input(name) {
        None | Some(InputValue::Empty) => Ok(Value::Empty),
        Some(InputValue::Primitive(kind, rest)) => {
            let payload = rest.first().map(Value::from_json).unwrap_or_default();
            Ok(match kind {
                primitive::MATH_NUMBER..=primitive::ANGLE_NUMBER => match rest.first() {
                    Some(raw) => Value::numeric_literal(raw),
                    None => Value::Empty,
                },
                primitive::VARIABLE => runtime.variable(thread.target, &payload.to_string()),
                primitive::LIST => Value::Empty,
                _ => payload,
            })
        }
        Some(InputValue::Block(id)) => {
            let reporter = runtime.targets[thread.target]
                .block(id)
                .cloned()
                .ok_or_else(|| RuntimeError::MissingBlock(id.to_string()))?;
            evaluate_reporter(runtime, thread, id, &reporter)
        }
    }
}

fn evaluate_reporter(
    runtime: &mut Runtime,
    thread: &mut Thread,
    id: &str,
    reporter: &Block,
) -> Result<Value, RuntimeError> {
    if reporter.opcode == PROCEDURE_CALL {
        return Ok(Value::Empty);
    }
    let args = evaluate_args(runtime, thread, reporter)?;
    let mut state = BlockState::default();
    let mut util = BlockUtility::new(
        runtime,
        thread,
        &mut state,
        UtilMode::Interpreted,
        Some(id.to_string()),
    );
    Runtime::dispatch(&reporter.opcode, &args, &mut util)
}
