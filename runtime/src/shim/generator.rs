//! Resumable execution of materialized units.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::RuntimeError;
use crate::host::thread::{BlockState, ThreadStatus};
use crate::host::util::Args;
use crate::shim::Exec;
use crate::shim::eval::{Scope, eval, eval_args};
use crate::shim::materialize::{BodyId, ENTRY, Instr, Unit, UnitKind};
use crate::value::{Value, round_half_up};

/// What one resumption produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Suspended; resume on a later tick, or in the same tick when the
    /// thread was left in `YieldTick` by a compatibility call.
    Yield,
    Done(Value),
}

/// How a body frame continues once its last statement ran.
#[derive(Debug, Clone, Copy)]
enum Rule {
    Once,
    /// Run the body this many more times.
    Times(i64),
    /// Re-check the loop statement at `index` of body `owner`.
    Loop { owner: BodyId, index: usize },
}

#[derive(Debug)]
enum Frame {
    Body { body: BodyId, pc: usize, rule: Rule },
    Call(Box<StepSequence>),
    Compat {
        opcode: String,
        args: Args,
        state: BlockState,
    },
}

/// One running instance of a unit.
#[derive(Debug)]
pub struct Generator {
    unit: Rc<Unit>,
    params: IndexMap<String, Value>,
    /// Entered in warp mode: `(yield)` only suspends once the tick is stuck.
    warp: bool,
    frames: Vec<Frame>,
}

impl Generator {
    pub fn new(unit: Rc<Unit>, params: IndexMap<String, Value>, warp: bool) -> Self {
        Generator {
            unit,
            params,
            warp,
            frames: vec![Frame::Body {
                body: ENTRY,
                pc: 0,
                rule: Rule::Once,
            }],
        }
    }

    pub(crate) fn resume(&mut self, exec: &mut Exec<'_>) -> Result<Step, RuntimeError> {
        let unit = Rc::clone(&self.unit);
        while let Some(frame) = self.frames.pop() {
            match frame {
                Frame::Call(mut callee) => {
                    if callee.resume(exec)? == Step::Yield {
                        self.frames.push(Frame::Call(callee));
                        return Ok(Step::Yield);
                    }
                    if exec.thread.is_done() {
                        return Ok(Step::Yield);
                    }
                }
                Frame::Compat {
                    opcode,
                    args,
                    mut state,
                } => {
                    let shim = exec.shim;
                    let completion = shim
                        .compat(exec.runtime)
                        .run(exec.runtime, exec.thread, &opcode, &args, &mut state)?;
                    if exec.thread.is_done() {
                        return Ok(Step::Yield);
                    }
                    if !completion.finished {
                        exec.thread.status = ThreadStatus::Running;
                        self.frames.push(Frame::Compat { opcode, args, state });
                        return Ok(Step::Yield);
                    }
                    if exec.thread.status == ThreadStatus::YieldTick {
                        return Ok(Step::Yield);
                    }
                }
                Frame::Body { body, pc, rule } => {
                    let Some(instr) = unit.body(body).get(pc) else {
                        if let Some(rule) = self.repeat(&unit, rule, exec)? {
                            self.frames.push(Frame::Body { body, pc: 0, rule });
                        }
                        continue;
                    };
                    self.frames.push(Frame::Body {
                        body,
                        pc: pc + 1,
                        rule,
                    });
                    let here = Rule::Loop { owner: body, index: pc };
                    if let Some(step) = self.execute(&unit, instr, here, exec)? {
                        return Ok(step);
                    }
                }
            }
        }
        Ok(Step::Done(Value::Empty))
    }

    fn eval(&self, unit: &Unit, expr: &precomp::code::Expr, exec: &mut Exec<'_>) -> Result<Value, RuntimeError> {
        eval(expr, &Scope::new(unit, &self.params), exec)
    }

    /// Run one statement. Returns a step when the sequence suspends or ends.
    fn execute(
        &mut self,
        unit: &Unit,
        instr: &Instr,
        here: Rule,
        exec: &mut Exec<'_>,
    ) -> Result<Option<Step>, RuntimeError> {
        match instr {
            Instr::Set { var, value } => {
                let value = self.eval(unit, value, exec)?;
                exec.runtime.set_variable(exec.thread.target, var, value);
            }
            Instr::Change { var, by } => {
                let by = self.eval(unit, by, exec)?.to_number();
                let current = exec.runtime.variable(exec.thread.target, var).to_number();
                exec.runtime
                    .set_variable(exec.thread.target, var, Value::Number(current + by));
            }
            Instr::Op { opcode, args } => {
                let args = eval_args(args, &Scope::new(unit, &self.params), exec)?;
                self.frames.push(Frame::Compat {
                    opcode: opcode.clone(),
                    args,
                    state: BlockState::default(),
                });
            }
            Instr::Call { signature, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(unit, arg, exec)?);
                }
                let shim = exec.shim;
                let procedure = shim.resolve(exec.runtime, exec.thread.target, signature)?;
                let warp = self.warp || signature.starts_with('W');
                self.frames
                    .push(Frame::Call(Box::new(procedure.instantiate(values, warp))));
            }
            Instr::Yield => {
                if !self.warp || exec.runtime.is_stuck() {
                    return Ok(Some(Step::Yield));
                }
            }
            Instr::Repeat { times, body } => {
                let times = round_half_up(self.eval(unit, times, exec)?.to_number()) as i64;
                if times > 0 {
                    self.enter(*body, Rule::Times(times - 1));
                }
            }
            Instr::Forever { body } => self.enter(*body, here),
            Instr::While { cond, body } => {
                if self.eval(unit, cond, exec)?.to_bool() {
                    self.enter(*body, here);
                }
            }
            Instr::Until { cond, body } => {
                if !self.eval(unit, cond, exec)?.to_bool() {
                    self.enter(*body, here);
                }
            }
            Instr::If {
                cond,
                then,
                otherwise,
            } => {
                let branch = if self.eval(unit, cond, exec)?.to_bool() {
                    *then
                } else {
                    *otherwise
                };
                self.enter(branch, Rule::Once);
            }
            Instr::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(unit, expr, exec)?,
                    None => Value::Empty,
                };
                self.frames.clear();
                return Ok(Some(Step::Done(value)));
            }
        }
        Ok(None)
    }

    fn enter(&mut self, body: BodyId, rule: Rule) {
        self.frames.push(Frame::Body { body, pc: 0, rule });
    }

    /// A body ran out of statements: decide whether it runs again.
    fn repeat(&self, unit: &Unit, rule: Rule, exec: &mut Exec<'_>) -> Result<Option<Rule>, RuntimeError> {
        Ok(match rule {
            Rule::Once => None,
            Rule::Times(remaining) => (remaining > 0).then_some(Rule::Times(remaining - 1)),
            Rule::Loop { owner, index } => {
                let again = match unit.body(owner).get(index) {
                    Some(Instr::Forever { .. }) => true,
                    Some(Instr::While { cond, .. }) => self.eval(unit, cond, exec)?.to_bool(),
                    Some(Instr::Until { cond, .. }) => !self.eval(unit, cond, exec)?.to_bool(),
                    _ => false,
                };
                again.then_some(rule)
            }
        })
    }
}

/// What the shim attaches to a compiled thread. Resumable units are driven
/// directly; single-shot units run to completion on their first resumption.
#[derive(Debug)]
pub enum StepSequence {
    Generator(Generator),
    Once(Option<Generator>),
    Finished,
}

impl StepSequence {
    pub fn new(unit: Rc<Unit>, params: IndexMap<String, Value>, warp: bool) -> Self {
        let kind = unit.kind;
        let generator = Generator::new(unit, params, warp);
        match kind {
            UnitKind::Resumable => StepSequence::Generator(generator),
            UnitKind::SingleShot => StepSequence::Once(Some(generator)),
        }
    }

    /// Bind positional arguments to the unit's parameter names.
    pub fn with_args(unit: Rc<Unit>, args: Vec<Value>, warp: bool) -> Self {
        let mut args = args.into_iter();
        let params = unit
            .params
            .iter()
            .map(|name| (name.clone(), args.next().unwrap_or_default()))
            .collect();
        Self::new(unit, params, warp)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, StepSequence::Finished)
    }

    pub(crate) fn resume(&mut self, exec: &mut Exec<'_>) -> Result<Step, RuntimeError> {
        match self {
            StepSequence::Generator(generator) => {
                let step = generator.resume(exec)?;
                if matches!(step, Step::Done(_)) {
                    *self = StepSequence::Finished;
                }
                Ok(step)
            }
            StepSequence::Once(slot) => {
                let Some(mut generator) = slot.take() else {
                    return Ok(Step::Done(Value::Empty));
                };
                *self = StepSequence::Finished;
                loop {
                    if let Step::Done(value) = generator.resume(exec)? {
                        return Ok(Step::Done(value));
                    }
                }
            }
            StepSequence::Finished => Ok(Step::Done(Value::Empty)),
        }
    }
}
