//! Synchronous expression evaluation for compiled code.

use std::cmp::Ordering;

use indexmap::IndexMap;
use precomp::code::{Arg, Builtin, Expr};

use crate::error::RuntimeError;
use crate::host::thread::{BlockState, ThreadStatus};
use crate::host::util::Args;
use crate::shim::Exec;
use crate::shim::materialize::Unit;
use crate::value::{Value, round_half_up};

/// Helper calls nested deeper than this are treated as runaway recursion.
const MAX_HELPER_DEPTH: usize = 64;

/// Names visible to an expression: the unit it belongs to and the
/// parameters of the innermost unit or helper.
pub(crate) struct Scope<'s> {
    pub unit: &'s Unit,
    pub params: &'s IndexMap<String, Value>,
    depth: usize,
}

impl<'s> Scope<'s> {
    pub fn new(unit: &'s Unit, params: &'s IndexMap<String, Value>) -> Self {
        Scope {
            unit,
            params,
            depth: 0,
        }
    }
}

pub(crate) fn eval(expr: &Expr, scope: &Scope<'_>, exec: &mut Exec<'_>) -> Result<Value, RuntimeError> {
    Ok(match expr {
        Expr::Number(n) => Value::Number(*n),
        Expr::Text(s) => Value::Text(s.clone()),
        Expr::Bool(b) => Value::Bool(*b),
        Expr::Var(name) => exec.runtime.variable(exec.thread.target, name),
        Expr::Param(name) => scope.params.get(name).cloned().unwrap_or_default(),
        Expr::Helper { name, args } => helper(name, args, scope, exec)?,
        Expr::Report { opcode, args } => {
            let args = eval_args(args, scope, exec)?;
            let shim = exec.shim;
            let compat = shim.compat(exec.runtime);
            let mut state = BlockState::default();
            let completion = compat.run(exec.runtime, exec.thread, opcode, &args, &mut state)?;
            // A reporter's value is final; a yield it left behind is dropped.
            if exec.thread.status == ThreadStatus::YieldTick {
                exec.thread.status = ThreadStatus::Running;
            }
            completion.value
        }
        Expr::Choose {
            cond,
            then,
            otherwise,
        } => {
            if eval(cond, scope, exec)?.to_bool() {
                eval(then, scope, exec)?
            } else {
                eval(otherwise, scope, exec)?
            }
        }
        Expr::Builtin { op, args } => builtin(*op, args, scope, exec)?,
    })
}

/// Evaluate named block arguments in order.
pub(crate) fn eval_args(args: &[Arg], scope: &Scope<'_>, exec: &mut Exec<'_>) -> Result<Args, RuntimeError> {
    let mut out = Args::new();
    for arg in args {
        let value = eval(&arg.value, scope, exec)?;
        out.insert(arg.name.clone(), value);
    }
    Ok(out)
}

fn helper(name: &str, args: &[Expr], scope: &Scope<'_>, exec: &mut Exec<'_>) -> Result<Value, RuntimeError> {
    let definition = scope
        .unit
        .helper(name)
        .ok_or_else(|| RuntimeError::UnknownHelper(name.to_string()))?;
    if scope.depth >= MAX_HELPER_DEPTH {
        return Err(RuntimeError::HelperDepth(name.to_string()));
    }

    let mut params = IndexMap::new();
    for (index, param) in definition.params.iter().enumerate() {
        let value = match args.get(index) {
            Some(arg) => eval(arg, scope, exec)?,
            None => Value::Empty,
        };
        params.insert(param.clone(), value);
    }
    let inner = Scope {
        unit: scope.unit,
        params: &params,
        depth: scope.depth + 1,
    };
    eval(&definition.body, &inner, exec)
}

fn builtin(op: Builtin, args: &[Expr], scope: &Scope<'_>, exec: &mut Exec<'_>) -> Result<Value, RuntimeError> {
    // `and`/`or` short-circuit, so they evaluate their own operands.
    match op {
        Builtin::And => {
            let result = arg(args, 0, scope, exec)?.to_bool() && arg(args, 1, scope, exec)?.to_bool();
            return Ok(Value::Bool(result));
        }
        Builtin::Or => {
            let result = arg(args, 0, scope, exec)?.to_bool() || arg(args, 1, scope, exec)?.to_bool();
            return Ok(Value::Bool(result));
        }
        _ => {}
    }

    let values = args
        .iter()
        .map(|arg| eval(arg, scope, exec))
        .collect::<Result<Vec<_>, _>>()?;
    let at = |i: usize| values.get(i).cloned().unwrap_or_default();
    let num = |i: usize| at(i).to_number();

    Ok(match op {
        Builtin::Add => Value::Number(num(0) + num(1)),
        Builtin::Sub => Value::Number(num(0) - num(1)),
        Builtin::Mul => Value::Number(num(0) * num(1)),
        Builtin::Div => Value::Number(num(0) / num(1)),
        Builtin::Rem => Value::Number(num(0) % num(1)),
        Builtin::Lt => Value::Bool(num(0) < num(1)),
        Builtin::Gt => Value::Bool(num(0) > num(1)),
        Builtin::Le => Value::Bool(num(0) <= num(1)),
        Builtin::Ge => Value::Bool(num(0) >= num(1)),
        Builtin::Same => Value::Bool(at(0).same(&at(1))),
        Builtin::NotSame => Value::Bool(!at(0).same(&at(1))),
        Builtin::Not => Value::Bool(!at(0).to_bool()),
        Builtin::Join => Value::Text(values.iter().map(Value::to_string).collect()),
        Builtin::Lower => Value::Text(at(0).to_string().to_lowercase()),
        Builtin::Str => Value::Text(at(0).to_string()),
        Builtin::Len => Value::Number(at(0).to_string().chars().count() as f64),
        Builtin::Cmp => Value::Number(match at(0).compare(&at(1)) {
            Ordering::Less => -1.0,
            Ordering::Equal => 0.0,
            Ordering::Greater => 1.0,
        }),
        Builtin::Num => Value::Number(num(0)),
        Builtin::Numeric => Value::Bool(at(0).is_numeric()),
        Builtin::Floor => Value::Number(num(0).floor()),
        Builtin::Abs => Value::Number(num(0).abs()),
        Builtin::Round => Value::Number(round_half_up(num(0))),
        Builtin::Elapsed => {
            let shim = exec.shim;
            let compat = shim.compat(exec.runtime);
            Value::Number(compat.elapsed_ms(exec.runtime))
        }
        Builtin::And | Builtin::Or => Value::Empty,
    })
}

fn arg(args: &[Expr], index: usize, scope: &Scope<'_>, exec: &mut Exec<'_>) -> Result<Value, RuntimeError> {
    match args.get(index) {
        Some(expr) => eval(expr, scope, exec),
        None => Ok(Value::Empty),
    }
}
