use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::code::{Arg, Builtin, Expr, Script, Stmt};
use crate::compile::{CompileFailure, CompiledBody, CompiledUnit, Compiler, TargetResults};
use crate::project::Target;
use crate::project::block::{Block, InputValue, PROCEDURE_CALL, primitive};

static NULL: Value = Value::Null;

/// Helpers the reference compiler's output may call, beyond the always
/// shipped runtime-support snippet.
const HELPERS: &[(&str, &str)] = &[(
    "modulo",
    r#"(helper modulo ("a" "b") (- (param "a") (* (param "b") (floor (/ (param "a") (param "b"))))))"#,
)];

/// Reference compiler: lowers the common statement and reporter subset to
/// step code. Anything it cannot express is routed through `op`/`report`
/// compatibility calls, or reported as a failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockCompiler;

impl Compiler for BlockCompiler {
    fn compile_target(&self, target: &Target) -> TargetResults {
        let mut results = TargetResults::default();

        for (id, block) in target.iter_blocks() {
            if !(block.top_level && block.is_hat()) {
                continue;
            }
            let lowering = Lowering::new(target, Vec::new(), false);
            let result = lowering
                .chain(block.next.as_deref())
                .map(|body| CompiledBody::Function(Script { params: Vec::new(), body }));
            debug!(sprite = %target.name, hat = %id, ok = result.is_ok(), "compiled hat");
            results.hats.insert(
                id.clone(),
                CompiledUnit {
                    top_block_id: id.clone(),
                    result,
                },
            );
        }

        for (id, definition, prototype) in target.procedures() {
            let result = match prototype.and_then(|p| p.mutation.as_ref()) {
                None => Err(CompileFailure::new("procedure definition has no prototype")),
                Some(mutation) => {
                    let params = mutation.argument_names();
                    let lowering = Lowering::new(target, params.clone(), mutation.is_warp());
                    lowering
                        .chain(definition.next.as_deref())
                        .map(|body| CompiledBody::Source(Script { params, body }.to_string()))
                }
            };
            debug!(sprite = %target.name, definition = %id, ok = result.is_ok(), "compiled procedure");
            results.procedures.push(CompiledUnit {
                top_block_id: id.clone(),
                result,
            });
        }

        results
    }

    fn runtime_helpers(&self) -> IndexMap<String, String> {
        HELPERS
            .iter()
            .map(|(name, source)| (name.to_string(), source.to_string()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Lowering
// ---------------------------------------------------------------------------

struct Lowering<'t> {
    target: &'t Target,
    params: Vec<String>,
    warp: bool,
}

type Lowered<T> = Result<T, CompileFailure>;

impl<'t> Lowering<'t> {
    fn new(target: &'t Target, params: Vec<String>, warp: bool) -> Self {
        Lowering {
            target,
            params,
            warp,
        }
    }

    fn block(&self, id: &str) -> Lowered<&'t Block> {
        self.target
            .block(id)
            .ok_or_else(|| CompileFailure::new(format!("dangling block reference `{id}`")))
    }

    /// Lower a statement chain starting at `first`, following `next` links.
    fn chain(&self, first: Option<&str>) -> Lowered<Vec<Stmt>> {
        let mut body = Vec::new();
        let mut current = first;
        let mut visited = 0;
        while let Some(id) = current {
            visited += 1;
            if visited > self.target.blocks.len() {
                return Err(CompileFailure::new("statement chain loops back on itself"));
            }
            let block = self.block(id)?;
            body.push(self.statement(block)?);
            current = block.next.as_deref();
        }
        Ok(body)
    }

    fn loop_body(&self, block: &Block) -> Lowered<Vec<Stmt>> {
        let mut body = self.chain(block.input_block("SUBSTACK"))?;
        body.push(if self.warp {
            Stmt::If {
                cond: Expr::Helper {
                    name: "is_stuck".to_string(),
                    args: Vec::new(),
                },
                then: vec![Stmt::Yield],
                otherwise: Vec::new(),
            }
        } else {
            Stmt::Yield
        });
        Ok(body)
    }

    fn statement(&self, block: &Block) -> Lowered<Stmt> {
        Ok(match block.opcode.as_str() {
            "data_setvariableto" => Stmt::Set {
                var: self.variable_name(block)?,
                value: self.input(block, "VALUE")?,
            },
            "data_changevariableby" => Stmt::Change {
                var: self.variable_name(block)?,
                by: self.input(block, "VALUE")?,
            },
            "control_repeat" => Stmt::Repeat {
                times: self.input(block, "TIMES")?,
                body: self.loop_body(block)?,
            },
            "control_forever" => Stmt::Forever {
                body: self.loop_body(block)?,
            },
            "control_repeat_until" => Stmt::Until {
                cond: self.input(block, "CONDITION")?,
                body: self.loop_body(block)?,
            },
            "control_while" => Stmt::While {
                cond: self.input(block, "CONDITION")?,
                body: self.loop_body(block)?,
            },
            "control_if" | "control_if_else" => Stmt::If {
                cond: self.input(block, "CONDITION")?,
                then: self.chain(block.input_block("SUBSTACK"))?,
                otherwise: self.chain(block.input_block("SUBSTACK2"))?,
            },
            "control_stop" if block.field_text("STOP_OPTION").as_deref() == Some("this script") => {
                Stmt::Return(None)
            }
            PROCEDURE_CALL => self.call(block)?,
            opcode => {
                if block.inputs.keys().any(|name| name.starts_with("SUBSTACK")) {
                    return Err(CompileFailure::new(format!("unsupported C block `{opcode}`")));
                }
                Stmt::Op {
                    opcode: opcode.to_string(),
                    args: self.args(block)?,
                }
            }
        })
    }

    fn call(&self, block: &Block) -> Lowered<Stmt> {
        let mutation = block
            .mutation
            .as_ref()
            .ok_or_else(|| CompileFailure::new("procedure call without mutation"))?;
        let proccode = mutation
            .proccode
            .as_deref()
            .ok_or_else(|| CompileFailure::new("procedure call without signature"))?;
        // Warp is inherited: a callee of a warp body runs warped too.
        let warp = self.warp
            || self
                .target
                .find_prototype(proccode)
                .and_then(|(_, prototype)| prototype.mutation.as_ref())
                .is_some_and(|m| m.is_warp());
        let args = mutation
            .argument_ids()
            .iter()
            .map(|arg_id| self.input(block, arg_id))
            .collect::<Lowered<Vec<_>>>()?;
        Ok(Stmt::Call {
            signature: format!("{}{proccode}", if warp { 'W' } else { 'Z' }),
            args,
        })
    }

    fn variable_name(&self, block: &Block) -> Lowered<String> {
        block
            .field_text("VARIABLE")
            .ok_or_else(|| CompileFailure::new(format!("`{}` has no VARIABLE field", block.opcode)))
    }

    /// Inputs in declaration order, then fields as text.
    fn args(&self, block: &Block) -> Lowered<Vec<Arg>> {
        let mut args = Vec::new();
        for name in block.inputs.keys() {
            args.push(Arg {
                name: name.clone(),
                value: self.input(block, name)?,
            });
        }
        for name in block.fields.keys() {
            args.push(Arg {
                name: name.clone(),
                value: Expr::Text(block.field_text(name).unwrap_or_default()),
            });
        }
        Ok(args)
    }

    // -----------------------------------------------------------------------
    // Reporters
    // -----------------------------------------------------------------------

    fn input(&self, block: &Block, name: &str) -> Lowered<Expr> {
        match block.input(name) {
            None | Some(InputValue::Empty) => Ok(Expr::Text(String::new())),
            Some(InputValue::Block(id)) => self.reporter(self.block(id)?),
            Some(InputValue::Primitive(kind, rest)) => {
                let payload = rest.first().unwrap_or(&NULL);
                match kind {
                    primitive::MATH_NUMBER..=primitive::ANGLE_NUMBER => Ok(number_or_text(payload)),
                    primitive::COLOR_PICKER | primitive::TEXT | primitive::BROADCAST => {
                        Ok(Expr::Text(plain_text(payload)))
                    }
                    primitive::VARIABLE => Ok(Expr::Var(plain_text(payload))),
                    primitive::LIST => Err(CompileFailure::new("list inputs are not supported")),
                    other => Err(CompileFailure::new(format!("unknown primitive kind {other}"))),
                }
            }
        }
    }

    fn reporter(&self, block: &Block) -> Lowered<Expr> {
        let binary = |op: Builtin, a: &str, b: &str| -> Lowered<Expr> {
            Ok(Expr::Builtin {
                op,
                args: vec![self.input(block, a)?, self.input(block, b)?],
            })
        };
        let helper = |name: &str, a: &str, b: &str| -> Lowered<Expr> {
            Ok(Expr::Helper {
                name: name.to_string(),
                args: vec![self.input(block, a)?, self.input(block, b)?],
            })
        };
        let unary = |op: Builtin, a: &str| -> Lowered<Expr> {
            Ok(Expr::Builtin {
                op,
                args: vec![self.input(block, a)?],
            })
        };

        match block.opcode.as_str() {
            "math_number" | "math_positive_number" | "math_whole_number" | "math_integer"
            | "math_angle" => Ok(block.field("NUM").map_or(Expr::Number(0.0), number_or_text)),
            "text" => Ok(Expr::Text(block.field_text("TEXT").unwrap_or_default())),
            "colour_picker" => Ok(Expr::Text(block.field_text("COLOUR").unwrap_or_default())),
            "argument_reporter_string_number" | "argument_reporter_boolean" => {
                let name = block.field_text("VALUE").unwrap_or_default();
                if self.params.contains(&name) {
                    Ok(Expr::Param(name))
                } else if block.opcode == "argument_reporter_boolean" {
                    Ok(Expr::Bool(false))
                } else {
                    Ok(Expr::Number(0.0))
                }
            }
            "data_variable" => Ok(Expr::Var(self.variable_name(block)?)),
            "operator_add" => binary(Builtin::Add, "NUM1", "NUM2"),
            "operator_subtract" => binary(Builtin::Sub, "NUM1", "NUM2"),
            "operator_multiply" => binary(Builtin::Mul, "NUM1", "NUM2"),
            "operator_divide" => binary(Builtin::Div, "NUM1", "NUM2"),
            "operator_mod" => helper("modulo", "NUM1", "NUM2"),
            "operator_lt" => helper("less_than", "OPERAND1", "OPERAND2"),
            "operator_gt" => helper("greater_than", "OPERAND1", "OPERAND2"),
            "operator_equals" => helper("compare_equal", "OPERAND1", "OPERAND2"),
            "operator_and" => binary(Builtin::And, "OPERAND1", "OPERAND2"),
            "operator_or" => binary(Builtin::Or, "OPERAND1", "OPERAND2"),
            "operator_not" => unary(Builtin::Not, "OPERAND"),
            "operator_join" => binary(Builtin::Join, "STRING1", "STRING2"),
            "operator_length" => unary(Builtin::Len, "STRING"),
            "operator_round" => unary(Builtin::Round, "NUM"),
            opcode => Ok(Expr::Report {
                opcode: opcode.to_string(),
                args: self.args(block)?,
            }),
        }
    }
}

fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Numeric slots keep text that does not parse as a number, like the
/// interpreter does.
fn number_or_text(value: &Value) -> Expr {
    match value {
        Value::Number(n) => Expr::Number(n.as_f64().unwrap_or(0.0)),
        other => {
            let text = plain_text(other);
            match text.trim().parse::<f64>() {
                Ok(n) if !text.trim().is_empty() && n.is_finite() => Expr::Number(n),
                _ => Expr::Text(text),
            }
        }
    }
}
