pub mod error;
pub mod forms;

pub use error::ParseError;
pub use forms::{Atom, Form};

use std::ops::Range;

use crate::code::{Arg, Bootstrap, Builtin, Expr, HelperDef, Script, Stmt};

/// Step-code parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: impl Into<String>, file_id: usize) -> Self {
        Parser {
            source: source.into(),
            file_id,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Read the raw form tree without interpreting any keyword.
    pub fn forms(&self) -> Result<Vec<Form>, ParseError> {
        forms::read_forms(&self.source, self.file_id)
    }

    /// Parse a unit: `(script ("p" ...) STMT ...)`.
    pub fn parse_script(&self) -> Result<Script, ParseError> {
        let form = self.single_form()?;
        self.script(&form)
    }

    /// Parse one helper definition: `(helper name ("a" ...) E)`.
    pub fn parse_helper(&self) -> Result<HelperDef, ParseError> {
        let form = self.single_form()?;
        self.helper(&form)
    }

    /// Parse a bootstrap payload: `(bootstrap "version" HELPER ...)`.
    pub fn parse_bootstrap(&self) -> Result<Bootstrap, ParseError> {
        let form = self.single_form()?;
        let items = self.list_headed(&form, "bootstrap")?;
        let version = items
            .get(1)
            .and_then(Form::as_text)
            .ok_or_else(|| self.error("bootstrap needs a version string", form.span()))?;
        let helpers = items[2..]
            .iter()
            .map(|item| self.helper(item))
            .collect::<Result<_, _>>()?;
        Ok(Bootstrap {
            version: version.to_string(),
            helpers,
        })
    }

    // -----------------------------------------------------------------------
    // Shared plumbing
    // -----------------------------------------------------------------------

    fn error(&self, message: impl Into<String>, span: Range<usize>) -> ParseError {
        ParseError::new(self.file_id, span, message)
    }

    fn single_form(&self) -> Result<Form, ParseError> {
        let mut forms = self.forms()?;
        match forms.len() {
            1 => Ok(forms.remove(0)),
            0 => Err(self.error("empty source", 0..self.source.len())),
            _ => Err(self
                .error("expected a single top-level form", forms[1].span())
                .with_note("wrap statements inside one `(script ...)` form")),
        }
    }

    fn list_headed<'f>(&self, form: &'f Form, head: &str) -> Result<&'f [Form], ParseError> {
        match form.head() {
            Some(h) if h == head => Ok(form.as_list().unwrap_or_default()),
            _ => Err(self.error(format!("expected `({head} ...)`"), form.span())),
        }
    }

    fn text<'f>(&self, form: Option<&'f Form>, what: &str, span: Range<usize>) -> Result<&'f str, ParseError> {
        form.and_then(Form::as_text)
            .ok_or_else(|| self.error(format!("expected {what} string"), form.map_or(span, Form::span)))
    }

    fn names(&self, form: Option<&Form>, span: Range<usize>) -> Result<Vec<String>, ParseError> {
        let form = form.ok_or_else(|| self.error("expected a parameter list", span))?;
        let items = form
            .as_list()
            .ok_or_else(|| self.error("expected a parameter list", form.span()))?;
        items
            .iter()
            .map(|item| self.text(Some(item), "a parameter", item.span()).map(str::to_string))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Units
    // -----------------------------------------------------------------------

    fn script(&self, form: &Form) -> Result<Script, ParseError> {
        let items = self.list_headed(form, "script")?;
        let params = self.names(items.get(1), form.span())?;
        let body = self.statements(&items[2.min(items.len())..])?;
        Ok(Script { params, body })
    }

    fn helper(&self, form: &Form) -> Result<HelperDef, ParseError> {
        let items = self.list_headed(form, "helper")?;
        let name = items
            .get(1)
            .and_then(Form::as_symbol)
            .ok_or_else(|| self.error("helper needs a name", form.span()))?;
        let params = self.names(items.get(2), form.span())?;
        let body = match items.get(3..) {
            Some([body]) => self.expr(body)?,
            _ => return Err(self.error("helper body must be a single expression", form.span())),
        };
        Ok(HelperDef {
            name: name.to_string(),
            params,
            body,
        })
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn statements(&self, forms: &[Form]) -> Result<Vec<Stmt>, ParseError> {
        forms.iter().map(|form| self.stmt(form)).collect()
    }

    fn stmt(&self, form: &Form) -> Result<Stmt, ParseError> {
        let span = form.span();
        let Some(items) = form.as_list() else {
            return Err(self.error("expected a statement", span));
        };
        let Some(head) = form.head() else {
            return Err(self.error("statement must start with a keyword", span));
        };
        let rest = &items[1..];
        match head {
            "set" | "change" => {
                let var = self.text(rest.first(), "a variable name", span.clone())?.to_string();
                let value = self.exactly_one_after(rest, 1, &span)?;
                Ok(if head == "set" {
                    Stmt::Set { var, value }
                } else {
                    Stmt::Change { var, by: value }
                })
            }
            "op" => {
                let opcode = self.text(rest.first(), "an opcode", span.clone())?.to_string();
                let args = self.args(&rest[1..])?;
                Ok(Stmt::Op { opcode, args })
            }
            "call" => {
                let signature = self.text(rest.first(), "a signature", span.clone())?;
                if signature.is_empty() {
                    return Err(self.error("call signature is empty", span));
                }
                let args = rest[1..].iter().map(|a| self.expr(a)).collect::<Result<_, _>>()?;
                Ok(Stmt::Call {
                    signature: signature.to_string(),
                    args,
                })
            }
            "yield" if rest.is_empty() => Ok(Stmt::Yield),
            "yield" => Err(self.error("yield takes no operands", span)),
            "repeat" => {
                let times = self.expr(rest.first().ok_or_else(|| self.error("repeat needs a count", span.clone()))?)?;
                Ok(Stmt::Repeat {
                    times,
                    body: self.statements(&rest[1..])?,
                })
            }
            "forever" => Ok(Stmt::Forever {
                body: self.statements(rest)?,
            }),
            "while" | "until" => {
                let cond = self.expr(rest.first().ok_or_else(|| self.error("loop needs a condition", span.clone()))?)?;
                let body = self.statements(&rest[1..])?;
                Ok(if head == "while" {
                    Stmt::While { cond, body }
                } else {
                    Stmt::Until { cond, body }
                })
            }
            "if" => self.if_stmt(rest, span),
            "return" => match rest {
                [] => Ok(Stmt::Return(None)),
                [value] => Ok(Stmt::Return(Some(self.expr(value)?))),
                _ => Err(self.error("return takes at most one value", span)),
            },
            other => Err(self
                .error(format!("unknown statement `{other}`"), items[0].span())
                .with_note("statements: set change op call yield repeat forever while until if return")),
        }
    }

    fn if_stmt(&self, rest: &[Form], span: Range<usize>) -> Result<Stmt, ParseError> {
        let cond = self.expr(rest.first().ok_or_else(|| self.error("if needs a condition", span.clone()))?)?;
        let mut then = Vec::new();
        let mut otherwise = Vec::new();
        for clause in &rest[1..] {
            match clause.head() {
                Some("then") => then = self.statements(&clause.as_list().unwrap_or_default()[1..])?,
                Some("else") => otherwise = self.statements(&clause.as_list().unwrap_or_default()[1..])?,
                _ => return Err(self.error("expected `(then ...)` or `(else ...)`", clause.span())),
            }
        }
        Ok(Stmt::If {
            cond,
            then,
            otherwise,
        })
    }

    fn exactly_one_after(&self, rest: &[Form], skip: usize, span: &Range<usize>) -> Result<Expr, ParseError> {
        match rest.get(skip..) {
            Some([value]) => self.expr(value),
            _ => Err(self.error("expected exactly one value", span.clone())),
        }
    }

    fn args(&self, forms: &[Form]) -> Result<Vec<Arg>, ParseError> {
        forms
            .iter()
            .map(|form| match form.as_list() {
                Some([name, value]) => match name.as_text() {
                    Some(name) => Ok(Arg {
                        name: name.to_string(),
                        value: self.expr(value)?,
                    }),
                    None => Err(self.error("argument name must be a string", name.span())),
                },
                _ => Err(self.error("expected `(\"NAME\" value)`", form.span())),
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn expr(&self, form: &Form) -> Result<Expr, ParseError> {
        let span = form.span();
        let items = match form {
            Form::Atom(Atom::Number(n), _) => return Ok(Expr::Number(*n)),
            Form::Atom(Atom::Text(s), _) => return Ok(Expr::Text(s.clone())),
            Form::Atom(Atom::Symbol(s), _) => {
                return match s.as_str() {
                    "true" => Ok(Expr::Bool(true)),
                    "false" => Ok(Expr::Bool(false)),
                    other => Err(self.error(format!("unexpected symbol `{other}`"), span)),
                };
            }
            Form::List(items, _) => items,
        };
        let Some(head) = form.head() else {
            return Err(self.error("expression must start with an operator", span));
        };
        let rest = &items[1..];
        match head {
            "get" => Ok(Expr::Var(self.single_text(rest, "a variable name", &span)?)),
            "param" => Ok(Expr::Param(self.single_text(rest, "a parameter name", &span)?)),
            "helper" => {
                let name = rest
                    .first()
                    .and_then(Form::as_symbol)
                    .ok_or_else(|| self.error("helper call needs a name", span.clone()))?;
                let args = rest[1..].iter().map(|a| self.expr(a)).collect::<Result<_, _>>()?;
                Ok(Expr::Helper {
                    name: name.to_string(),
                    args,
                })
            }
            "report" => {
                let opcode = self.text(rest.first(), "an opcode", span.clone())?.to_string();
                let args = self.args(&rest[1..])?;
                Ok(Expr::Report { opcode, args })
            }
            "?" => match rest {
                [cond, then, otherwise] => Ok(Expr::Choose {
                    cond: Box::new(self.expr(cond)?),
                    then: Box::new(self.expr(then)?),
                    otherwise: Box::new(self.expr(otherwise)?),
                }),
                _ => Err(self.error("`?` takes a condition and two values", span)),
            },
            symbol => {
                let op = Builtin::from_symbol(symbol)
                    .ok_or_else(|| self.error(format!("unknown operator `{symbol}`"), items[0].span()))?;
                if !op.arity().accepts(rest.len()) {
                    return Err(self.error(
                        format!("wrong number of operands for `{symbol}`: {}", rest.len()),
                        span,
                    ));
                }
                let args = rest.iter().map(|a| self.expr(a)).collect::<Result<_, _>>()?;
                Ok(Expr::Builtin { op, args })
            }
        }
    }

    fn single_text(&self, rest: &[Form], what: &str, span: &Range<usize>) -> Result<String, ParseError> {
        match rest {
            [only] => Ok(self.text(Some(only), what, only.span())?.to_string()),
            _ => Err(self.error(format!("expected {what} string"), span.clone())),
        }
    }
}
