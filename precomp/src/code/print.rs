use std::fmt::{self, Display, Formatter, Write};

use crate::code::parser::{Atom, Form};
use crate::code::{Arg, Bootstrap, Expr, HelperDef, Script, Stmt};

const INDENT: &str = "  ";

// ---------------------------------------------------------------------------
// Atoms
// ---------------------------------------------------------------------------

/// Quote `s` as a step-code string literal.
pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Integers print without a fractional part. Non-finite values have no
/// literal and go through the `num` builtin.
pub(crate) fn number(n: f64) -> String {
    if n.is_nan() {
        "(num \"NaN\")".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "(num \"Infinity\")".to_string()
        } else {
            "(num \"-Infinity\")".to_string()
        }
    } else {
        n.to_string()
    }
}

// ---------------------------------------------------------------------------
// Pretty printing
// ---------------------------------------------------------------------------

impl Display for Script {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "(script (")?;
        write_names(f, &self.params)?;
        write!(f, ")")?;
        write_block(f, &self.body, 1)?;
        write!(f, ")")
    }
}

impl Display for HelperDef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "(helper {} (", self.name)?;
        write_names(f, &self.params)?;
        write!(f, ")\n{INDENT}{})", self.body)
    }
}

impl Display for Bootstrap {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "(bootstrap {}", quote(&self.version))?;
        for helper in &self.helpers {
            let text = helper.to_string().replace('\n', &format!("\n{INDENT}"));
            write!(f, "\n{INDENT}{text}")?;
        }
        write!(f, ")")
    }
}

impl Display for Stmt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_stmt(f, self, 0)
    }
}

fn write_names(f: &mut Formatter<'_>, names: &[String]) -> fmt::Result {
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            f.write_char(' ')?;
        }
        f.write_str(&quote(name))?;
    }
    Ok(())
}

fn write_block(f: &mut Formatter<'_>, body: &[Stmt], depth: usize) -> fmt::Result {
    for stmt in body {
        f.write_char('\n')?;
        write_stmt(f, stmt, depth)?;
    }
    Ok(())
}

fn write_stmt(f: &mut Formatter<'_>, stmt: &Stmt, depth: usize) -> fmt::Result {
    f.write_str(&INDENT.repeat(depth))?;
    match stmt {
        Stmt::Set { var, value } => write!(f, "(set {} {value})", quote(var)),
        Stmt::Change { var, by } => write!(f, "(change {} {by})", quote(var)),
        Stmt::Op { opcode, args } => write!(f, "(op {}{})", quote(opcode), ArgList(args)),
        Stmt::Call { signature, args } => {
            write!(f, "(call {}", quote(signature))?;
            for arg in args {
                write!(f, " {arg}")?;
            }
            f.write_char(')')
        }
        Stmt::Yield => f.write_str("(yield)"),
        Stmt::Repeat { times, body } => {
            write!(f, "(repeat {times}")?;
            write_block(f, body, depth + 1)?;
            f.write_char(')')
        }
        Stmt::Forever { body } => {
            f.write_str("(forever")?;
            write_block(f, body, depth + 1)?;
            f.write_char(')')
        }
        Stmt::While { cond, body } => {
            write!(f, "(while {cond}")?;
            write_block(f, body, depth + 1)?;
            f.write_char(')')
        }
        Stmt::Until { cond, body } => {
            write!(f, "(until {cond}")?;
            write_block(f, body, depth + 1)?;
            f.write_char(')')
        }
        Stmt::If {
            cond,
            then,
            otherwise,
        } => {
            let inner = INDENT.repeat(depth + 1);
            write!(f, "(if {cond}\n{inner}(then")?;
            write_block(f, then, depth + 2)?;
            f.write_char(')')?;
            if !otherwise.is_empty() {
                write!(f, "\n{inner}(else")?;
                write_block(f, otherwise, depth + 2)?;
                f.write_char(')')?;
            }
            f.write_char(')')
        }
        Stmt::Return(None) => f.write_str("(return)"),
        Stmt::Return(Some(value)) => write!(f, "(return {value})"),
    }
}

struct ArgList<'a>(&'a [Arg]);

impl Display for ArgList<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for arg in self.0 {
            write!(f, " ({} {})", quote(&arg.name), arg.value)?;
        }
        Ok(())
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => f.write_str(&number(*n)),
            Expr::Text(s) => f.write_str(&quote(s)),
            Expr::Bool(b) => write!(f, "{b}"),
            Expr::Var(name) => write!(f, "(get {})", quote(name)),
            Expr::Param(name) => write!(f, "(param {})", quote(name)),
            Expr::Helper { name, args } => {
                write!(f, "(helper {name}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                f.write_char(')')
            }
            Expr::Report { opcode, args } => write!(f, "(report {}{})", quote(opcode), ArgList(args)),
            Expr::Choose {
                cond,
                then,
                otherwise,
            } => write!(f, "(? {cond} {then} {otherwise})"),
            Expr::Builtin { op, args } => {
                f.write_char('(')?;
                f.write_str(op.symbol())?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                f.write_char(')')
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Compact printing
// ---------------------------------------------------------------------------

impl Form {
    /// Print with the least whitespace the reader still accepts.
    pub fn to_compact(&self) -> String {
        let mut out = String::new();
        write_compact(&mut out, self);
        out
    }
}

/// Two bare words in a row are the only tokens that need a separator.
fn is_word(form: &Form) -> bool {
    matches!(form, Form::Atom(Atom::Number(_) | Atom::Symbol(_), _))
}

pub(crate) fn write_compact(out: &mut String, form: &Form) {
    match form {
        Form::Atom(Atom::Number(n), _) => out.push_str(&number(*n)),
        Form::Atom(Atom::Text(s), _) => out.push_str(&quote(s)),
        Form::Atom(Atom::Symbol(s), _) => out.push_str(s),
        Form::List(items, _) => {
            out.push('(');
            let mut previous: Option<&Form> = None;
            for item in items {
                if previous.is_some_and(is_word) && is_word(item) {
                    out.push(' ');
                }
                write_compact(out, item);
                previous = Some(item);
            }
            out.push(')');
        }
    }
}
