//! Step code: the textual form of compiled script bodies.
//!
//! A unit is a parenthesised form tree. Statements run in order inside a
//! resumable step sequence; expressions are evaluated synchronously.

pub mod minify;
pub mod parser;
mod print;

pub use minify::minify;
pub use parser::{ParseError, Parser};
pub(crate) use print::quote;

/// A compiled script or procedure body: `(script ("p" ...) STMT ...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    /// Parameter names, bound positionally when the unit is instantiated.
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

/// A named argument passed to a block operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `(set "var" E)`
    Set { var: String, value: Expr },
    /// `(change "var" E)`
    Change { var: String, by: Expr },
    /// `(op "opcode" ("ARG" E) ...)`: run an interpreted block operation.
    Op { opcode: String, args: Vec<Arg> },
    /// `(call "Zsignature" E ...)`: the first character is the call-type marker.
    Call { signature: String, args: Vec<Expr> },
    /// `(yield)`
    Yield,
    /// `(repeat E STMT ...)`
    Repeat { times: Expr, body: Vec<Stmt> },
    /// `(forever STMT ...)`
    Forever { body: Vec<Stmt> },
    /// `(while E STMT ...)`
    While { cond: Expr, body: Vec<Stmt> },
    /// `(until E STMT ...)`
    Until { cond: Expr, body: Vec<Stmt> },
    /// `(if E (then STMT ...) (else STMT ...))`
    If {
        cond: Expr,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
    },
    /// `(return)` or `(return E)`
    Return(Option<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Bool(bool),
    /// `(get "var")`
    Var(String),
    /// `(param "name")`
    Param(String),
    /// `(helper name E ...)`: call into the approved helper table.
    Helper { name: String, args: Vec<Expr> },
    /// `(report "opcode" ("ARG" E) ...)`: evaluate an interpreted reporter.
    Report { opcode: String, args: Vec<Arg> },
    /// `(? C A B)`, only the chosen branch is evaluated.
    Choose {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Builtin { op: Builtin, args: Vec<Expr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Gt,
    Le,
    Ge,
    Same,
    NotSame,
    And,
    Or,
    Not,
    Join,
    Lower,
    Str,
    Len,
    Cmp,
    Num,
    Numeric,
    Floor,
    Abs,
    Round,
    Elapsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

const BUILTINS: &[(Builtin, &str, Arity)] = &[
    (Builtin::Add, "+", Arity::Exact(2)),
    (Builtin::Sub, "-", Arity::Exact(2)),
    (Builtin::Mul, "*", Arity::Exact(2)),
    (Builtin::Div, "/", Arity::Exact(2)),
    (Builtin::Rem, "%", Arity::Exact(2)),
    (Builtin::Lt, "<", Arity::Exact(2)),
    (Builtin::Gt, ">", Arity::Exact(2)),
    (Builtin::Le, "<=", Arity::Exact(2)),
    (Builtin::Ge, ">=", Arity::Exact(2)),
    (Builtin::Same, "==", Arity::Exact(2)),
    (Builtin::NotSame, "!=", Arity::Exact(2)),
    (Builtin::And, "and", Arity::Exact(2)),
    (Builtin::Or, "or", Arity::Exact(2)),
    (Builtin::Not, "not", Arity::Exact(1)),
    (Builtin::Join, "join", Arity::AtLeast(1)),
    (Builtin::Lower, "lower", Arity::Exact(1)),
    (Builtin::Str, "str", Arity::Exact(1)),
    (Builtin::Len, "len", Arity::Exact(1)),
    (Builtin::Cmp, "cmp", Arity::Exact(2)),
    (Builtin::Num, "num", Arity::Exact(1)),
    (Builtin::Numeric, "numeric", Arity::Exact(1)),
    (Builtin::Floor, "floor", Arity::Exact(1)),
    (Builtin::Abs, "abs", Arity::Exact(1)),
    (Builtin::Round, "round", Arity::Exact(1)),
    (Builtin::Elapsed, "elapsed", Arity::Exact(0)),
];

impl Builtin {
    pub fn from_symbol(symbol: &str) -> Option<Builtin> {
        BUILTINS
            .iter()
            .find(|(_, name, _)| *name == symbol)
            .map(|(op, _, _)| *op)
    }

    pub fn symbol(self) -> &'static str {
        BUILTINS
            .iter()
            .find(|(op, _, _)| *op == self)
            .map(|(_, name, _)| *name)
            .unwrap_or("?")
    }

    pub fn arity(self) -> Arity {
        BUILTINS
            .iter()
            .find(|(op, _, _)| *op == self)
            .map(|(_, _, arity)| *arity)
            .unwrap_or(Arity::AtLeast(0))
    }
}

/// A helper function shipped in the bootstrap payload:
/// `(helper name ("a" "b") E)`.
#[derive(Debug, Clone, PartialEq)]
pub struct HelperDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Expr,
}

/// The decoded bootstrap payload: `(bootstrap "version" HELPER ...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bootstrap {
    pub version: String,
    pub helpers: Vec<HelperDef>,
}

impl Script {
    /// Names of helpers referenced anywhere in the body.
    pub fn helper_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for stmt in &self.body {
            stmt.collect_helpers(&mut names);
        }
        names
    }
}

impl Stmt {
    fn collect_helpers(&self, out: &mut Vec<String>) {
        match self {
            Stmt::Set { value, .. } => value.collect_helpers(out),
            Stmt::Change { by, .. } => by.collect_helpers(out),
            Stmt::Op { args, .. } => args.iter().for_each(|a| a.value.collect_helpers(out)),
            Stmt::Call { args, .. } => args.iter().for_each(|a| a.collect_helpers(out)),
            Stmt::Yield => {}
            Stmt::Repeat { times, body } => {
                times.collect_helpers(out);
                body.iter().for_each(|s| s.collect_helpers(out));
            }
            Stmt::Forever { body } => body.iter().for_each(|s| s.collect_helpers(out)),
            Stmt::While { cond, body } | Stmt::Until { cond, body } => {
                cond.collect_helpers(out);
                body.iter().for_each(|s| s.collect_helpers(out));
            }
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                cond.collect_helpers(out);
                then.iter().for_each(|s| s.collect_helpers(out));
                otherwise.iter().for_each(|s| s.collect_helpers(out));
            }
            Stmt::Return(value) => {
                if let Some(value) = value {
                    value.collect_helpers(out);
                }
            }
        }
    }
}

impl Expr {
    /// Names of helpers referenced by this expression.
    pub fn helper_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_helpers(&mut names);
        names
    }

    fn collect_helpers(&self, out: &mut Vec<String>) {
        match self {
            Expr::Helper { name, args } => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
                args.iter().for_each(|a| a.collect_helpers(out));
            }
            Expr::Report { args, .. } => args.iter().for_each(|a| a.value.collect_helpers(out)),
            Expr::Choose {
                cond,
                then,
                otherwise,
            } => {
                cond.collect_helpers(out);
                then.collect_helpers(out);
                otherwise.collect_helpers(out);
            }
            Expr::Builtin { args, .. } => args.iter().for_each(|a| a.collect_helpers(out)),
            Expr::Number(_) | Expr::Text(_) | Expr::Bool(_) | Expr::Var(_) | Expr::Param(_) => {}
        }
    }
}
