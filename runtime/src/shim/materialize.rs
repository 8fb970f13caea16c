//! Turning step-code source into an executable unit.

use std::rc::Rc;

use indexmap::IndexMap;
use precomp::code::{Arg, Expr, HelperDef, ParseError, Parser, Stmt};
use thiserror::Error;

/// Approved helpers, as shipped in the bootstrap payload.
pub type HelperTable = IndexMap<String, Rc<HelperDef>>;

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("helper `{0}` is not in the approved helper table")]
    UnknownHelper(String),
}

/// Index of a statement list in a unit's arena.
pub type BodyId = usize;

/// A statement with nested bodies flattened into arena references.
#[derive(Debug, Clone)]
pub enum Instr {
    Set { var: String, value: Expr },
    Change { var: String, by: Expr },
    Op { opcode: String, args: Vec<Arg> },
    Call { signature: String, args: Vec<Expr> },
    Yield,
    Repeat { times: Expr, body: BodyId },
    Forever { body: BodyId },
    While { cond: Expr, body: BodyId },
    Until { cond: Expr, body: BodyId },
    If { cond: Expr, then: BodyId, otherwise: BodyId },
    Return(Option<Expr>),
}

impl Instr {
    /// Whether running this instruction may suspend the sequence.
    fn may_suspend(&self) -> bool {
        matches!(
            self,
            Instr::Op { .. }
                | Instr::Call { .. }
                | Instr::Yield
                | Instr::Repeat { .. }
                | Instr::Forever { .. }
                | Instr::While { .. }
                | Instr::Until { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// Has suspension points; driven one resumption per tick.
    Resumable,
    /// Straight-line code that always runs to completion in one go.
    SingleShot,
}

/// A materialized compiled body. Shared by every instantiation.
#[derive(Debug)]
pub struct Unit {
    pub params: Vec<String>,
    pub kind: UnitKind,
    bodies: Vec<Vec<Instr>>,
    helpers: HelperTable,
}

/// The arena slot holding the unit's top-level statements.
pub const ENTRY: BodyId = 0;

impl Unit {
    pub fn body(&self, id: BodyId) -> &[Instr] {
        self.bodies.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// A helper this unit was linked against.
    pub fn helper(&self, name: &str) -> Option<&HelperDef> {
        self.helpers.get(name).map(Rc::as_ref)
    }

    pub fn helper_names(&self) -> impl Iterator<Item = &str> {
        self.helpers.keys().map(String::as_str)
    }
}

/// Parse `source` as a unit and link it against `table`.
pub fn materialize(source: &str, table: &HelperTable) -> Result<Unit, MaterializeError> {
    let script = Parser::new(source, 0).parse_script()?;
    let helpers = link(script.helper_names(), table)?;

    let mut bodies = vec![Vec::new()];
    let entry = flatten(&script.body, &mut bodies);
    bodies[ENTRY] = entry;

    let kind = if bodies.iter().flatten().any(Instr::may_suspend) {
        UnitKind::Resumable
    } else {
        UnitKind::SingleShot
    };
    Ok(Unit {
        params: script.params,
        kind,
        bodies,
        helpers,
    })
}

/// Resolve `wanted` and everything the resolved helpers call in turn.
fn link(wanted: Vec<String>, table: &HelperTable) -> Result<HelperTable, MaterializeError> {
    let mut linked = HelperTable::new();
    let mut pending = wanted;
    while let Some(name) = pending.pop() {
        if linked.contains_key(&name) {
            continue;
        }
        let helper = table
            .get(&name)
            .ok_or_else(|| MaterializeError::UnknownHelper(name.clone()))?;
        pending.extend(helper.body.helper_names());
        linked.insert(name, Rc::clone(helper));
    }
    Ok(linked)
}

/// Reserve an arena slot for `stmts`, then fill it.
fn nested(stmts: &[Stmt], bodies: &mut Vec<Vec<Instr>>) -> BodyId {
    let id = bodies.len();
    bodies.push(Vec::new());
    let body = flatten(stmts, bodies);
    bodies[id] = body;
    id
}

fn flatten(stmts: &[Stmt], bodies: &mut Vec<Vec<Instr>>) -> Vec<Instr> {
    stmts
        .iter()
        .map(|stmt| match stmt {
            Stmt::Set { var, value } => Instr::Set {
                var: var.clone(),
                value: value.clone(),
            },
            Stmt::Change { var, by } => Instr::Change {
                var: var.clone(),
                by: by.clone(),
            },
            Stmt::Op { opcode, args } => Instr::Op {
                opcode: opcode.clone(),
                args: args.clone(),
            },
            Stmt::Call { signature, args } => Instr::Call {
                signature: signature.clone(),
                args: args.clone(),
            },
            Stmt::Yield => Instr::Yield,
            Stmt::Repeat { times, body } => Instr::Repeat {
                times: times.clone(),
                body: nested(body, bodies),
            },
            Stmt::Forever { body } => Instr::Forever {
                body: nested(body, bodies),
            },
            Stmt::While { cond, body } => Instr::While {
                cond: cond.clone(),
                body: nested(body, bodies),
            },
            Stmt::Until { cond, body } => Instr::Until {
                cond: cond.clone(),
                body: nested(body, bodies),
            },
            Stmt::If {
                cond,
                then,
                otherwise,
            } => Instr::If {
                cond: cond.clone(),
                then: nested(then, bodies),
                otherwise: nested(otherwise, bodies),
            },
            Stmt::Return(value) => Instr::Return(value.clone()),
        })
        .collect()
}

/// Helper table from a decoded bootstrap payload. Later duplicates lose.
pub fn helper_table(helpers: Vec<HelperDef>) -> HelperTable {
    let mut table = HelperTable::new();
    for helper in helpers {
        if !table.contains_key(&helper.name) {
            table.insert(helper.name.clone(), Rc::new(helper));
        }
    }
    table
}
