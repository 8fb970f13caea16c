//! Lazy, memoized lookup of compiled procedures by signature.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use precomp::project::block::{Block, BlockId};
use precomp::{MARKER_INPUT, MARKER_OPCODE};
use tracing::{debug, warn};

use crate::host::target::RuntimeTarget;
use crate::shim::generator::StepSequence;
use crate::shim::materialize::{HelperTable, MaterializeError, Unit, materialize};
use crate::value::Value;

/// What a signature resolved to.
#[derive(Debug)]
pub enum Procedure {
    Compiled(Rc<Unit>),
    /// No compiled body exists; calls complete at once with no value.
    Missing,
}

impl Procedure {
    /// Start a call. `warp` is true when the call site runs in warp mode or
    /// the signature is warp-marked.
    pub fn instantiate(&self, args: Vec<Value>, warp: bool) -> StepSequence {
        match self {
            Procedure::Compiled(unit) => StepSequence::with_args(Rc::clone(unit), args, warp),
            Procedure::Missing => StepSequence::Finished,
        }
    }

    pub fn unit(&self) -> Option<&Rc<Unit>> {
        match self {
            Procedure::Compiled(unit) => Some(unit),
            Procedure::Missing => None,
        }
    }
}

type TargetKey = (String, String);

/// Materialized units for the loaded program, keyed by target name.
/// The first entry stored under a key is kept for the life of the cache.
#[derive(Debug, Default)]
pub struct ProcedureCache {
    procedures: RefCell<HashMap<TargetKey, Rc<Procedure>>>,
    markers: RefCell<HashMap<TargetKey, Rc<Unit>>>,
}

impl ProcedureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a called signature (call-type marker included) on `target`.
    pub fn resolve(
        &self,
        target: &RuntimeTarget,
        signature: &str,
        helpers: &HelperTable,
    ) -> Result<Rc<Procedure>, MaterializeError> {
        let bare = bare_signature(signature);
        let key = (target.name().to_string(), bare.to_string());
        if let Some(hit) = self.procedures.borrow().get(&key) {
            return Ok(Rc::clone(hit));
        }

        let procedure = match find_marker(target, bare) {
            Some((marker_id, source)) => {
                debug!(sprite = target.name(), signature = bare, "materializing procedure");
                Procedure::Compiled(self.marker_unit(target.name(), &marker_id, &source, helpers)?)
            }
            None => {
                warn!(
                    sprite = target.name(),
                    signature = bare,
                    "no compiled procedure for signature, calls will do nothing"
                );
                Procedure::Missing
            }
        };
        let mut procedures = self.procedures.borrow_mut();
        Ok(Rc::clone(procedures.entry(key).or_insert_with(|| Rc::new(procedure))))
    }

    /// The unit for the marker block `marker` on `target`, materialized from
    /// `source` on first use.
    pub fn marker_unit(
        &self,
        target: &str,
        marker: &str,
        source: &str,
        helpers: &HelperTable,
    ) -> Result<Rc<Unit>, MaterializeError> {
        let key = (target.to_string(), marker.to_string());
        if let Some(hit) = self.markers.borrow().get(&key) {
            return Ok(Rc::clone(hit));
        }
        let unit = Rc::new(materialize(source, helpers)?);
        let mut markers = self.markers.borrow_mut();
        Ok(Rc::clone(markers.entry(key).or_insert(unit)))
    }

    /// Number of memoized signature lookups, hits and misses alike.
    pub fn len(&self) -> usize {
        self.procedures.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drop the `W`/`Z` call-type marker.
pub fn bare_signature(signature: &str) -> &str {
    signature
        .strip_prefix('W')
        .or_else(|| signature.strip_prefix('Z'))
        .unwrap_or(signature)
}

/// Prototype → definition → successor. Returns the successor's id and
/// source when it is a marker block with a text payload.
fn find_marker(target: &RuntimeTarget, proccode: &str) -> Option<(BlockId, String)> {
    let (_, prototype) = target.data.find_prototype(proccode)?;
    let definition = target.block(prototype.parent.as_deref()?)?;
    let marker_id = definition.next.as_deref()?;
    let marker = target.block(marker_id)?;
    if marker.opcode != MARKER_OPCODE {
        return None;
    }
    let source = marker_source(target, marker)?;
    Some((marker_id.to_string(), source))
}

/// Text carried by a marker block: inline, or in a `text` shadow block.
pub fn marker_source(target: &RuntimeTarget, marker: &Block) -> Option<String> {
    if let Some(text) = marker.input_text(MARKER_INPUT) {
        return Some(text.to_string());
    }
    let shadow = target.block(marker.input_block(MARKER_INPUT)?)?;
    if shadow.opcode != "text" {
        return None;
    }
    shadow.field_text("TEXT")
}
