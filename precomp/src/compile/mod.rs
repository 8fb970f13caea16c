//! The compiler contract consumed by the rebuild, and the reference
//! `BlockCompiler` that implements it.

mod lower;

pub use lower::BlockCompiler;

use indexmap::IndexMap;
use thiserror::Error;

use crate::code::Script;
use crate::project::Target;
use crate::project::block::BlockId;

/// Why a hat or procedure could not be compiled. The rebuild keeps the
/// original blocks for it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct CompileFailure {
    pub reason: String,
}

impl CompileFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        CompileFailure {
            reason: reason.into(),
        }
    }
}

/// Output of a successful compilation.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledBody {
    /// A function value, produced for hats.
    Function(Script),
    /// Raw source text, produced for procedures.
    Source(String),
}

impl CompiledBody {
    /// The step-code source of this body.
    pub fn source(&self) -> String {
        match self {
            CompiledBody::Function(script) => script.to_string(),
            CompiledBody::Source(text) => text.clone(),
        }
    }
}

/// Compiler output for one hat or procedure definition.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledUnit {
    /// The hat or `procedures_definition` block the unit was compiled from.
    pub top_block_id: BlockId,
    pub result: Result<CompiledBody, CompileFailure>,
}

impl CompiledUnit {
    pub fn success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-target compiler results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetResults {
    /// Keyed by hat block id, in table order.
    pub hats: IndexMap<BlockId, CompiledUnit>,
    pub procedures: Vec<CompiledUnit>,
}

impl TargetResults {
    pub fn units(&self) -> impl Iterator<Item = &CompiledUnit> {
        self.hats.values().chain(self.procedures.iter())
    }
}

pub trait Compiler {
    fn compile_target(&self, target: &Target) -> TargetResults;

    /// Helpers the generated code may call, by name, as helper-definition
    /// source. Shipped in the bootstrap payload.
    fn runtime_helpers(&self) -> IndexMap<String, String>;
}
