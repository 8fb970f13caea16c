use precomp::code::ParseError;
use thiserror::Error;

use crate::shim::MaterializeError;

/// Errors raised while a script runs. They reach the host's script-error
/// channel and retire the offending thread.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("block `{0}` does not exist")]
    MissingBlock(String),
    #[error("`{0}` is not supported by the compatibility layer")]
    CompatUnsupported(&'static str),
    #[error("extension `{0}` must be loaded unsandboxed")]
    Sandboxed(String),
    #[error("unknown helper `{0}`")]
    UnknownHelper(String),
    #[error("helper `{0}` recursed too deeply")]
    HelperDepth(String),
    #[error("compile marker reached outside an interpreted script")]
    MarkerOutsideScript,
    #[error("cannot load compiled code: {0}")]
    Materialize(#[from] MaterializeError),
}

/// Load-time failures of the runtime shim. All of them abort loading.
#[derive(Debug, Error)]
pub enum ShimError {
    #[error("the precompiled runtime needs to be loaded unsandboxed")]
    Sandboxed,
    #[error("bootstrap payload is not a base64 data URL")]
    Payload,
    #[error("malformed bootstrap payload: {0}")]
    Bootstrap(#[from] ParseError),
    #[error("cannot register the precompiled runtime: {0}")]
    Register(#[from] RuntimeError),
}
