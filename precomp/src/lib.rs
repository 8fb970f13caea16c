pub mod code;
pub mod compile;
pub mod config;
pub mod error;
pub mod project;
pub mod rebuild;

pub use config::{ConfigError, LayoutConfig, RebuildConfig};
pub use error::RebuildError;
pub use project::Project;
pub use rebuild::{RebuildReport, Rebuilt, precompile, precompile_file, rebuild};

/// Extension id under which the runtime shim registers itself.
pub const SHIM_ID: &str = "precomp";

/// Opcode of the marker block that carries a compiled body.
pub const MARKER_OPCODE: &str = "precomp_compile";

/// Name of the marker block's source-text input.
pub const MARKER_INPUT: &str = "CODE";

/// Version tag embedded in every bootstrap payload.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
