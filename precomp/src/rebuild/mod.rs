//! Rewrites a program so compiled bodies travel as marker blocks, and
//! injects the runtime shim's bootstrap payload.

pub mod extensions;
pub mod layout;
pub mod payload;

use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};

use crate::code::minify;
use crate::compile::{BlockCompiler, CompiledUnit, Compiler, TargetResults};
use crate::config::RebuildConfig;
use crate::error::RebuildError;
use crate::project::block::{Block, BlockEntry, BlockId, InputValue, script_members};
use crate::project::{Project, Target};
use crate::rebuild::layout::LayoutCursor;
use crate::{MARKER_INPUT, MARKER_OPCODE, SHIM_ID, VERSION};

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RebuildReport {
    pub targets: Vec<TargetReport>,
    pub preserved_extensions: Vec<String>,
    pub dropped_extensions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TargetReport {
    pub name: String,
    /// Hats now followed by a marker block.
    pub hats: Vec<BlockId>,
    /// Procedure definitions now followed by a marker block.
    pub procedures: Vec<BlockId>,
    pub failures: Vec<UnitFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitFailure {
    pub block_id: BlockId,
    pub reason: String,
}

impl RebuildReport {
    pub fn failure_count(&self) -> usize {
        self.targets.iter().map(|t| t.failures.len()).sum()
    }
}

/// The rebuilt program and what happened to it.
#[derive(Debug, Clone)]
pub struct Rebuilt {
    pub project: Project,
    pub report: RebuildReport,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Compile every target with `compiler`, then rebuild.
pub fn precompile(
    project: &Project,
    compiler: &dyn Compiler,
    config: &RebuildConfig,
) -> Result<Rebuilt, RebuildError> {
    info!(targets = project.targets.len(), "compiling the project");
    let results: Vec<TargetResults> = project
        .targets
        .iter()
        .map(|target| compiler.compile_target(target))
        .collect();
    rebuild(project, &results, &compiler.runtime_helpers(), config)
}

/// Read a descriptor, precompile it with the reference compiler, write the
/// result to `dest`.
pub fn precompile_file(
    src: &Path,
    dest: &Path,
    config: &RebuildConfig,
) -> Result<RebuildReport, RebuildError> {
    let io_error = |path: &Path| {
        let path = path.display().to_string();
        move |source| RebuildError::Io { path, source }
    };
    info!(path = %src.display(), "reading program descriptor");
    let text = std::fs::read_to_string(src).map_err(io_error(src))?;
    let project = Project::from_json(&text)?;
    let Rebuilt { project, report } = precompile(&project, &BlockCompiler, config)?;
    info!(path = %dest.display(), "writing program descriptor");
    std::fs::write(dest, project.to_json()?).map_err(io_error(dest))?;
    Ok(report)
}

/// Produce the rebuilt program from `source` and the per-target compiler
/// results (one entry per target, same order).
pub fn rebuild(
    source: &Project,
    results: &[TargetResults],
    helpers: &IndexMap<String, String>,
    config: &RebuildConfig,
) -> Result<Rebuilt, RebuildError> {
    if results.len() != source.targets.len() {
        return Err(RebuildError::TargetCountMismatch {
            targets: source.targets.len(),
            results: results.len(),
        });
    }

    let mut project = source.clone();
    let mut report = RebuildReport::default();

    for ((original, output), results) in source.targets.iter().zip(&mut project.targets).zip(results) {
        let _span = tracing::info_span!("target", name = %original.name).entered();
        report.targets.push(rebuild_target(original, output, results, config));
    }

    if let Some(main) = project.targets.first_mut() {
        let (kept, dropped) = extensions::preserve_extensions(&source.targets, &source.extensions, main);
        report.preserved_extensions = kept;
        report.dropped_extensions = dropped;
    } else {
        report.dropped_extensions = source.extensions.clone();
    }
    // Only extensions with a placeholder can be loaded back.
    project
        .extensions
        .retain(|ext| report.preserved_extensions.contains(ext));

    info!("injecting runtime shim");
    if !project.extensions.iter().any(|ext| ext == SHIM_ID) {
        project.extensions.push(SHIM_ID.to_string());
    }
    let bootstrap = payload::bootstrap_source(helpers, VERSION, config.minify);
    project
        .extension_urls
        .insert(SHIM_ID.to_string(), payload::data_url(&bootstrap));

    Ok(Rebuilt { project, report })
}

// ---------------------------------------------------------------------------
// Per target
// ---------------------------------------------------------------------------

fn rebuild_target(
    original: &Target,
    output: &mut Target,
    results: &TargetResults,
    config: &RebuildConfig,
) -> TargetReport {
    let mut report = TargetReport {
        name: original.name.clone(),
        ..TargetReport::default()
    };

    output.blocks = IndexMap::new();
    let keep_config = output.is_stage;
    output
        .comments
        .retain(|_, comment| keep_config && comment.text.ends_with(&config.config_comment_suffix));

    let mut cursor = LayoutCursor::new(config.layout);
    for (unit, is_hat) in results
        .hats
        .values()
        .map(|unit| (unit, true))
        .chain(results.procedures.iter().map(|unit| (unit, false)))
    {
        match rebuild_unit(original, output, unit, &mut cursor, config) {
            Ok(false) => {}
            Ok(true) if is_hat => report.hats.push(unit.top_block_id.clone()),
            Ok(true) => report.procedures.push(unit.top_block_id.clone()),
            Err(reason) => {
                error!(block = %unit.top_block_id, %reason, "failed to rebuild, keeping original blocks");
                copy_script(original, output, &unit.top_block_id);
                report.failures.push(UnitFailure {
                    block_id: unit.top_block_id.clone(),
                    reason,
                });
            }
        }
    }

    if report.hats.is_empty() && report.procedures.is_empty() {
        info!("nothing to do in this target");
    }
    report
}

/// Copy the top block and everything hanging off its inputs, then plant
/// the marker block under the top block's old `next` id. Returns whether a
/// marker was planted; a top block without a body gets none.
fn rebuild_unit(
    original: &Target,
    output: &mut Target,
    unit: &CompiledUnit,
    cursor: &mut LayoutCursor,
    config: &RebuildConfig,
) -> Result<bool, String> {
    let body = unit.result.as_ref().map_err(|failure| failure.reason.clone())?;
    let top = original
        .block(&unit.top_block_id)
        .ok_or_else(|| format!("block `{}` does not exist", unit.top_block_id))?;

    let source = body.source();
    let text = if config.minify {
        minify(&source).map_err(|e| format!("cannot size-reduce generated code: {e}"))?
    } else {
        source
    };

    let mut copy = top.clone();
    cursor.place(&mut copy);
    output
        .blocks
        .insert(unit.top_block_id.clone(), BlockEntry::Block(copy));
    copy_inputs(original, output, top);

    if let Some(next) = &top.next {
        info!(block = %unit.top_block_id, "rebuilding with compiled code");
        output
            .blocks
            .insert(next.clone(), BlockEntry::Block(marker(&unit.top_block_id, text)));
    }
    Ok(top.next.is_some())
}

/// Blocks referenced by `block`'s inputs, with their own descendants.
/// For a definition this brings the prototype and its parameter reporters.
fn copy_inputs(original: &Target, output: &mut Target, block: &Block) {
    for name in block.inputs.keys() {
        if let Some(InputValue::Block(id)) = block.input(name) {
            copy_script(original, output, id);
        }
    }
}

fn copy_script(original: &Target, output: &mut Target, root: &str) {
    for id in script_members(&original.blocks, root) {
        if let Some(entry) = original.blocks.get(id) {
            output.blocks.insert(id.to_string(), entry.clone());
        }
    }
}

/// The synthetic block carrying a compiled body.
pub fn marker(parent: &str, source: String) -> Block {
    let mut block = Block::new(MARKER_OPCODE);
    block.parent = Some(parent.to_string());
    block
        .inputs
        .insert(MARKER_INPUT.to_string(), json!([1, [10, source]]));
    block
}
