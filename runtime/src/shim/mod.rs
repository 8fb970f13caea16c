//! The runtime shim: an extension plus scheduler hook that runs compiled
//! bodies in place of the interpreter.
//!
//! A compiled body is entered when a thread reaches its marker block. The
//! `compile` operation materializes the marker's step code (once per
//! marker), attaches the resulting step sequence to the thread and yields.
//! From then on the hook resumes the sequence once per tick; when it
//! completes, the thread continues past the marker on the interpreter, or
//! is retired if nothing is left.

mod bootstrap;
mod compat;
mod eval;
mod generator;
mod materialize;
mod procedures;

pub use bootstrap::install;
pub use compat::{CompatLayer, Completion};
pub use generator::{Generator, Step, StepSequence};
pub use materialize::{HelperTable, MaterializeError, Unit, UnitKind, helper_table, materialize};
pub use procedures::{Procedure, ProcedureCache, bare_signature, marker_source};

use std::rc::Rc;

use indexmap::IndexMap;
use once_cell::unsync::OnceCell;
use precomp::code::Bootstrap;
use precomp::{MARKER_INPUT, SHIM_ID};
use tracing::{debug, info};

use crate::error::RuntimeError;
use crate::host::extension::{ArgumentInfo, ArgumentKind, BlockKind, ExtensionBlock};
use crate::host::thread::{Thread, ThreadStatus};
use crate::host::util::{Args, BlockUtility, UtilMode};
use crate::host::{Extension, ExtensionInfo, HookOutcome, Runtime, SchedulerHook, interpret};
use crate::value::Value;

const HOMEPAGE: &str = env!("CARGO_PKG_HOMEPAGE");

/// Everything compiled code reaches while it runs.
pub(crate) struct Exec<'a> {
    pub runtime: &'a mut Runtime,
    pub thread: &'a mut Thread,
    pub shim: &'a Shim,
}

/// Shim state for one loaded program.
#[derive(Debug)]
pub struct Shim {
    version: String,
    helpers: HelperTable,
    procedures: ProcedureCache,
    compat: OnceCell<CompatLayer>,
}

impl Shim {
    pub fn new(bootstrap: Bootstrap) -> Self {
        Shim {
            version: bootstrap.version,
            helpers: helper_table(bootstrap.helpers),
            procedures: ProcedureCache::new(),
            compat: OnceCell::new(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn helper_count(&self) -> usize {
        self.helpers.len()
    }

    pub fn helpers(&self) -> &HelperTable {
        &self.helpers
    }

    pub fn procedures(&self) -> &ProcedureCache {
        &self.procedures
    }

    /// Whether compiled code has been entered yet.
    pub fn is_captured(&self) -> bool {
        self.compat.get().is_some()
    }

    /// The compatibility layer, captured from `runtime` on first use.
    pub fn compat(&self, runtime: &Runtime) -> &CompatLayer {
        self.compat.get_or_init(|| {
            debug!("capturing compatibility layer");
            CompatLayer::capture(runtime)
        })
    }

    /// Resolve a called signature on target `target`.
    pub fn resolve(&self, runtime: &Runtime, target: usize, signature: &str) -> Result<Rc<Procedure>, RuntimeError> {
        let target = runtime
            .targets
            .get(target)
            .ok_or_else(|| RuntimeError::MissingBlock(signature.to_string()))?;
        Ok(self.procedures.resolve(target, signature, &self.helpers)?)
    }

    /// The `compile` block: enter the compiled body carried by the marker
    /// the interpreter is on.
    fn compile(&self, args: &Args, util: &mut BlockUtility<'_>) -> Result<Value, RuntimeError> {
        if util.mode() != UtilMode::Interpreted {
            return Err(RuntimeError::MarkerOutsideScript);
        }
        let marker = util
            .block_id()
            .ok_or(RuntimeError::MarkerOutsideScript)?
            .to_string();
        self.compat(util.runtime);

        let source = args.get(MARKER_INPUT).map(Value::to_string).unwrap_or_default();
        let target = util.target().name().to_string();
        let unit = self
            .procedures
            .marker_unit(&target, &marker, &source, &self.helpers)?;

        let mut params = IndexMap::new();
        for name in &unit.params {
            params.insert(name.clone(), util.param(name)?.unwrap_or_default());
        }
        let warp = util.thread.in_warp();
        debug!(sprite = %target, marker = %marker, warp, "attaching compiled body");
        util.thread.generator = Some(StepSequence::new(unit, params, warp));
        util.yield_tick();
        Ok(Value::Empty)
    }

    /// The compiled body ended: move past the marker and let the
    /// interpreter unwind, which retires the thread when nothing is left.
    fn finish(&self, runtime: &mut Runtime, thread: &mut Thread) {
        if thread.is_done() {
            return;
        }
        interpret::advance(runtime, thread);
        if thread.status == ThreadStatus::Running {
            interpret::step_thread(runtime, thread);
        }
    }
}

impl Extension for Shim {
    fn info(&self, locale: &str) -> ExtensionInfo {
        let (about, compiled) = match locale.to_ascii_lowercase().as_str() {
            "zh-cn" => ("关于 precomp 编译器", "(已编译)"),
            "ja" => ("precomp コンパイラーについて", "(コンパイル済)"),
            _ => ("About precomp", "(Compiled)"),
        };
        let mut arguments = IndexMap::new();
        arguments.insert(
            MARKER_INPUT.to_string(),
            ArgumentInfo {
                kind: ArgumentKind::String,
                default: String::new(),
            },
        );

        ExtensionInfo {
            id: SHIM_ID.to_string(),
            name: "Precompiled Runtime".to_string(),
            color: "#00ffda".to_string(),
            blocks: vec![
                ExtensionBlock::label(format!("🛠️ precomp v{}", self.version)),
                ExtensionBlock {
                    kind: BlockKind::Button,
                    opcode: None,
                    func: Some("project".to_string()),
                    text: format!("🤖 {about}"),
                    hidden: false,
                    arguments: IndexMap::new(),
                },
                ExtensionBlock {
                    kind: BlockKind::Command,
                    opcode: Some("compile".to_string()),
                    func: None,
                    text: compiled.to_string(),
                    hidden: true,
                    arguments,
                },
            ],
            requires_unsandboxed: true,
        }
    }

    fn call(&self, opcode: &str, args: &Args, util: &mut BlockUtility<'_>) -> Result<Value, RuntimeError> {
        match opcode {
            "compile" => self.compile(args, util),
            other => {
                debug!(opcode = other, "unknown shim opcode");
                Ok(Value::Empty)
            }
        }
    }

    fn press_button(&self, func: &str, _runtime: &mut Runtime) {
        if func == "project" {
            if HOMEPAGE.is_empty() {
                info!("precomp v{}", self.version);
            } else {
                info!("precomp v{}: {HOMEPAGE}", self.version);
            }
        }
    }
}

impl SchedulerHook for Shim {
    fn step_thread(&self, runtime: &mut Runtime, thread: &mut Thread) -> HookOutcome {
        let Some(mut sequence) = thread.generator.take() else {
            return HookOutcome::Unhandled;
        };

        loop {
            let mut exec = Exec {
                runtime: &mut *runtime,
                thread: &mut *thread,
                shim: self,
            };
            let step = sequence.resume(&mut exec);
            match step {
                Err(error) => {
                    runtime.report_error(thread, error);
                    return HookOutcome::Handled;
                }
                Ok(_) if thread.is_done() => return HookOutcome::Handled,
                Ok(Step::Yield) if thread.status == ThreadStatus::YieldTick => {
                    // A compatibility call finished but left the interpreter's
                    // conservative yield behind: keep going this tick.
                    thread.status = ThreadStatus::Running;
                }
                Ok(Step::Yield) => {
                    thread.generator = Some(sequence);
                    return HookOutcome::Handled;
                }
                Ok(Step::Done(_)) => {
                    self.finish(runtime, thread);
                    return HookOutcome::Handled;
                }
            }
        }
    }
}
