
use indexmap::IndexMap;
use precomp::project::block::BlockId;

use crate::error::RuntimeError;
use crate::host::target::RuntimeTarget;
use crate::host::thread::{BlockState, Thread, ThreadStatus};
use crate::host::Runtime;
use crate::value::Value;

/// Evaluated inputs and fields of one block, by name.
pub type Args = IndexMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtilMode {
    /// Called by the block interpreter on a real block.
    Interpreted,
    /// Called from compiled code; there is no block stack to branch on.
    Compat,
}

/// What a block asked the interpreter to do once it returns.
#[derive(Debug, Default)]
pub(crate) struct Signals {
    pub rerun: bool,
    pub branch: Option<(u8, bool)>,
    pub procedure: Option<String>,
    pub stop_script: bool,
}

/// The handle block implementations get: the running thread, its target,
/// and the executing block's private state.
pub struct BlockUtility<'a> {
    pub runtime: &'a mut Runtime,
    pub thread: &'a mut Thread,
    state: &'a mut BlockState,
    mode: UtilMode,
    block_id: Option<BlockId>,
    pub(crate) signals: Signals,
}

impl<'a> BlockUtility<'a> {
    pub fn new(
        runtime: &'a mut Runtime,
        thread: &'a mut Thread,
        state: &'a mut BlockState,
        mode: UtilMode,
        block_id: Option<BlockId>,
    ) -> Self {
        BlockUtility {
            runtime,
            thread,
            state,
            mode,
            block_id,
            signals: Signals::default(),
        }
    }

    pub fn mode(&self) -> UtilMode {
        self.mode
    }

    /// Id of the block being executed; `None` in compatibility mode.
    pub fn block_id(&self) -> Option<&str> {
        self.block_id.as_deref()
    }

    pub fn target(&self) -> &RuntimeTarget {
        &self.runtime.targets[self.thread.target]
    }

    pub fn state(&mut self) -> &mut BlockState {
        self.state
    }

    // -----------------------------------------------------------------------
    // Control flow
    // -----------------------------------------------------------------------

    /// Stop for this tick and run the same block again next tick.
    pub fn yield_tick(&mut self) {
        self.thread.status = ThreadStatus::YieldTick;
        self.signals.rerun = true;
    }

    /// The block is done, but the thread should not continue this tick.
    pub fn yield_after_completion(&mut self) {
        self.thread.status = ThreadStatus::YieldTick;
    }

    /// Enter substack `branch` (1-based) once this block returns.
    pub fn start_branch(&mut self, branch: u8, is_loop: bool) -> Result<(), RuntimeError> {
        if self.mode == UtilMode::Compat {
            return Err(RuntimeError::CompatUnsupported("start_branch"));
        }
        self.signals.branch = Some((branch, is_loop));
        Ok(())
    }

    pub fn start_procedure(&mut self, proccode: &str) -> Result<(), RuntimeError> {
        if self.mode == UtilMode::Compat {
            return Err(RuntimeError::CompatUnsupported("start_procedure"));
        }
        self.signals.procedure = Some(proccode.to_string());
        Ok(())
    }

    pub fn stop_this_script(&mut self) -> Result<(), RuntimeError> {
        if self.mode == UtilMode::Compat {
            return Err(RuntimeError::CompatUnsupported("stop_this_script"));
        }
        self.signals.stop_script = true;
        Ok(())
    }

    /// Procedure argument visible from the running block.
    pub fn param(&self, name: &str) -> Result<Option<Value>, RuntimeError> {
        if self.mode == UtilMode::Compat {
            return Err(RuntimeError::CompatUnsupported("param"));
        }
        Ok(self.thread.param(name).cloned())
    }

    // -----------------------------------------------------------------------
    // Timers
    // -----------------------------------------------------------------------

    pub fn stack_timer_needs_init(&self) -> bool {
        self.state.timer.is_none()
    }

    pub fn start_stack_timer(&mut self, milliseconds: f64) {
        self.state.timer = Some(self.runtime.clock().now());
        self.state.duration = milliseconds;
    }

    pub fn stack_timer_finished(&self) -> bool {
        let Some(started) = self.state.timer else {
            return true;
        };
        let elapsed = self.runtime.clock().now().saturating_sub(started);
        elapsed.as_secs_f64() * 1000.0 >= self.state.duration
    }

    // -----------------------------------------------------------------------
    // Data
    // -----------------------------------------------------------------------

    pub fn variable(&self, name: &str) -> Value {
        self.runtime.variable(self.thread.target, name)
    }

    pub fn set_variable(&mut self, name: &str, value: Value) {
        self.runtime.set_variable(self.thread.target, name, value);
    }
}
