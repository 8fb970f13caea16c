use std::fmt;
use std::rc::Rc;

use crate::error::RuntimeError;
use crate::host::clock::Clock;
use crate::host::primitives::Primitives;
use crate::host::thread::{BlockState, Thread};
use crate::host::util::{Args, BlockUtility, UtilMode};
use crate::host::Runtime;
use crate::value::Value;

/// Result of one compatibility call.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// False when the block asked to run again next tick.
    pub finished: bool,
    pub value: Value,
}

/// Lets compiled code run interpreted block operations. Captured from the
/// host the first time compiled code is entered, then reused.
pub struct CompatLayer {
    primitives: Rc<Primitives>,
    clock: Rc<dyn Clock>,
}

impl fmt::Debug for CompatLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompatLayer").finish_non_exhaustive()
    }
}

impl CompatLayer {
    pub fn capture(runtime: &Runtime) -> Self {
        CompatLayer {
            primitives: runtime.primitives(),
            clock: runtime.clock(),
        }
    }

    /// Milliseconds since the current tick began.
    pub fn elapsed_ms(&self, runtime: &Runtime) -> f64 {
        let elapsed = self.clock.now().saturating_sub(runtime.tick_started());
        elapsed.as_secs_f64() * 1000.0
    }

    /// Run `opcode` once with already evaluated `args`. `state` carries
    /// timers and counters across reruns of the same call.
    pub fn run(
        &self,
        runtime: &mut Runtime,
        thread: &mut Thread,
        opcode: &str,
        args: &Args,
        state: &mut BlockState,
    ) -> Result<Completion, RuntimeError> {
        let primitive = self.primitives.get(opcode);
        let mut util = BlockUtility::new(runtime, thread, state, UtilMode::Compat, None);
        let value = match primitive {
            Some(primitive) => primitive(args, &mut util)?,
            None => Runtime::dispatch(opcode, args, &mut util)?,
        };
        Ok(Completion {
            finished: !util.signals.rerun,
            value,
        })
    }
}
