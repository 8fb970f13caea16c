//! A minimal cooperative host: targets, threads, a tick loop and the block
//! interpreter, with a scheduler hook interface extensions can plug into.

pub mod clock;
pub mod extension;
pub mod interpret;
pub mod primitives;
pub mod target;
pub mod thread;
pub mod util;

use std::rc::Rc;
use std::time::Duration;

use indexmap::IndexMap;
use precomp::Project;
use precomp::project::block::BlockId;
use tracing::{debug, error, info};

use crate::error::RuntimeError;
use crate::value::Value;

pub use clock::{Clock, ManualClock, SystemClock};
pub use extension::{Extension, ExtensionInfo};
pub use primitives::Primitives;
pub use target::RuntimeTarget;
pub use thread::{Thread, ThreadId, ThreadStatus};
pub use util::{Args, BlockUtility, UtilMode};

/// Warp-mode loops give up their tick once it has run this long.
const STUCK_AFTER: Duration = Duration::from_millis(500);

/// What the host has granted to extensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub unsandboxed: bool,
}

/// Whether a scheduler hook took over a thread's step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    Handled,
    Unhandled,
}

/// Offered every thread step before the interpreter gets it.
pub trait SchedulerHook {
    fn step_thread(&self, runtime: &mut Runtime, thread: &mut Thread) -> HookOutcome;
}

/// An error that ended a script.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptError {
    pub target: String,
    pub top_block: BlockId,
    pub message: String,
}

#[derive(Debug, Clone, Copy)]
enum StopRequest {
    All,
    OtherScripts { target: usize, keep: ThreadId },
}

pub struct Runtime {
    pub targets: Vec<RuntimeTarget>,
    threads: Vec<Thread>,
    hooks: Vec<Rc<dyn SchedulerHook>>,
    extensions: IndexMap<String, Rc<dyn Extension>>,
    primitives: Rc<Primitives>,
    clock: Rc<dyn Clock>,
    capabilities: Capabilities,
    locale: String,
    tick_started: Duration,
    ticks: u64,
    next_thread_id: ThreadId,
    errors: Vec<ScriptError>,
    stops: Vec<StopRequest>,
}

impl Runtime {
    pub fn new(project: &Project) -> Self {
        Self::with_clock(project, Rc::new(SystemClock::new()))
    }

    pub fn with_clock(project: &Project, clock: Rc<dyn Clock>) -> Self {
        Runtime {
            targets: project.targets.iter().map(RuntimeTarget::new).collect(),
            threads: Vec::new(),
            hooks: Vec::new(),
            extensions: IndexMap::new(),
            primitives: Rc::new(Primitives::standard()),
            clock,
            capabilities: Capabilities::default(),
            locale: "en".to_string(),
            tick_started: Duration::ZERO,
            ticks: 0,
            next_thread_id: 0,
            errors: Vec::new(),
            stops: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn set_capabilities(&mut self, capabilities: Capabilities) {
        self.capabilities = capabilities;
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn set_locale(&mut self, locale: impl Into<String>) {
        self.locale = locale.into();
    }

    pub fn clock(&self) -> Rc<dyn Clock> {
        Rc::clone(&self.clock)
    }

    pub fn primitives(&self) -> Rc<Primitives> {
        Rc::clone(&self.primitives)
    }

    pub fn add_hook(&mut self, hook: Rc<dyn SchedulerHook>) {
        self.hooks.push(hook);
    }

    /// Register an extension under its id. Extensions that need the
    /// unsandboxed capability are refused without it.
    pub fn register_extension(&mut self, extension: Rc<dyn Extension>) -> Result<(), RuntimeError> {
        let info = extension.info(&self.locale);
        if info.requires_unsandboxed && !self.capabilities.unsandboxed {
            return Err(RuntimeError::Sandboxed(info.id));
        }
        info!(extension = %info.id, name = %info.name, "registered extension");
        self.extensions.insert(info.id, extension);
        Ok(())
    }

    pub fn extension(&self, id: &str) -> Option<Rc<dyn Extension>> {
        self.extensions.get(id).cloned()
    }

    pub fn press_button(&mut self, extension: &str, func: &str) {
        if let Some(extension) = self.extension(extension) {
            extension.press_button(func, self);
        }
    }

    // -----------------------------------------------------------------------
    // State
    // -----------------------------------------------------------------------

    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn errors(&self) -> &[ScriptError] {
        &self.errors
    }

    pub fn target(&self, name: &str) -> Option<&RuntimeTarget> {
        self.targets.iter().find(|t| t.name() == name)
    }

    pub fn stage(&self) -> Option<&RuntimeTarget> {
        self.targets.iter().find(|t| t.is_stage())
    }

    /// Look a variable up on `target`, then on the stage.
    pub fn variable(&self, target: usize, name: &str) -> Value {
        self.targets
            .get(target)
            .and_then(|t| t.variables.get(name))
            .or_else(|| self.stage().and_then(|stage| stage.variables.get(name)))
            .cloned()
            .unwrap_or_default()
    }

    /// Assign to the variable `variable(target, name)` would read. Unknown
    /// names become variables of `target`.
    pub fn set_variable(&mut self, target: usize, name: &str, value: Value) {
        let owner = if self.targets[target].variables.contains_key(name) {
            target
        } else {
            self.targets
                .iter()
                .position(|t| t.is_stage() && t.variables.contains_key(name))
                .unwrap_or(target)
        };
        self.targets[owner].variables.insert(name.to_string(), value);
    }

    /// Clock reading taken when the current tick began.
    pub fn tick_started(&self) -> Duration {
        self.tick_started
    }

    pub fn elapsed_in_tick(&self) -> Duration {
        self.clock.now().saturating_sub(self.tick_started)
    }

    pub fn is_stuck(&self) -> bool {
        self.elapsed_in_tick() > STUCK_AFTER
    }

    // -----------------------------------------------------------------------
    // Threads
    // -----------------------------------------------------------------------

    pub fn green_flag(&mut self) -> Vec<ThreadId> {
        self.start_hats("event_whenflagclicked", None)
    }

    pub fn broadcast(&mut self, message: &str) -> Vec<ThreadId> {
        self.start_hats("event_whenbroadcastreceived", Some(("BROADCAST_OPTION", message)))
    }

    /// Start a thread for every top-level `opcode` hat whose field matches.
    /// A hat that is already running restarts.
    pub fn start_hats(&mut self, opcode: &str, field: Option<(&str, &str)>) -> Vec<ThreadId> {
        let mut hats = Vec::new();
        for (index, target) in self.targets.iter().enumerate() {
            for (id, block) in target.data.iter_blocks() {
                if block.opcode != opcode || !block.top_level {
                    continue;
                }
                let matches = field.is_none_or(|(name, expected)| {
                    block
                        .field_text(name)
                        .is_some_and(|value| value.eq_ignore_ascii_case(expected))
                });
                if matches {
                    hats.push((index, id.clone()));
                }
            }
        }

        let mut started = Vec::new();
        for (target, top_block) in hats {
            self.threads
                .retain(|t| !(t.target == target && t.top_block == top_block));
            let id = self.next_thread_id;
            self.next_thread_id += 1;
            debug!(thread = id, block = %top_block, "starting thread");
            self.threads.push(Thread::new(id, target, top_block));
            started.push(id);
        }
        started
    }

    pub fn request_stop_all(&mut self) {
        self.stops.push(StopRequest::All);
    }

    pub fn request_stop_others(&mut self, target: usize, keep: ThreadId) {
        self.stops.push(StopRequest::OtherScripts { target, keep });
    }

    /// Retire every thread at once.
    pub fn stop_all(&mut self) {
        for thread in &mut self.threads {
            thread.retire();
        }
        self.threads.clear();
        self.stops.clear();
    }

    fn apply_stops(&mut self, stepping: &mut [Thread]) {
        for stop in std::mem::take(&mut self.stops) {
            for thread in stepping.iter_mut().chain(self.threads.iter_mut()) {
                let hit = match stop {
                    StopRequest::All => true,
                    StopRequest::OtherScripts { target, keep } => thread.target == target && thread.id != keep,
                };
                if hit {
                    thread.retire();
                }
            }
        }
    }

    /// Record a script error, then end the thread that raised it.
    pub fn report_error(&mut self, thread: &mut Thread, error: RuntimeError) {
        let target = self
            .targets
            .get(thread.target)
            .map(|t| t.name().to_string())
            .unwrap_or_default();
        error!(sprite = %target, thread = thread.id, %error, "script error");
        self.errors.push(ScriptError {
            target,
            top_block: thread.top_block.clone(),
            message: error.to_string(),
        });
        thread.retire();
    }

    // -----------------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------------

    /// Run one tick: every live thread is stepped once, in list order.
    /// Threads started during the tick first run in the next one.
    pub fn step(&mut self) {
        self.ticks += 1;
        self.tick_started = self.clock.now();

        let mut stepping = std::mem::take(&mut self.threads);
        for thread in &mut stepping {
            if thread.status == ThreadStatus::YieldTick {
                thread.status = ThreadStatus::Running;
            }
        }
        for index in 0..stepping.len() {
            if !stepping[index].is_done() {
                self.step_thread(&mut stepping[index]);
            }
            self.apply_stops(&mut stepping);
        }

        let started = std::mem::take(&mut self.threads);
        stepping.retain(|thread| {
            !thread.is_done()
                && !started
                    .iter()
                    .any(|new| new.target == thread.target && new.top_block == thread.top_block)
        });
        stepping.extend(started);
        self.threads = stepping;
    }

    /// Step ticks until no thread is left, up to `max_ticks`. Returns the
    /// number of ticks run.
    pub fn run_until_idle(&mut self, max_ticks: u64) -> u64 {
        let mut ran = 0;
        while !self.threads.is_empty() && ran < max_ticks {
            self.step();
            ran += 1;
        }
        ran
    }

    pub fn step_thread(&mut self, thread: &mut Thread) {
        for hook in self.hooks.clone() {
            if hook.step_thread(self, thread) == HookOutcome::Handled {
                return;
            }
        }
        interpret::step_thread(self, thread);
    }

    /// Run `opcode`: a built-in primitive, or `<extension>_<opcode>` on a
    /// registered extension. Unknown opcodes do nothing.
    pub fn dispatch(opcode: &str, args: &Args, util: &mut BlockUtility<'_>) -> Result<Value, RuntimeError> {
        if let Some(primitive) = util.runtime.primitives.get(opcode) {
            return primitive(args, util);
        }
        let extension = opcode
            .split_once('_')
            .and_then(|(id, rest)| util.runtime.extension(id).map(|ext| (ext, rest)));
        match extension {
            Some((extension, rest)) => extension.call(rest, args, util),
            None => {
                debug!(opcode, "no implementation, skipping block");
                Ok(Value::Empty)
            }
        }
    }
}
