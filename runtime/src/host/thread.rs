use indexmap::IndexMap;
use precomp::project::block::BlockId;

use crate::shim::StepSequence;
use crate::value::Value;

pub type ThreadId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    Running,
    /// Stop stepping this thread until the next tick.
    YieldTick,
    Done,
}

/// Per-block execution state, reset whenever a frame moves to its next
/// block.
#[derive(Debug, Clone, Default)]
pub struct BlockState {
    /// Stack timer start, if started.
    pub timer: Option<std::time::Duration>,
    /// Stack timer length in milliseconds.
    pub duration: f64,
    pub loop_counter: Option<i64>,
}

/// One level of the interpreter stack.
#[derive(Debug, Clone, Default)]
pub struct ExecFrame {
    /// Block about to run. `None` once the chain has run out.
    pub pc: Option<BlockId>,
    /// This frame runs a loop body; popping it ends an iteration.
    pub is_loop: bool,
    pub warp: bool,
    /// Procedure arguments, on frames that start a procedure body.
    pub params: Option<IndexMap<String, Value>>,
    pub state: BlockState,
}

impl ExecFrame {
    pub fn at(pc: impl Into<BlockId>) -> Self {
        ExecFrame {
            pc: Some(pc.into()),
            ..ExecFrame::default()
        }
    }
}

#[derive(Debug)]
pub struct Thread {
    pub id: ThreadId,
    /// Index into the runtime's targets.
    pub target: usize,
    pub top_block: BlockId,
    pub status: ThreadStatus,
    pub frames: Vec<ExecFrame>,
    /// Compiled code driving this thread instead of the interpreter.
    pub generator: Option<StepSequence>,
}

impl Thread {
    pub fn new(id: ThreadId, target: usize, top_block: BlockId) -> Self {
        Thread {
            id,
            target,
            frames: vec![ExecFrame::at(top_block.clone())],
            top_block,
            status: ThreadStatus::Running,
            generator: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == ThreadStatus::Done
    }

    pub fn is_compiled(&self) -> bool {
        self.generator.is_some()
    }

    /// Innermost procedure argument named `name`.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.params.as_ref())
            .and_then(|params| params.get(name))
    }

    pub fn in_warp(&self) -> bool {
        self.frames.last().is_some_and(|frame| frame.warp)
    }

    /// Stop the thread and drop any compiled code attached to it.
    pub fn retire(&mut self) {
        self.status = ThreadStatus::Done;
        self.generator = None;
        self.frames.clear();
    }
}
