use indexmap::IndexMap;

use crate::error::RuntimeError;
use crate::host::Runtime;
use crate::host::util::{Args, BlockUtility};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Label,
    Button,
    Command,
    Reporter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentKind {
    String,
    Number,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentInfo {
    pub kind: ArgumentKind,
    pub default: String,
}

/// One palette entry of an extension.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionBlock {
    pub kind: BlockKind,
    /// Opcode for commands and reporters, without the extension prefix.
    pub opcode: Option<String>,
    /// Handler name for buttons.
    pub func: Option<String>,
    pub text: String,
    pub hidden: bool,
    pub arguments: IndexMap<String, ArgumentInfo>,
}

impl ExtensionBlock {
    pub fn label(text: impl Into<String>) -> Self {
        ExtensionBlock {
            kind: BlockKind::Label,
            opcode: None,
            func: None,
            text: text.into(),
            hidden: false,
            arguments: IndexMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionInfo {
    pub id: String,
    pub name: String,
    pub color: String,
    pub blocks: Vec<ExtensionBlock>,
    /// Registration is refused unless the host runs extensions unsandboxed.
    pub requires_unsandboxed: bool,
}

/// A host extension. Its blocks use opcodes `<id>_<opcode>`.
pub trait Extension {
    fn info(&self, locale: &str) -> ExtensionInfo;

    /// Run one of this extension's commands or reporters.
    fn call(&self, opcode: &str, args: &Args, util: &mut BlockUtility<'_>) -> Result<Value, RuntimeError>;

    /// A palette button was pressed.
    fn press_button(&self, _func: &str, _runtime: &mut Runtime) {}
}
