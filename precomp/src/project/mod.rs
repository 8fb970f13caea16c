pub mod block;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::project::block::{Block, BlockEntry, BlockId, PROCEDURE_DEFINITION};

static NULL: Value = Value::Null;

/// A program descriptor (`project.json`).
/// Keys the transform does not touch are kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub targets: Vec<Target>,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(rename = "extensionURLs", default, skip_serializing_if = "IndexMap::is_empty")]
    pub extension_urls: IndexMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A sprite or the stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    #[serde(rename = "isStage", default)]
    pub is_stage: bool,
    pub name: String,
    /// Variable id → `[name, value, ...]`.
    #[serde(default)]
    pub variables: IndexMap<String, Value>,
    #[serde(default)]
    pub blocks: IndexMap<BlockId, BlockEntry>,
    #[serde(default)]
    pub comments: IndexMap<String, Comment>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A workspace comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "blockId", default)]
    pub block_id: Option<BlockId>,
    #[serde(default)]
    pub text: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Project {
    pub fn from_json(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Target {
    pub fn block(&self, id: &str) -> Option<&Block> {
        self.blocks.get(id).and_then(BlockEntry::as_block)
    }

    /// All block objects, in table order.
    pub fn iter_blocks(&self) -> impl Iterator<Item = (&BlockId, &Block)> {
        self.blocks
            .iter()
            .filter_map(|(id, entry)| entry.as_block().map(|block| (id, block)))
    }

    /// Procedure definitions paired with their prototypes, in table order.
    pub fn procedures(&self) -> impl Iterator<Item = (&BlockId, &Block, Option<&Block>)> {
        self.iter_blocks()
            .filter(|(_, block)| block.opcode == PROCEDURE_DEFINITION)
            .map(|(id, definition)| {
                let prototype = definition
                    .input_block("custom_block")
                    .and_then(|proto_id| self.block(proto_id));
                (id, definition, prototype)
            })
    }

    /// Find the prototype block whose signature equals `proccode`.
    /// The first match in table order wins.
    pub fn find_prototype(&self, proccode: &str) -> Option<(&BlockId, &Block)> {
        self.procedures().find_map(|(_, definition, prototype)| {
            let prototype = prototype?;
            if prototype.proccode() != Some(proccode) {
                return None;
            }
            let proto_id = definition.input_block("custom_block")?;
            self.blocks.get_key_value(proto_id).map(|(id, _)| (id, prototype))
        })
    }

    /// Variable names and initial values.
    pub fn variable_values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.variables.values().filter_map(|entry| {
            let items = entry.as_array()?;
            let name = items.first()?.as_str()?;
            Some((name, items.get(1).unwrap_or(&NULL)))
        })
    }
}
