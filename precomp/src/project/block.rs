use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type BlockId = String;

/// Inline primitive kinds used inside input arrays.
pub mod primitive {
    pub const MATH_NUMBER: u64 = 4;
    pub const ANGLE_NUMBER: u64 = 8;
    pub const COLOR_PICKER: u64 = 9;
    pub const TEXT: u64 = 10;
    pub const BROADCAST: u64 = 11;
    pub const VARIABLE: u64 = 12;
    pub const LIST: u64 = 13;
}

/// Opcodes that start a script.
pub const HAT_OPCODES: &[&str] = &[
    "event_whenflagclicked",
    "event_whenbroadcastreceived",
    "event_whenkeypressed",
    "event_whenthisspriteclicked",
    "event_whenbackdropswitchesto",
    "event_whengreaterthan",
    "control_start_as_clone",
];

pub const PROCEDURE_DEFINITION: &str = "procedures_definition";
pub const PROCEDURE_CALL: &str = "procedures_call";

/// One value of a target's `blocks` table. Loose reporters are stored as
/// bare primitive arrays rather than block objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockEntry {
    Block(Block),
    Primitive(Vec<Value>),
}

impl BlockEntry {
    pub fn as_block(&self) -> Option<&Block> {
        match self {
            BlockEntry::Block(block) => Some(block),
            BlockEntry::Primitive(_) => None,
        }
    }
}

/// A single block of a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub opcode: String,
    #[serde(default)]
    pub next: Option<BlockId>,
    #[serde(default)]
    pub parent: Option<BlockId>,
    #[serde(default)]
    pub inputs: IndexMap<String, Value>,
    #[serde(default)]
    pub fields: IndexMap<String, Value>,
    #[serde(default)]
    pub shadow: bool,
    #[serde(rename = "topLevel", default)]
    pub top_level: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutation: Option<Mutation>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Extra state carried by procedure prototypes and calls.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Mutation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proccode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argumentids: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argumentnames: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warp: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Mutation {
    /// Argument ids, decoded from their JSON-string encoding.
    pub fn argument_ids(&self) -> Vec<String> {
        decode_string_list(self.argumentids.as_deref())
    }

    /// Argument names, decoded from their JSON-string encoding.
    pub fn argument_names(&self) -> Vec<String> {
        decode_string_list(self.argumentnames.as_deref())
    }

    pub fn is_warp(&self) -> bool {
        match &self.warp {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s == "true",
            _ => false,
        }
    }
}

fn decode_string_list(raw: Option<&str>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str::<Vec<String>>(s).ok())
        .unwrap_or_default()
}

/// What an input slot refers to once its array encoding is unwrapped.
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue<'a> {
    /// A block id (reporter or shadow block).
    Block(&'a str),
    /// An inline primitive: kind plus the remaining array items.
    Primitive(u64, &'a [Value]),
    /// The slot is present but empty.
    Empty,
}

impl Block {
    pub fn new(opcode: impl Into<String>) -> Self {
        Block {
            opcode: opcode.into(),
            next: None,
            parent: None,
            inputs: IndexMap::new(),
            fields: IndexMap::new(),
            shadow: false,
            top_level: false,
            x: None,
            y: None,
            mutation: None,
            extra: Map::new(),
        }
    }

    pub fn is_hat(&self) -> bool {
        HAT_OPCODES.contains(&self.opcode.as_str())
    }

    /// Unwrap the input named `name`, if present.
    pub fn input(&self, name: &str) -> Option<InputValue<'_>> {
        let slot = self.inputs.get(name)?.as_array()?;
        Some(match slot.get(1) {
            Some(Value::String(id)) => InputValue::Block(id),
            Some(Value::Array(items)) => match items.first().and_then(Value::as_u64) {
                Some(kind) => InputValue::Primitive(kind, &items[1..]),
                None => InputValue::Empty,
            },
            _ => InputValue::Empty,
        })
    }

    /// Block id stored in an input slot (substacks, `custom_block`, reporters).
    pub fn input_block(&self, name: &str) -> Option<&str> {
        match self.input(name)? {
            InputValue::Block(id) => Some(id),
            _ => None,
        }
    }

    /// Inline text payload of an input, only when it is a plain text primitive.
    pub fn input_text(&self, name: &str) -> Option<&str> {
        match self.input(name)? {
            InputValue::Primitive(primitive::TEXT, rest) => rest.first()?.as_str(),
            _ => None,
        }
    }

    /// First item of a field array (the user-visible value).
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self.fields.get(name)? {
            Value::Array(items) => items.first(),
            other => Some(other),
        }
    }

    pub fn field_text(&self, name: &str) -> Option<String> {
        self.field(name).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Procedure signature stored in the mutation, if any.
    pub fn proccode(&self) -> Option<&str> {
        self.mutation.as_ref()?.proccode.as_deref()
    }
}

/// Blocks belonging to the script rooted at `root`, found through `parent`
/// links, in table order. Includes `root` itself.
pub fn script_members<'a>(blocks: &'a IndexMap<BlockId, BlockEntry>, root: &str) -> Vec<&'a str> {
    blocks
        .iter()
        .filter(|(id, entry)| {
            let Some(block) = entry.as_block() else {
                return false;
            };
            if id.as_str() == root {
                return true;
            }
            let mut parent = block.parent.as_deref();
            let mut hops = 0;
            while let Some(current) = parent {
                if current == root {
                    return true;
                }
                hops += 1;
                if hops > blocks.len() {
                    return false;
                }
                parent = blocks
                    .get(current)
                    .and_then(BlockEntry::as_block)
                    .and_then(|b| b.parent.as_deref());
            }
            false
        })
        .map(|(id, _)| id.as_str())
        .collect()
}
