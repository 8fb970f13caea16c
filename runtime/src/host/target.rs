use indexmap::IndexMap;
use precomp::project::Target;
use precomp::project::block::Block;

use crate::value::Value;

/// A sprite or the stage as the host runs it: the descriptor's blocks plus
/// live variable values.
#[derive(Debug, Clone)]
pub struct RuntimeTarget {
    pub data: Target,
    /// Variable name → current value.
    pub variables: IndexMap<String, Value>,
    /// Everything said or thought, in order.
    pub said: Vec<String>,
}

impl RuntimeTarget {
    pub fn new(data: &Target) -> Self {
        let variables = data
            .variable_values()
            .map(|(name, value)| (name.to_string(), Value::from_json(value)))
            .collect();
        RuntimeTarget {
            data: data.clone(),
            variables,
            said: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }

    pub fn is_stage(&self) -> bool {
        self.data.is_stage
    }

    pub fn block(&self, id: &str) -> Option<&Block> {
        self.data.block(id)
    }
}
