use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockKind {
    NumericLoop,
    ContinuousLoop,
    ListLoop,
    If,
    MultiIf,
    DatasetLoop,
    Try,
    GenericLoop,
    MultiLoop,
}

/// A close marker terminates whatever block is innermost; its own kind is
/// informational only and never matched against the opener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "camelCase")]
pub enum CommandRole {
    Plain,
    BlockOpen { kind: BlockKind },
    BlockClose { kind: BlockKind },
}

impl CommandRole {
    pub fn is_block_open(&self) -> bool {
        matches!(self, Self::BlockOpen { .. })
    }

    pub fn is_block_close(&self) -> bool {
        matches!(self, Self::BlockClose { .. })
    }
}

/// One user-selected command, opaque to the structuring core beyond its
/// registered type identifier. Attribute order is the authoring order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptCommand {
    pub command_type: String,
    pub attributes: IndexMap<String, String>,
    pub line_number: usize,
}

impl ScriptCommand {
    pub fn new(command_type: impl Into<String>) -> Self {
        Self {
            command_type: command_type.into(),
            attributes: IndexMap::new(),
            line_number: 0,
        }
    }

    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}
