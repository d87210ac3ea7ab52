use serde::{Deserialize, Serialize};

use crate::command::ScriptCommand;
use crate::variable::VariableStore;

pub const DEFAULT_LAST_RUN_TIME: &str = "1990-01-01T00:00:00";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptInfo {
    pub author: String,
    pub tool_version: String,
    pub script_version: String,
    pub description: String,
    pub last_run_time: String,
    pub run_times: u32,
}

impl Default for ScriptInfo {
    fn default() -> Self {
        Self {
            author: String::new(),
            tool_version: String::new(),
            script_version: "0.0.0".to_string(),
            description: String::new(),
            last_run_time: DEFAULT_LAST_RUN_TIME.to_string(),
            run_times: 0,
        }
    }
}

/// One node of the action tree. A block opener owns its body, and the
/// matching close marker is the last nested entry of the opener itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptAction {
    pub command: ScriptCommand,
    pub nested: Vec<ScriptAction>,
}

impl ScriptAction {
    pub fn new(command: ScriptCommand) -> Self {
        Self {
            command,
            nested: Vec::new(),
        }
    }

    pub fn add_nested(&mut self, command: ScriptCommand) -> &mut ScriptAction {
        self.nested.push(ScriptAction::new(command));
        self.nested
            .last_mut()
            .expect("nested entry was just pushed")
    }

    /// Depth-first walk over this node and everything below it.
    pub fn walk(&self, visit: &mut impl FnMut(&ScriptAction)) {
        visit(self);
        for child in &self.nested {
            child.walk(visit);
        }
    }

    pub fn command_count(&self) -> usize {
        1 + self
            .nested
            .iter()
            .map(ScriptAction::command_count)
            .sum::<usize>()
    }
}

/// The persistable unit: variable declarations, the action tree, and the
/// script metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub variables: VariableStore,
    pub actions: Vec<ScriptAction>,
    pub info: ScriptInfo,
}

impl Script {
    pub fn new() -> Self {
        Self {
            variables: VariableStore::new(),
            actions: Vec::new(),
            info: ScriptInfo::default(),
        }
    }

    pub fn add_top_level(&mut self, command: ScriptCommand) -> &mut ScriptAction {
        self.actions.push(ScriptAction::new(command));
        self.actions
            .last_mut()
            .expect("action was just pushed")
    }

    pub fn command_count(&self) -> usize {
        self.actions
            .iter()
            .map(ScriptAction::command_count)
            .sum()
    }
}

#[cfg(test)]
mod script_tests {
    use super::*;

    #[test]
    fn default_info_matches_legacy_placeholder_values() {
        let info = ScriptInfo::default();
        assert_eq!(info.script_version, "0.0.0");
        assert_eq!(info.last_run_time, DEFAULT_LAST_RUN_TIME);
        assert_eq!(info.run_times, 0);
    }

    #[test]
    fn walk_visits_nested_actions_depth_first() {
        let mut script = Script::new();
        let parent = script.add_top_level(ScriptCommand::new("BeginIfCommand"));
        parent.add_nested(ScriptCommand::new("SetVariableCommand"));
        parent.add_nested(ScriptCommand::new("EndIfCommand"));
        script.add_top_level(ScriptCommand::new("CommentCommand"));

        let mut seen = Vec::new();
        for action in &script.actions {
            action.walk(&mut |node| seen.push(node.command.command_type.clone()));
        }
        assert_eq!(
            seen,
            vec![
                "BeginIfCommand",
                "SetVariableCommand",
                "EndIfCommand",
                "CommentCommand"
            ]
        );
        assert_eq!(script.command_count(), 4);
    }
}
