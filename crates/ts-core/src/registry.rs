use std::collections::BTreeMap;

use crate::command::{BlockKind, CommandRole, ScriptCommand};
use crate::error::TaskScriptError;
use crate::variable::VariableStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Completed,
    StopRequested,
}

/// Single execution contract consumed by the automation engine. The
/// structuring core never calls this itself.
pub trait CommandBehavior {
    fn execute(
        &self,
        command: &ScriptCommand,
        variables: &mut VariableStore,
    ) -> Result<CommandOutcome, TaskScriptError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub role: CommandRole,
    /// Whether `v_*` attribute values carry variable markers that the
    /// intermediate export mode must re-encode.
    pub translate_markers: bool,
}

/// Open-ended catalog of command types. The tree builder only ever asks it
/// for a role, so new command types register without touching the builder.
#[derive(Default)]
pub struct CommandRegistry {
    descriptors: BTreeMap<String, CommandDescriptor>,
    behaviors: BTreeMap<String, Box<dyn CommandBehavior>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in command catalog.
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        registry.register_opener("BeginNumberOfTimesLoopCommand", BlockKind::NumericLoop);
        registry.register_opener("BeginContinousLoopCommand", BlockKind::ContinuousLoop);
        registry.register_opener("BeginListLoopCommand", BlockKind::ListLoop);
        registry.register_opener("BeginIfCommand", BlockKind::If);
        registry.register_opener("BeginMultiIfCommand", BlockKind::MultiIf);
        registry.register_opener("BeginExcelDatasetLoopCommand", BlockKind::DatasetLoop);
        registry.register_opener("TryCommand", BlockKind::Try);
        registry.register_opener("BeginLoopCommand", BlockKind::GenericLoop);
        registry.register_opener("BeginMultiLoopCommand", BlockKind::MultiLoop);

        registry.register_closer("EndLoopCommand", BlockKind::GenericLoop);
        registry.register_closer("EndIfCommand", BlockKind::If);
        registry.register_closer("EndTryCommand", BlockKind::Try);

        for type_id in [
            "ActivateWindowCommand",
            "CheckWindowNameExistsCommand",
            "CloseWindowCommand",
            "GetWindowNamesCommand",
            "GetWindowPositionCommand",
            "GetWindowStateCommand",
            "MoveWindowCommand",
            "ResizeWindowCommand",
            "SetWindowStateCommand",
            "WaitForWindowCommand",
            "SendAdvancedKeyStrokesCommand",
            "SendHotkeyCommand",
            "SendKeysCommand",
            "UIAutomationCommand",
            "ExcelActivateSheetCommand",
            "ExcelGetRangeValuesAsDataTableCommand",
            "CreateDataTableCommand",
            "LoadDataTableCommand",
            "AddListItemCommand",
            "SetListIndexCommand",
            "ConvertJSONToListCommand",
            "SetVariableCommand",
            "IncreaseNumericalVariableCommand",
            "RunScriptCommand",
            "GetWordLengthCommand",
            "GetWordCountCommand",
        ] {
            registry.register(type_id, CommandRole::Plain, true);
        }
        registry.register("CommentCommand", CommandRole::Plain, false);

        registry
    }

    pub fn register(
        &mut self,
        type_id: impl Into<String>,
        role: CommandRole,
        translate_markers: bool,
    ) {
        self.descriptors.insert(
            type_id.into(),
            CommandDescriptor {
                role,
                translate_markers,
            },
        );
    }

    fn register_opener(&mut self, type_id: &str, kind: BlockKind) {
        self.register(type_id, CommandRole::BlockOpen { kind }, false);
    }

    fn register_closer(&mut self, type_id: &str, kind: BlockKind) {
        self.register(type_id, CommandRole::BlockClose { kind }, false);
    }

    pub fn register_behavior(
        &mut self,
        type_id: impl Into<String>,
        behavior: Box<dyn CommandBehavior>,
    ) {
        self.behaviors.insert(type_id.into(), behavior);
    }

    pub fn descriptor(&self, type_id: &str) -> Option<&CommandDescriptor> {
        self.descriptors.get(type_id)
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.descriptors.contains_key(type_id)
    }

    pub fn role_of(&self, type_id: &str) -> Result<CommandRole, TaskScriptError> {
        self.descriptors
            .get(type_id)
            .map(|descriptor| descriptor.role)
            .ok_or_else(|| {
                TaskScriptError::new(
                    "COMMAND_TYPE_UNKNOWN",
                    format!("Command type \"{}\" is not registered.", type_id),
                )
            })
    }

    pub fn behavior(&self, type_id: &str) -> Option<&dyn CommandBehavior> {
        self.behaviors.get(type_id).map(Box::as_ref)
    }

    pub fn type_ids(&self) -> impl Iterator<Item = &str> {
        self.descriptors.keys().map(String::as_str)
    }
}
