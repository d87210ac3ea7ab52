use crate::xml::{XmlDocument, XmlElement};

/// One schema upgrade. Steps match on command-type identifiers and literal
/// attribute values, never on a version number in the document, so every
/// step is idempotent and a fully-migrated document is a no-op.
pub struct MigrationStep {
    /// Schema version this step upgrades the document *to*.
    pub version: &'static str,
    apply: fn(&mut XmlDocument),
}

impl MigrationStep {
    pub fn apply(&self, document: &mut XmlDocument) {
        (self.apply)(document)
    }
}

/// Steps in ascending version order. Order matters: the 3.5.0.47 attribute
/// move targets command names that only exist after the 3.5.0.46 renames.
pub fn migration_steps() -> &'static [MigrationStep] {
    &[
        MigrationStep {
            version: "3.5.0.45",
            apply: migrate_to_3_5_0_45,
        },
        MigrationStep {
            version: "3.5.0.46",
            apply: migrate_to_3_5_0_46,
        },
        MigrationStep {
            version: "3.5.0.47",
            apply: migrate_to_3_5_0_47,
        },
        MigrationStep {
            version: "3.5.0.50",
            apply: migrate_to_3_5_0_50,
        },
    ]
}

/// Runs every migration step, oldest first. Total: unknown commands and
/// attributes are left untouched rather than rejected.
pub fn migrate(document: &mut XmlDocument) {
    for step in migration_steps() {
        step.apply(document);
    }
}

const WINDOW_SEARCH_COMMANDS: &[&str] = &[
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
];

fn migrate_to_3_5_0_45(document: &mut XmlDocument) {
    // "Start with" / "End with" spellings collapse to the canonical forms.
    for_each_command(document, |command| {
        let command_name = command.attribute("CommandName").unwrap_or("");
        if !WINDOW_SEARCH_COMMANDS.contains(&command_name) {
            return;
        }
        normalize_attribute_value(command, "v_SearchMethod", "start with", "Starts with");
        normalize_attribute_value(command, "v_SearchMethod", "end with", "Ends with");
    });

    rename_command_type(document, "ExcelCreateDatasetCommand", "LoadDataTableCommand");
}

fn migrate_to_3_5_0_46(document: &mut XmlDocument) {
    rename_command_type(document, "AddToVariableCommand", "AddListItemCommand");
    rename_command_type(document, "SetVariableIndexCommand", "SetListIndexCommand");
}

fn migrate_to_3_5_0_47(document: &mut XmlDocument) {
    for_each_command(document, |command| {
        let command_name = command.attribute("CommandName").unwrap_or("");
        if command_name != "AddListItemCommand" && command_name != "SetListIndexCommand" {
            return;
        }
        move_attribute(command, "v_userVariableName", "v_ListName");
    });
}

fn migrate_to_3_5_0_50(document: &mut XmlDocument) {
    rename_command_type(document, "ParseJSONArrayCommand", "ConvertJSONToListCommand");
}

fn for_each_command(document: &mut XmlDocument, mut visit: impl FnMut(&mut XmlElement)) {
    document.root.visit_named_mut("ScriptCommand", &mut visit);
}

/// Renames a command-type identifier, updating both the `CommandName`
/// attribute and the structural `CommandType` tag.
fn rename_command_type(document: &mut XmlDocument, from: &str, to: &str) {
    for_each_command(document, |command| {
        if command.attribute("CommandName") == Some(from) {
            command.set_attribute("CommandName", to);
            command.set_attribute("CommandType", to);
        }
    });
}

fn move_attribute(command: &mut XmlElement, from: &str, to: &str) {
    if let Some(value) = command.remove_attribute(from) {
        command.set_attribute(to, value);
    }
}

fn normalize_attribute_value(
    command: &mut XmlElement,
    attribute: &str,
    legacy: &str,
    canonical: &str,
) {
    let Some(current) = command.attribute(attribute) else {
        return;
    };
    if current.eq_ignore_ascii_case(legacy) {
        command.set_attribute(attribute, canonical);
    }
}
