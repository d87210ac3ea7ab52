use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use ts_core::{
    CommandRegistry, DataTable, Script, ScriptAction, ScriptCommand, ScriptInfo,
    TaskScriptError, VariableValue,
};

use crate::markers::{decode_intermediate, encode_intermediate};
use crate::migrate::migrate;
use crate::xml::{parse_xml_document, write_xml_document, XmlDocument, XmlElement};

const ROOT_TAG: &str = "Script";
const INFO_TAG: &str = "Info";
const VARIABLES_TAG: &str = "Variables";
const VARIABLE_TAG: &str = "Variable";
const ACTIONS_TAG: &str = "Actions";
const ACTION_TAG: &str = "ScriptAction";
const COMMAND_TAG: &str = "ScriptCommand";
const NESTED_TAG: &str = "AdditionalScriptCommands";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMode {
    Standard,
    /// Re-encodes variable markers into the portable form for interchange
    /// with older-schema consumers.
    Intermediate,
}

pub fn serialize_script(
    script: &Script,
    registry: &CommandRegistry,
    mode: ExportMode,
) -> Result<String, TaskScriptError> {
    let translate = match mode {
        ExportMode::Standard => None,
        ExportMode::Intermediate => Some(registry),
    };
    write_xml_document(&script_to_document(script, translate))
}

/// Serializes a flat command list as a script whose commands are all
/// top-level; no tree building and no variable declarations involved.
pub fn serialize_flat_commands(
    commands: &[ScriptCommand],
) -> Result<String, TaskScriptError> {
    let mut script = Script::new();
    for (index, command) in commands.iter().enumerate() {
        let mut command = command.clone();
        command.line_number = index + 1;
        script.add_top_level(command);
    }
    write_xml_document(&script_to_document(&script, None))
}

/// Runs the migration pipeline on the raw document, then structurally
/// parses it into a script container.
pub fn deserialize_script(
    source: &str,
    registry: &CommandRegistry,
) -> Result<Script, TaskScriptError> {
    let mut document = parse_xml_document(source)?;
    migrate(&mut document);
    parse_script_document(&document, registry)
}

pub fn load_script_file(
    path: impl AsRef<Path>,
    registry: &CommandRegistry,
) -> Result<Script, TaskScriptError> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|error| io_error(path, error))?;
    deserialize_script(&source, registry)
}

/// Writes to a temporary sibling first and renames into place, so a failed
/// save never leaves a partial script behind.
pub fn save_script_file(
    path: impl AsRef<Path>,
    script: &Script,
    registry: &CommandRegistry,
    mode: ExportMode,
) -> Result<(), TaskScriptError> {
    let serialized = serialize_script(script, registry, mode)?;
    write_file_atomic(path.as_ref(), &serialized)
}

/// Same staging discipline for a raw document, for callers that rewrite
/// files without structurally parsing them.
pub fn save_document_file(
    path: impl AsRef<Path>,
    document: &XmlDocument,
) -> Result<(), TaskScriptError> {
    let serialized = write_xml_document(document)?;
    write_file_atomic(path.as_ref(), &serialized)
}

fn write_file_atomic(path: &Path, contents: &str) -> Result<(), TaskScriptError> {
    let staging = path.with_extension("xml.tmp");
    fs::write(&staging, contents).map_err(|error| io_error(&staging, error))?;
    if let Err(error) = fs::rename(&staging, path) {
        let _ = fs::remove_file(&staging);
        return Err(io_error(path, error));
    }
    Ok(())
}

fn io_error(path: &Path, error: std::io::Error) -> TaskScriptError {
    TaskScriptError::new(
        "SCRIPT_IO_ERROR",
        format!("{}: {}", path.display(), error),
    )
}

fn format_error(message: impl Into<String>) -> TaskScriptError {
    TaskScriptError::new("SCRIPT_FORMAT_ERROR", message)
}

// ---------------------------------------------------------------------------
// Script -> document

fn script_to_document(script: &Script, translate: Option<&CommandRegistry>) -> XmlDocument {
    let mut root = XmlElement::new(ROOT_TAG);

    root = root.with_child(
        XmlElement::new(INFO_TAG)
            .with_attribute("Author", &script.info.author)
            .with_attribute("ToolVersion", &script.info.tool_version)
            .with_attribute("ScriptVersion", &script.info.script_version)
            .with_attribute("Description", &script.info.description)
            .with_attribute("LastRunTime", &script.info.last_run_time)
            .with_attribute("RunTimes", script.info.run_times.to_string()),
    );

    let mut variables = XmlElement::new(VARIABLES_TAG);
    for variable in script.variables.iter() {
        variables = variables.with_child(variable_to_element(&variable.name, &variable.value));
    }
    root = root.with_child(variables);

    let mut actions = XmlElement::new(ACTIONS_TAG);
    for action in &script.actions {
        actions = actions.with_child(action_to_element(action, translate));
    }
    root = root.with_child(actions);

    XmlDocument { root }
}

fn variable_to_element(name: &str, value: &VariableValue) -> XmlElement {
    let element = XmlElement::new(VARIABLE_TAG)
        .with_attribute("Name", name)
        .with_attribute("Kind", variable_kind(value));

    match value {
        VariableValue::Basic(text) => {
            if text.is_empty() {
                element
            } else {
                element.with_text(text)
            }
        }
        VariableValue::Table(table) => {
            let mut element = element;
            for column in &table.columns {
                element = element.with_child(XmlElement::new("Column").with_text(column));
            }
            for row in &table.rows {
                let mut row_element = XmlElement::new("Row");
                for cell in row {
                    row_element = row_element.with_child(text_element("Cell", cell));
                }
                element = element.with_child(row_element);
            }
            element
        }
        VariableValue::Dictionary(entries) => {
            let mut element = element;
            for (key, entry_value) in entries {
                element = element.with_child(
                    text_element("Entry", entry_value).with_attribute("Key", key),
                );
            }
            element
        }
        VariableValue::List(items) => {
            let mut element = element;
            for item in items {
                element = element.with_child(text_element("Item", item));
            }
            element
        }
    }
}

fn text_element(name: &str, text: &str) -> XmlElement {
    let element = XmlElement::new(name);
    if text.is_empty() {
        element
    } else {
        element.with_text(text)
    }
}

fn variable_kind(value: &VariableValue) -> &'static str {
    match value {
        VariableValue::Basic(_) => "Basic",
        VariableValue::Table(_) => "Table",
        VariableValue::Dictionary(_) => "Dictionary",
        VariableValue::List(_) => "List",
    }
}

fn action_to_element(action: &ScriptAction, translate: Option<&CommandRegistry>) -> XmlElement {
    let command = &action.command;
    let mut command_element = XmlElement::new(COMMAND_TAG)
        .with_attribute("CommandName", &command.command_type)
        .with_attribute("CommandType", &command.command_type)
        .with_attribute("LineNumber", command.line_number.to_string());

    let translate_markers = translate
        .and_then(|registry| registry.descriptor(&command.command_type))
        .is_some_and(|descriptor| descriptor.translate_markers);

    for (name, value) in &command.attributes {
        let encoded = if translate_markers && name.starts_with("v_") {
            encode_intermediate(value)
        } else {
            value.clone()
        };
        command_element = command_element.with_attribute(name, encoded);
    }

    let mut element = XmlElement::new(ACTION_TAG).with_child(command_element);
    if !action.nested.is_empty() {
        let mut nested = XmlElement::new(NESTED_TAG);
        for child in &action.nested {
            nested = nested.with_child(action_to_element(child, translate));
        }
        element = element.with_child(nested);
    }
    element
}

// ---------------------------------------------------------------------------
// document -> Script

fn parse_script_document(
    document: &XmlDocument,
    registry: &CommandRegistry,
) -> Result<Script, TaskScriptError> {
    let root = &document.root;
    if root.name != ROOT_TAG {
        return Err(format_error(format!(
            "Expected <{}> root element, got <{}>.",
            ROOT_TAG, root.name
        )));
    }

    let mut script = Script::new();

    if let Some(info) = root.find_child(INFO_TAG) {
        script.info = parse_info(info)?;
    }

    if let Some(variables) = root.find_child(VARIABLES_TAG) {
        for variable in variables.element_children() {
            if variable.name != VARIABLE_TAG {
                continue;
            }
            let (name, value) = parse_variable(variable)?;
            if script.variables.get(&name).is_some() {
                return Err(format_error(format!(
                    "Variable \"{}\" is declared more than once.",
                    name
                )));
            }
            script.variables.set(name, value);
        }
    }

    if let Some(actions) = root.find_child(ACTIONS_TAG) {
        let mut next_line = 0usize;
        for action in actions.element_children() {
            if action.name != ACTION_TAG {
                continue;
            }
            let parsed = parse_action(action, registry, &mut next_line)?;
            script.actions.push(parsed);
        }
    }

    Ok(script)
}

fn parse_info(element: &XmlElement) -> Result<ScriptInfo, TaskScriptError> {
    let mut info = ScriptInfo::default();
    if let Some(author) = element.attribute("Author") {
        info.author = author.to_string();
    }
    if let Some(tool_version) = element.attribute("ToolVersion") {
        info.tool_version = tool_version.to_string();
    }
    if let Some(script_version) = element.attribute("ScriptVersion") {
        info.script_version = script_version.to_string();
    }
    if let Some(description) = element.attribute("Description") {
        info.description = description.to_string();
    }
    if let Some(last_run_time) = element.attribute("LastRunTime") {
        info.last_run_time = last_run_time.to_string();
    }
    if let Some(run_times) = element.attribute("RunTimes") {
        info.run_times = run_times.parse().map_err(|_| {
            format_error(format!("RunTimes \"{}\" is not a number.", run_times))
        })?;
    }
    Ok(info)
}

fn parse_variable(element: &XmlElement) -> Result<(String, VariableValue), TaskScriptError> {
    let name = element
        .attribute("Name")
        .ok_or_else(|| format_error("<Variable> is missing its Name attribute."))?
        .to_string();
    let kind = element.attribute("Kind").unwrap_or("Basic");

    let value = match kind {
        "Basic" => VariableValue::Basic(element.text_content()),
        "Table" => {
            let mut table = DataTable::new(Vec::new());
            for child in element.element_children() {
                match child.name.as_str() {
                    "Column" => table.columns.push(child.text_content()),
                    "Row" => table.rows.push(
                        child
                            .element_children()
                            .filter(|cell| cell.name == "Cell")
                            .map(XmlElement::text_content)
                            .collect(),
                    ),
                    _ => {}
                }
            }
            VariableValue::Table(table)
        }
        "Dictionary" => {
            let mut entries = IndexMap::new();
            for child in element.element_children() {
                if child.name != "Entry" {
                    continue;
                }
                let key = child.attribute("Key").ok_or_else(|| {
                    format_error(format!(
                        "Dictionary variable \"{}\" has an <Entry> without a Key.",
                        name
                    ))
                })?;
                entries.insert(key.to_string(), child.text_content());
            }
            VariableValue::Dictionary(entries)
        }
        "List" => VariableValue::List(
            element
                .element_children()
                .filter(|child| child.name == "Item")
                .map(XmlElement::text_content)
                .collect(),
        ),
        other => {
            return Err(format_error(format!(
                "Variable \"{}\" has unknown kind \"{}\".",
                name, other
            )));
        }
    };

    Ok((name, value))
}

fn parse_action(
    element: &XmlElement,
    registry: &CommandRegistry,
    next_line: &mut usize,
) -> Result<ScriptAction, TaskScriptError> {
    let command_element = element.find_child(COMMAND_TAG).ok_or_else(|| {
        format_error(format!("<{}> is missing its <{}> child.", ACTION_TAG, COMMAND_TAG))
    })?;
    let command_type = command_element
        .attribute("CommandName")
        .ok_or_else(|| format_error("<ScriptCommand> is missing its CommandName attribute."))?;

    let descriptor = registry.descriptor(command_type).ok_or_else(|| {
        TaskScriptError::new(
            "COMMAND_TYPE_UNKNOWN",
            format!("Command type \"{}\" is not registered.", command_type),
        )
    })?;

    *next_line += 1;
    let line_number = match command_element.attribute("LineNumber") {
        Some(raw) => raw.parse().map_err(|_| {
            format_error(format!("LineNumber \"{}\" is not a number.", raw))
        })?,
        None => *next_line,
    };

    let mut command = ScriptCommand::new(command_type);
    command.line_number = line_number;
    for (attr_name, attr_value) in &command_element.attributes {
        if attr_name == "CommandName" || attr_name == "CommandType" || attr_name == "LineNumber"
        {
            continue;
        }
        let decoded = if descriptor.translate_markers && attr_name.starts_with("v_") {
            decode_intermediate(attr_value)
        } else {
            attr_value.clone()
        };
        command.attributes.insert(attr_name.clone(), decoded);
    }

    let mut action = ScriptAction::new(command);
    if let Some(nested) = element.find_child(NESTED_TAG) {
        for child in nested.element_children() {
            if child.name != ACTION_TAG {
                continue;
            }
            action
                .nested
                .push(parse_action(child, registry, next_line)?);
        }
    }

    Ok(action)
}
