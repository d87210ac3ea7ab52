use indexmap::IndexMap;
use ts_core::{
    build_action_tree, CommandRegistry, DataTable, Script, ScriptCommand, VariableValue,
};
use ts_persist::{deserialize_script, serialize_script, ExportMode};

fn command(command_type: &str) -> ScriptCommand {
    ScriptCommand::new(command_type)
}

fn sample_script(registry: &CommandRegistry) -> Script {
    let mut script = Script::new();
    script.info.author = "automation author".to_string();
    script.info.tool_version = "3.5.1.0".to_string();
    script.info.script_version = "1.2.3".to_string();
    script.info.description = "nightly report refresh".to_string();
    script.info.run_times = 12;

    script.variables.set(
        "vGreeting",
        VariableValue::Basic("hello <world> & \"friends\"".to_string()),
    );
    let mut table = DataTable::new(vec!["name".to_string(), "total".to_string()]);
    table.rows.push(vec!["north".to_string(), "12".to_string()]);
    table.rows.push(vec!["south".to_string(), String::new()]);
    script.variables.set("vRegions", VariableValue::Table(table));
    let mut pairs = IndexMap::new();
    pairs.insert("zeta".to_string(), "1".to_string());
    pairs.insert("alpha".to_string(), "2".to_string());
    script
        .variables
        .set("vPairs", VariableValue::Dictionary(pairs));
    script.variables.set(
        "vSheets",
        VariableValue::List(vec!["Q1".to_string(), "Q2".to_string()]),
    );

    script.actions = build_action_tree(
        vec![
            command("CommentCommand").with_attribute("v_Comment", "start"),
            command("BeginLoopCommand").with_attribute("v_LoopParameter", "{{{vSheets}}}"),
            command("BeginIfCommand")
                .with_attribute("v_IfActionType", "Value")
                .with_attribute("v_IfActionParameterTable", "{{{vGreeting}}}"),
            command("SetVariableCommand").with_attribute("v_Input", "done"),
            command("EndIfCommand"),
            command("EndLoopCommand"),
            command("GetWordCountCommand").with_attribute("v_InputValue", "{{{vGreeting}}}"),
        ],
        registry,
    )
    .expect("sample tree should build");

    script
}

#[test]
fn serialize_then_deserialize_is_structural_identity() {
    let registry = CommandRegistry::builtin();
    let script = sample_script(&registry);

    let serialized =
        serialize_script(&script, &registry, ExportMode::Standard).expect("serialize");
    let restored = deserialize_script(&serialized, &registry).expect("deserialize");

    assert_eq!(restored, script);
}

#[test]
fn nesting_and_close_marker_placement_survive_the_round_trip() {
    let registry = CommandRegistry::builtin();
    let script = sample_script(&registry);
    let serialized =
        serialize_script(&script, &registry, ExportMode::Standard).expect("serialize");
    let restored = deserialize_script(&serialized, &registry).expect("deserialize");

    // Top level: comment, loop, word count.
    assert_eq!(restored.actions.len(), 3);
    let loop_action = &restored.actions[1];
    assert_eq!(loop_action.command.command_type, "BeginLoopCommand");

    // Loop body holds the if block, then its own end marker last.
    assert_eq!(loop_action.nested.len(), 2);
    assert_eq!(loop_action.nested[0].command.command_type, "BeginIfCommand");
    assert_eq!(
        loop_action.nested.last().map(|a| a.command.command_type.as_str()),
        Some("EndLoopCommand")
    );

    // Same convention one level deeper.
    let if_action = &loop_action.nested[0];
    assert_eq!(
        if_action.nested.last().map(|a| a.command.command_type.as_str()),
        Some("EndIfCommand")
    );
}

#[test]
fn dictionary_and_list_insertion_order_survive_the_round_trip() {
    let registry = CommandRegistry::builtin();
    let script = sample_script(&registry);
    let serialized =
        serialize_script(&script, &registry, ExportMode::Standard).expect("serialize");
    let restored = deserialize_script(&serialized, &registry).expect("deserialize");

    assert_eq!(
        restored.variables.names().collect::<Vec<_>>(),
        vec!["vGreeting", "vRegions", "vPairs", "vSheets"]
    );

    let pairs = restored.variables.get("vPairs").expect("vPairs");
    let VariableValue::Dictionary(entries) = &pairs.value else {
        panic!("vPairs should stay a dictionary");
    };
    assert_eq!(entries.keys().collect::<Vec<_>>(), vec!["zeta", "alpha"]);

    let sheets = restored.variables.get("vSheets").expect("vSheets");
    assert_eq!(sheets.query("first").expect("first"), "Q1");
    assert_eq!(sheets.query("last").expect("last"), "Q2");
}

#[test]
fn multi_line_attribute_values_survive_the_round_trip() {
    let registry = CommandRegistry::builtin();
    let mut script = Script::new();
    script.actions = build_action_tree(
        vec![
            command("SetVariableCommand")
                .with_attribute("v_Input", "line one\nline two")
                .with_attribute("v_userVariableName", "vText"),
            command("CommentCommand").with_attribute("v_Comment", "tab\there\rreturn"),
        ],
        &registry,
    )
    .expect("tree should build");

    let serialized =
        serialize_script(&script, &registry, ExportMode::Standard).expect("serialize");
    let restored = deserialize_script(&serialized, &registry).expect("deserialize");

    assert_eq!(
        restored.actions[0].command.attribute("v_Input"),
        Some("line one\nline two")
    );
    assert_eq!(restored, script);
}

#[test]
fn whitespace_only_variable_values_survive_the_round_trip() {
    let registry = CommandRegistry::builtin();
    let mut script = Script::new();
    script
        .variables
        .set("vPad", VariableValue::Basic("   ".to_string()));
    script.variables.set(
        "vSpacers",
        VariableValue::List(vec!["  ".to_string(), "x".to_string()]),
    );

    let serialized =
        serialize_script(&script, &registry, ExportMode::Standard).expect("serialize");
    let restored = deserialize_script(&serialized, &registry).expect("deserialize");

    let pad = restored.variables.get("vPad").expect("vPad");
    assert_eq!(pad.value, VariableValue::Basic("   ".to_string()));
    let spacers = restored.variables.get("vSpacers").expect("vSpacers");
    assert_eq!(spacers.query("first").expect("first"), "  ");
    assert_eq!(restored, script);
}

#[test]
fn legacy_document_two_schema_versions_behind_deserializes_to_current_types() {
    // AddToVariableCommand predates both the 3.5.0.46 rename and the
    // 3.5.0.47 attribute move; one load applies both.
    let legacy = r#"
<Script>
  <Info Author="old tool" RunTimes="3"/>
  <Variables>
    <Variable Name="vList" Kind="List"><Item>seed</Item></Variable>
  </Variables>
  <Actions>
    <ScriptAction>
      <ScriptCommand CommandName="AddToVariableCommand" v_userVariableName="vList" v_Input="next"/>
    </ScriptAction>
    <ScriptAction>
      <ScriptCommand CommandName="ParseJSONArrayCommand" v_InputValue="[1,2]"/>
    </ScriptAction>
  </Actions>
</Script>
"#;

    let registry = CommandRegistry::builtin();
    let script = deserialize_script(legacy, &registry).expect("legacy script should load");

    let add_item = &script.actions[0].command;
    assert_eq!(add_item.command_type, "AddListItemCommand");
    assert_eq!(add_item.attribute("v_ListName"), Some("vList"));
    assert_eq!(add_item.attribute("v_userVariableName"), None);
    assert_eq!(add_item.attribute("v_Input"), Some("next"));

    assert_eq!(
        script.actions[1].command.command_type,
        "ConvertJSONToListCommand"
    );
    assert_eq!(script.info.run_times, 3);
}

#[test]
fn migrated_output_reserializes_without_further_changes() {
    let registry = CommandRegistry::builtin();
    let legacy = r#"<Script><Actions><ScriptAction><ScriptCommand CommandName="SetVariableIndexCommand" v_userVariableName="vL"/></ScriptAction></Actions></Script>"#;

    let script = deserialize_script(legacy, &registry).expect("legacy load");
    let serialized =
        serialize_script(&script, &registry, ExportMode::Standard).expect("serialize");
    let script_again = deserialize_script(&serialized, &registry).expect("reload");
    assert_eq!(script_again, script);
}
