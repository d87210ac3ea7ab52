use crate::command::{CommandRole, ScriptCommand};
use crate::error::TaskScriptError;
use crate::registry::CommandRegistry;
use crate::script::ScriptAction;

/// Converts a flat authoring sequence into the nested action tree.
///
/// Nesting is purely structural: any close marker terminates the innermost
/// open block, whatever kind opened it. Persisted scripts rely on that
/// looseness, so it is deliberate and must not be tightened here.
pub fn build_action_tree(
    commands: Vec<ScriptCommand>,
    registry: &CommandRegistry,
) -> Result<Vec<ScriptAction>, TaskScriptError> {
    let mut top_level: Vec<ScriptAction> = Vec::new();
    let mut open_blocks: Vec<ScriptAction> = Vec::new();

    for (index, mut command) in commands.into_iter().enumerate() {
        let line_number = index + 1;
        command.line_number = line_number;
        let role = registry.role_of(&command.command_type)?;

        match role {
            CommandRole::BlockOpen { .. } => {
                open_blocks.push(ScriptAction::new(command));
            }
            CommandRole::BlockClose { .. } => {
                let Some(mut finished) = open_blocks.pop() else {
                    return Err(TaskScriptError::at_line(
                        "TREE_UNBALANCED_BLOCK",
                        format!(
                            "Close marker \"{}\" at line {} has no open block.",
                            command.command_type, line_number
                        ),
                        line_number,
                    ));
                };
                finished.nested.push(ScriptAction::new(command));
                attach(&mut top_level, &mut open_blocks, finished);
            }
            CommandRole::Plain => {
                attach(&mut top_level, &mut open_blocks, ScriptAction::new(command));
            }
        }
    }

    if let Some(unclosed) = open_blocks.first() {
        let lines = open_blocks
            .iter()
            .map(|action| action.command.line_number.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(TaskScriptError::at_line(
            "TREE_UNTERMINATED_BLOCK",
            format!("Block opener(s) at line(s) {} were never closed.", lines),
            unclosed.command.line_number,
        ));
    }

    Ok(top_level)
}

fn attach(
    top_level: &mut Vec<ScriptAction>,
    open_blocks: &mut [ScriptAction],
    action: ScriptAction,
) {
    match open_blocks.last_mut() {
        Some(parent) => parent.nested.push(action),
        None => top_level.push(action),
    }
}
