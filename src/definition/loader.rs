use anyhow::{Result, Context as AnyhowContext};
use std::fs;
use crate::definition::Definition;
use crate::error::EngineError;

/// Load a definition document from a YAML (or JSON) file.
/// `user_task` is accepted as an alias for an activity with activity_type=user.
pub fn load_definition_from_file(file_path: &str) -> Result<Definition> {
    let content = fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read definition file from {}", file_path))?;
    load_definition_from_str(&content)
        .with_context(|| format!("Failed to load definition from {}", file_path))
}

pub fn load_definition_from_str(content: &str) -> Result<Definition> {
    // Parse as generic Value first so the user_task alias can be rewritten
    // before the typed parse.
    let mut value: serde_yaml::Value = serde_yaml::from_str(content)
        .context("Failed to parse definition document")?;

    rewrite_aliases(&mut value)?;

    let definition: Definition = serde_yaml::from_value(value)
        .context("Failed to deserialize definition structure")?;

    definition.validate()?;
    Ok(definition)
}

fn rewrite_aliases(value: &mut serde_yaml::Value) -> Result<()> {
    let nodes = match value.get_mut("nodes").and_then(|n| n.as_sequence_mut()) {
        Some(nodes) => nodes,
        None => return Ok(()),
    };

    for node in nodes {
        let map = match node.as_mapping_mut() {
            Some(m) => m,
            None => continue,
        };

        let type_key = serde_yaml::Value::String("type".to_string());
        let kind = map
            .get(&type_key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        match kind.as_str() {
            "start" | "end" | "activity" | "gateway" => {}
            "user_task" => {
                map.insert(type_key, serde_yaml::Value::String("activity".to_string()));
                let at_key = serde_yaml::Value::String("activity_type".to_string());
                if !map.contains_key(&at_key) {
                    map.insert(at_key, serde_yaml::Value::String("user".to_string()));
                }
            }
            other => {
                return Err(EngineError::UnknownNodeType(other.to_string()).into());
            }
        }
    }

    Ok(())
}
