// Serialized form of the task sequence

use crate::models::Task;
use eyre::{Context, Result, eyre};
use std::collections::HashSet;
use tracing::{info, warn};

/// Serialize the whole task sequence into the text stored in the slot
pub fn encode_tasks(tasks: &[Task]) -> Result<String> {
    serde_json::to_string(tasks).context("Failed to serialize tasks")
}

/// Parse the slot text back into tasks, preserving order
///
/// Entries that fail to parse, have blank text, or repeat an earlier id are
/// skipped with a warning. The first occurrence of an id wins.
pub fn decode_tasks(raw: &str) -> Result<Vec<Task>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let value: serde_json::Value = serde_json::from_str(raw).context("Failed to parse stored tasks")?;
    let entries = match value {
        serde_json::Value::Array(entries) => entries,
        other => return Err(eyre!("Stored tasks must be a JSON array, found {}", kind(&other))),
    };

    let mut seen = HashSet::new();
    let mut tasks = Vec::with_capacity(entries.len());

    for (index, entry) in entries.into_iter().enumerate() {
        let mut task: Task = match serde_json::from_value(entry) {
            Ok(t) => t,
            Err(e) => {
                warn!(index, error = ?e, "Failed to parse task, skipping");
                continue;
            }
        };

        let text = task.text.trim();
        if text.is_empty() {
            warn!(index, id = %task.id, "Task has empty text, skipping");
            continue;
        }
        if text.len() != task.text.len() {
            task.text = text.to_string();
        }

        if !seen.insert(task.id.clone()) {
            warn!(index, id = %task.id, "Duplicate task id, skipping");
            continue;
        }

        tasks.push(task);
    }

    info!(count = tasks.len(), "Loaded tasks");
    Ok(tasks)
}

fn kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
