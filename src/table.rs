//! Task table parsing and emission.
//!
//! The task table is a CSV file with one row per task and the fixed
//! column order `Task_ID, Task_Name, Category, Predecessors, Optimistic,
//! Most_Likely, Pessimistic, Resources`. The `Predecessors` field holds a
//! comma-separated id list and is quoted when non-empty. Fields may be
//! quoted with `"` and embedded quotes are doubled.

use std::fs;
use std::path::Path;

use crate::core::task::{Estimate, Task};
use crate::error::{Error, Result};
use crate::hlog_debug;

/// Expected header columns, in order.
pub const COLUMNS: [&str; 8] = [
    "Task_ID",
    "Task_Name",
    "Category",
    "Predecessors",
    "Optimistic",
    "Most_Likely",
    "Pessimistic",
    "Resources",
];

/// Read and parse a task table from a file.
pub fn read_tasks(path: &Path) -> Result<Vec<Task>> {
    hlog_debug!("read_tasks path={}", path.display());
    let input = fs::read_to_string(path)?;
    parse_tasks(&input)
}

/// Parse a task table from a string.
///
/// Line numbers in errors are 1-based and count every input line,
/// including blank ones.
pub fn parse_tasks(input: &str) -> Result<Vec<Task>> {
    let mut tasks = Vec::new();
    let mut saw_header = false;

    for (idx, line) in input.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_row(line).map_err(|reason| Error::MalformedRow {
            line: line_no,
            reason,
        })?;

        if !saw_header {
            if fields != COLUMNS {
                return Err(Error::MalformedRow {
                    line: line_no,
                    reason: format!("expected header {}", COLUMNS.join(",")),
                });
            }
            saw_header = true;
            continue;
        }

        if fields.len() != COLUMNS.len() {
            return Err(Error::MalformedRow {
                line: line_no,
                reason: format!("expected {} fields, found {}", COLUMNS.len(), fields.len()),
            });
        }

        let number = |name: &str, value: &str| -> Result<f64> {
            value.trim().parse::<f64>().map_err(|_| Error::MalformedRow {
                line: line_no,
                reason: format!("invalid {}: {:?}", name, value),
            })
        };

        let id = fields[0].trim();
        if id.is_empty() {
            return Err(Error::MalformedRow {
                line: line_no,
                reason: "empty Task_ID".to_string(),
            });
        }

        let predecessors: Vec<String> = fields[3]
            .split(',')
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(|p| p.to_string())
            .collect();

        let estimate = Estimate::new(
            number("Optimistic", &fields[4])?,
            number("Most_Likely", &fields[5])?,
            number("Pessimistic", &fields[6])?,
        );

        let resources = fields[7].trim();
        let mut task = Task::new(id, fields[1].trim(), estimate).with_category(fields[2].trim());
        task.predecessors = predecessors;
        if !resources.is_empty() {
            task.resources = Some(resources.to_string());
        }
        tasks.push(task);
    }

    if !saw_header {
        return Err(Error::MalformedRow {
            line: 1,
            reason: "missing header row".to_string(),
        });
    }
    Ok(tasks)
}

/// Render a task set back to the canonical table format.
pub fn render_tasks(tasks: &[Task]) -> String {
    let mut out = String::new();
    out.push_str(&COLUMNS.join(","));
    out.push('\n');
    for task in tasks {
        let row = [
            escape_field(&task.id),
            escape_field(&task.name),
            escape_field(&task.category),
            escape_field(&task.predecessors.join(",")),
            task.estimate.optimistic.to_string(),
            task.estimate.most_likely.to_string(),
            task.estimate.pessimistic.to_string(),
            escape_field(task.resources.as_deref().unwrap_or("")),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// Write a task set to a file in the canonical table format.
pub fn write_tasks(tasks: &[Task], path: &Path) -> Result<()> {
    fs::write(path, render_tasks(tasks))?;
    Ok(())
}

/// Quote a CSV field when it contains a delimiter, quote or newline.
pub(crate) fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Split a CSV row into fields, honoring quoting.
fn split_row(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
        } else {
            match c {
                ',' => fields.push(std::mem::take(&mut current)),
                '"' if current.is_empty() => in_quotes = true,
                _ => current.push(c),
            }
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(current);
    Ok(fields)
}
