//! Tool: list_files — recursively list a directory tree.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{output, parse_args, Tool, ToolArgs, ToolError, ToolOutput};

/// Maximum entries returned to avoid overwhelming the context window.
const MAX_ENTRIES: usize = 2_000;

pub struct ListFilesTool;

#[derive(Deserialize)]
struct Args {
    #[serde(default)]
    filepath: Option<String>,
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "Recursively list files and directories under a path (default '.'). \
         Returns relative paths; directories carry a trailing '/'. The .git \
         directory is skipped."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "filepath": {
                    "type": "string",
                    "description": "Directory to list. Defaults to the current directory."
                }
            }
        })
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let args: Args = parse_args(args)?;
        let root = args.filepath.unwrap_or_else(|| ".".to_string());
        let root_path = Path::new(&root);

        if !root_path.is_dir() {
            return Err(ToolError::Failed(format!("'{root}' is not a directory")));
        }

        let mut entries: Vec<String> = Vec::new();
        let mut truncated = false;
        walk(root_path, root_path, &mut entries, &mut truncated);

        let mut result = serde_json::json!({ "files": entries });
        if truncated {
            result["truncated"] = Value::Bool(true);
        }
        Ok(output(result))
    }
}

/// Depth-first walk collecting paths relative to `root`, in sorted order
/// for deterministic output.
fn walk(root: &Path, dir: &Path, entries: &mut Vec<String>, truncated: &mut bool) {
    let read_dir = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(_) => return,
    };

    let mut children: Vec<std::path::PathBuf> = read_dir
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    children.sort();

    for child in children {
        if *truncated {
            return;
        }
        if child.file_name().map(|n| n == ".git").unwrap_or(false) {
            continue;
        }
        if entries.len() >= MAX_ENTRIES {
            *truncated = true;
            return;
        }

        let relative = child
            .strip_prefix(root)
            .unwrap_or(&child)
            .to_string_lossy()
            .to_string();

        if child.is_dir() {
            entries.push(format!("{relative}/"));
            walk(root, &child, entries, truncated);
        } else {
            entries.push(relative);
        }
    }
}
