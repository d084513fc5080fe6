//! Tool: edit_file — replace an exact string everywhere it occurs in a
//! file, or create the file when it does not exist yet.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{output, parse_args, Tool, ToolArgs, ToolError, ToolOutput};

pub struct EditFileTool;

#[derive(Deserialize)]
struct Args {
    filepath: String,
    old_str: String,
    new_str: String,
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Edit a file by replacing every occurrence of old_str with new_str. \
         The match is exact and whitespace-sensitive: copy old_str verbatim \
         from read_file output. If the file does not exist and old_str is \
         empty, the file is created with new_str as its content."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "filepath": {
                    "type": "string",
                    "description": "Absolute or relative path to the file to edit."
                },
                "old_str": {
                    "type": "string",
                    "description": "Exact text to find. Empty to create a new file."
                },
                "new_str": {
                    "type": "string",
                    "description": "Text to replace old_str with. Must differ from old_str."
                }
            },
            "required": ["filepath", "old_str", "new_str"]
        })
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let args: Args = parse_args(args)?;

        if args.old_str == args.new_str {
            return Err(ToolError::InvalidInput {
                field: "new_str",
                reason: "must differ from old_str".to_string(),
            });
        }

        let path = std::path::Path::new(&args.filepath);
        if !path.exists() {
            if !args.old_str.is_empty() {
                return Err(ToolError::Failed(format!(
                    "'{}' does not exist; pass an empty old_str to create it",
                    args.filepath
                )));
            }
            if let Some(dir) = path.parent() {
                if !dir.as_os_str().is_empty() {
                    std::fs::create_dir_all(dir)?;
                }
            }
            std::fs::write(path, &args.new_str).map_err(|e| {
                ToolError::Failed(format!("failed to create '{}': {}", args.filepath, e))
            })?;
            return Ok(output(serde_json::json!({ "created": args.filepath })));
        }

        if args.old_str.is_empty() {
            return Err(ToolError::Failed(format!(
                "'{}' already exists; pass the text to replace in old_str",
                args.filepath
            )));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ToolError::Failed(format!("failed to read '{}': {}", args.filepath, e)))?;

        if !content.contains(&args.old_str) {
            return Err(ToolError::Failed(format!(
                "old_str not found in '{}'; copy it verbatim from read_file output",
                args.filepath
            )));
        }

        let updated = content.replace(&args.old_str, &args.new_str);

        // Temp file + rename so a crash mid-write never corrupts the original.
        let tmp = path.with_extension("smolcode_edit_tmp");
        std::fs::write(&tmp, &updated)?;
        std::fs::rename(&tmp, path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            ToolError::Failed(format!("failed to replace '{}': {}", args.filepath, e))
        })?;

        Ok(output(serde_json::json!({ "wrote": args.filepath })))
    }
}
