//! Tool: write_file — write (or overwrite) a file, creating parent
//! directories as needed.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{output, parse_args, Tool, ToolArgs, ToolError, ToolOutput};

pub struct WriteFileTool;

#[derive(Deserialize)]
struct Args {
    filepath: String,
    content: String,
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, replacing anything already there. Parent \
         directories are created automatically. Prefer edit_file when \
         changing only part of an existing file."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "filepath": {
                    "type": "string",
                    "description": "Absolute or relative path to the file."
                },
                "content": {
                    "type": "string",
                    "description": "Full content to write."
                }
            },
            "required": ["filepath", "content"]
        })
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let args: Args = parse_args(args)?;

        if let Some(dir) = std::path::Path::new(&args.filepath).parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(|e| {
                    ToolError::Failed(format!(
                        "failed to create directory '{}': {}",
                        dir.display(),
                        e
                    ))
                })?;
            }
        }
        std::fs::write(&args.filepath, &args.content)
            .map_err(|e| ToolError::Failed(format!("failed to write '{}': {}", args.filepath, e)))?;

        Ok(output(serde_json::json!({ "wrote": args.filepath })))
    }
}
