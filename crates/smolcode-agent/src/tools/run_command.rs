//! Tool: run_command — one-shot shell command via the user's shell.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{output, parse_args, Tool, ToolArgs, ToolError, ToolOutput};

pub struct RunCommandTool {
    shell: String,
}

impl RunCommandTool {
    /// `shell` is the user's interactive shell, taken from `$SHELL` by the
    /// launcher.
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

#[derive(Deserialize)]
struct Args {
    command: String,
}

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Execute a shell command via the user's shell with -c and return its \
         combined stdout and stderr. A non-zero exit status is an error that \
         still carries the output."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute."
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let args: Args = parse_args(args)?;

        let result = tokio::process::Command::new(&self.shell)
            .arg("-c")
            .arg(&args.command)
            .output()
            .await
            .map_err(|e| ToolError::Failed(format!("failed to spawn {}: {}", self.shell, e)))?;

        let mut combined = String::from_utf8_lossy(&result.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&result.stderr);
        if !stderr.is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }

        if !result.status.success() {
            return Err(ToolError::Failed(format!(
                "command exited with {}: {}",
                result.status, combined
            )));
        }

        Ok(output(serde_json::json!({ "output": combined })))
    }
}
