//! Tools: create_checkpoint and list_changes — thin wrappers over git.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{output, parse_args, Tool, ToolArgs, ToolError, ToolOutput};

async fn git(args: &[&str]) -> Result<String, ToolError> {
    let result = tokio::process::Command::new("git")
        .args(args)
        .output()
        .await
        .map_err(|e| ToolError::Failed(format!("failed to run git: {e}")))?;

    let stdout = String::from_utf8_lossy(&result.stdout).into_owned();
    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(ToolError::Failed(format!(
            "git {} failed: {}{}",
            args.first().unwrap_or(&""),
            stdout,
            stderr
        )));
    }
    Ok(stdout)
}

// ---------------------------------------------------------------------------
// create_checkpoint
// ---------------------------------------------------------------------------

pub struct CreateCheckpointTool;

#[derive(Deserialize)]
struct CheckpointArgs {
    message: String,
}

#[async_trait]
impl Tool for CreateCheckpointTool {
    fn name(&self) -> &str {
        "create_checkpoint"
    }

    fn description(&self) -> &str {
        "Stage all changes and commit them with the given message. Use after \
         completing a coherent unit of work."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "Commit message."
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let args: CheckpointArgs = parse_args(args)?;
        git(&["add", "-A"]).await?;
        let committed = git(&["commit", "-m", &args.message]).await?;
        Ok(output(serde_json::json!({ "committed": committed })))
    }
}

// ---------------------------------------------------------------------------
// list_changes
// ---------------------------------------------------------------------------

pub struct ListChangesTool;

#[derive(Deserialize)]
struct ChangesArgs {
    details: String,
}

#[async_trait]
impl Tool for ListChangesTool {
    fn name(&self) -> &str {
        "list_changes"
    }

    fn description(&self) -> &str {
        "Show uncommitted changes in the working tree. details='files' gives \
         git status, details='diff' gives the full diff."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "details": {
                    "type": "string",
                    "format": "enum",
                    "enum": ["files", "diff"],
                    "description": "Level of detail to report."
                }
            },
            "required": ["details"]
        })
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let args: ChangesArgs = parse_args(args)?;
        let changes = match args.details.as_str() {
            "files" => git(&["status", "--short"]).await?,
            "diff" => git(&["diff"]).await?,
            other => {
                return Err(ToolError::InvalidInput {
                    field: "details",
                    reason: format!("expected 'files' or 'diff', got '{other}'"),
                })
            }
        };
        Ok(output(serde_json::json!({ "changes": changes })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_changes_rejects_unknown_detail_level() {
        let mut args = ToolArgs::new();
        args.insert("details".into(), Value::String("everything".into()));
        let err = ListChangesTool.execute(args).await.unwrap_err();
        assert!(matches!(
            err,
            ToolError::InvalidInput { field: "details", .. }
        ));
    }
}
