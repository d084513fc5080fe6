//! Tool: search_code — ripgrep-backed code search.
//!
//! Shells out to `rg --json` and returns the event stream re-packed as a
//! JSON-array string. No matches is not an error; it yields `"[]"`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{output, parse_args, Tool, ToolArgs, ToolError, ToolOutput};

pub struct SearchCodeTool;

#[derive(Deserialize)]
struct Args {
    pattern: String,
    #[serde(default)]
    directory: Option<String>,
}

#[async_trait]
impl Tool for SearchCodeTool {
    fn name(&self) -> &str {
        "search_code"
    }

    fn description(&self) -> &str {
        "Search file contents with ripgrep. pattern is a regular expression; \
         directory defaults to the current directory. Returns ripgrep's JSON \
         events as a JSON array string; an empty array means no matches."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Regular expression to search for."
                },
                "directory": {
                    "type": "string",
                    "description": "Directory to search in (optional)."
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let args: Args = parse_args(args)?;

        let mut cmd = tokio::process::Command::new("rg");
        cmd.arg("--json").arg(&args.pattern);
        if let Some(dir) = &args.directory {
            cmd.arg(dir);
        }

        let result = cmd
            .output()
            .await
            .map_err(|e| ToolError::Failed(format!("failed to run rg: {e}")))?;

        // rg exits 1 when nothing matched; that is a valid empty result.
        match result.status.code() {
            Some(0) | Some(1) => {}
            _ => {
                return Err(ToolError::Failed(format!(
                    "rg failed: {}",
                    String::from_utf8_lossy(&result.stderr)
                )))
            }
        }

        let events: Vec<Value> = String::from_utf8_lossy(&result.stdout)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();

        let matches = serde_json::to_string(&events)
            .map_err(|e| ToolError::Failed(format!("failed to encode matches: {e}")))?;
        Ok(output(serde_json::json!({ "matches": matches })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(pattern: &str, directory: &str) -> Result<ToolOutput, ToolError> {
        let mut args = ToolArgs::new();
        args.insert("pattern".into(), Value::String(pattern.into()));
        args.insert("directory".into(), Value::String(directory.into()));
        SearchCodeTool.execute(args).await
    }

    #[tokio::test]
    async fn no_matches_is_empty_array_string() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "nothing interesting").unwrap();

        let out = run("zzz_never_present", dir.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(out["matches"], "[]");
    }

    #[tokio::test]
    async fn matches_are_a_json_array_string() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "needle in here").unwrap();

        let out = run("needle", dir.path().to_str().unwrap()).await.unwrap();
        let events: Vec<Value> =
            serde_json::from_str(out["matches"].as_str().unwrap()).unwrap();
        assert!(events
            .iter()
            .any(|e| e.get("type").and_then(Value::as_str) == Some("match")));
    }
}
