//! Tool: read_file — read the contents of a file from disk.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::Value;

use super::{output, parse_args, Tool, ToolArgs, ToolError, ToolOutput};

pub struct ReadFileTool;

#[derive(Deserialize)]
struct Args {
    filepath: String,
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file. Text files are returned as-is; binary \
         files are returned base64-encoded with mime_type \
         application/octet-stream."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "filepath": {
                    "type": "string",
                    "description": "Absolute or relative path to the file."
                }
            },
            "required": ["filepath"]
        })
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let args: Args = parse_args(args)?;

        let bytes = std::fs::read(&args.filepath)
            .map_err(|e| ToolError::Failed(format!("failed to read '{}': {}", args.filepath, e)))?;

        let (contents, mime_type) = match String::from_utf8(bytes) {
            Ok(text) => (text, "text/plain".to_string()),
            Err(e) => (
                base64::engine::general_purpose::STANDARD.encode(e.into_bytes()),
                "application/octet-stream".to_string(),
            ),
        };

        Ok(output(serde_json::json!({
            "contents": contents,
            "mime_type": mime_type,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(filepath: &str) -> Result<ToolOutput, ToolError> {
        let mut args = ToolArgs::new();
        args.insert("filepath".into(), Value::String(filepath.into()));
        ReadFileTool.execute(args).await
    }

    #[tokio::test]
    async fn reads_text_files_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, "hello world").unwrap();

        let out = run(path.to_str().unwrap()).await.unwrap();
        assert_eq!(out["contents"], "hello world");
        assert_eq!(out["mime_type"], "text/plain");
    }

    #[tokio::test]
    async fn binary_files_are_base64() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x01]).unwrap();

        let out = run(path.to_str().unwrap()).await.unwrap();
        assert_eq!(out["mime_type"], "application/octet-stream");
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(out["contents"].as_str().unwrap())
            .unwrap();
        assert_eq!(decoded, [0xff, 0xfe, 0x00, 0x01]);
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let err = run("definitely/not/here.txt").await.unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[tokio::test]
    async fn missing_filepath_is_invalid_input() {
        let err = ReadFileTool.execute(ToolArgs::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput { .. }));
        assert!(err.to_string().contains("filepath"));
    }
}
