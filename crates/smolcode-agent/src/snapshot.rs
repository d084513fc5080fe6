//! History snapshots: a timestamped JSON file carrying the in-memory
//! history across a process restart.

use std::io;
use std::path::{Path, PathBuf};

use smolcode_core::content::Content;

/// Write `history` to `<prefix>-<epoch>.json`, creating parent directories
/// as needed. Returns the file path.
pub fn write(prefix: &str, history: &[Content]) -> io::Result<PathBuf> {
    let epoch = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let path = PathBuf::from(format!("{prefix}-{epoch}.json"));
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let bytes = serde_json::to_vec_pretty(history)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    std::fs::write(&path, bytes)?;
    Ok(path)
}

/// Read a snapshot back and delete the file — each snapshot carries exactly
/// one restart.
pub fn consume(path: &Path) -> io::Result<Vec<Content>> {
    let bytes = std::fs::read(path)?;
    let history = serde_json::from_slice(&bytes)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    std::fs::remove_file(path)?;
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_consume_round_trips_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("reload").to_str().unwrap().to_string();
        let history = vec![
            Content::user_text("one"),
            Content::model_text("two"),
            Content::user_text("three"),
        ];

        let path = write(&prefix, &history).unwrap();
        assert!(path.exists());
        assert!(path.to_str().unwrap().ends_with(".json"));

        let restored = consume(&path).unwrap();
        assert_eq!(restored, history);
        assert!(!path.exists());
    }

    #[test]
    fn consume_missing_file_is_an_error() {
        assert!(consume(Path::new("/nonexistent/reload-0.json")).is_err());
    }
}
