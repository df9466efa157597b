//! 成功动作轨迹：JSON Lines 追加写
//!
//! 每行 `{"timestamp": ..., "ui_hash": ..., "action": {...}}`；写失败只记 warn，不影响热路径。

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::hotpath::{Action, TraceLog};

#[derive(Debug, Clone)]
pub struct JsonlTraceLog {
    path: PathBuf,
}

impl JsonlTraceLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")
    }
}

impl TraceLog for JsonlTraceLog {
    fn record_successful_action(&self, ui_hash: &str, action: &Action) {
        let entry = serde_json::json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "ui_hash": ui_hash,
            "action": action,
        });
        if let Err(e) = self.append(&entry.to_string()) {
            tracing::warn!(path = %self.path.display(), "Trace log write failed: {}", e);
        }
    }
}

/// 不记录任何内容（未配置轨迹文件时）
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTraceLog;

impl TraceLog for NoopTraceLog {
    fn record_successful_action(&self, _ui_hash: &str, _action: &Action) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jsonl_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlTraceLog::new(dir.path().join("traces/hot_path.jsonl"));
        log.record_successful_action("H1", &Action::Tap { x: 3, y: 4 });
        log.record_successful_action("H2", &Action::Back);

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["ui_hash"], "H1");
        assert_eq!(lines[0]["action"]["type"], "tap");
        assert_eq!(lines[1]["action"]["type"], "back");
    }

    #[test]
    fn test_jsonl_write_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        // 路径本身是目录，打开会失败
        let log = JsonlTraceLog::new(dir.path());
        log.record_successful_action("H1", &Action::Home);
    }
}
