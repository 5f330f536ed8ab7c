//! Test helpers for writing message files and running async code.

use camino::Utf8PathBuf;
use std::fs;
use tempfile::TempDir;

/// A temporary directory holding one message file.
pub(super) struct MessageFile {
    _dir: TempDir,
    path: Utf8PathBuf,
}

impl MessageFile {
    pub(super) fn with_lines(lines: &[&str]) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("messages.ndjson"))
            .expect("utf-8 tempdir");
        let mut contents = lines.join("\n");
        contents.push('\n');
        fs::write(&path, contents).expect("write message file");
        Self { _dir: dir, path }
    }

    pub(super) fn path(&self) -> &Utf8PathBuf {
        &self.path
    }

    pub(super) fn dir(&self) -> Utf8PathBuf {
        self.path
            .parent()
            .map(ToOwned::to_owned)
            .expect("message file has a parent")
    }
}

pub(super) fn pit_line(action: &str, id: &str) -> String {
    serde_json::json!({
        "action": action,
        "type": "pit",
        "meta": {"dataset": "d1"},
        "payload": {"id": id, "type": "x", "name": format!("name {id}")},
    })
    .to_string()
}

pub(super) fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("build test runtime")
        .block_on(future)
}
