#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;
use tix::config::Config;
use tix::storage::{Storage, DEFAULT_CONTEXT};
use tix::store::TaskStore;

/// Throwaway tix data root
pub struct TestHome {
    dir: TempDir,
}

impl TestHome {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn tasks_file(&self) -> PathBuf {
        self.dir.path().join("tasks.json")
    }

    pub fn history_file(&self) -> PathBuf {
        self.dir.path().join("history.json")
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// `tix` bound to this data root, isolated from the caller's environment
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("tix").expect("binary");
        cmd.env("TIX_HOME", self.dir.path())
            .env_remove("TIX_CONTEXT")
            .env_remove("RUST_LOG");
        cmd
    }

    /// Run `tix <args> --json` and return the parsed envelope
    pub fn json(&self, args: &[&str]) -> Result<Value, Box<dyn std::error::Error>> {
        let output = self
            .cmd()
            .args(args)
            .arg("--json")
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        Ok(serde_json::from_slice(&output)?)
    }

    /// Library-level store over the default context
    pub fn store(&self) -> Result<TaskStore, Box<dyn std::error::Error>> {
        self.store_with(&Config::default())
    }

    pub fn store_with(&self, config: &Config) -> Result<TaskStore, Box<dyn std::error::Error>> {
        let storage = Storage::new(self.dir.path().to_path_buf(), DEFAULT_CONTEXT)?;
        Ok(TaskStore::open(storage, config)?)
    }
}
