#![allow(dead_code)]
use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::TempDir;

pub struct TestEnv {
    _dir: TempDir,
    pub db: PathBuf,
    pub cfg: PathBuf,
    pub data: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = dir.path().join("config");
        let data = dir.path().join("data");
        std::fs::create_dir_all(&cfg).expect("cfg dir");
        std::fs::create_dir_all(&data).expect("data dir");
        let db = dir.path().join("clipseq.db");
        Self {
            _dir: dir,
            db,
            cfg,
            data,
        }
    }

    /// Command with isolated XDG dirs but no --db, so settings decide the database.
    pub fn bare(&self) -> Command {
        let mut cmd = Command::cargo_bin("clipseq").unwrap();
        cmd.env("XDG_CONFIG_HOME", &self.cfg);
        cmd.env("XDG_DATA_HOME", &self.data);
        cmd.env_remove("RUST_LOG");
        cmd
    }

    pub fn bin(&self) -> Command {
        let mut cmd = self.bare();
        cmd.arg("--db").arg(&self.db);
        cmd
    }

    pub fn write_settings(&self, toml: &str) {
        let dir = self.cfg.join("clipseq");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("settings.toml"), toml).unwrap();
    }

    pub fn stdout(&self, args: &[&str]) -> String {
        let out = self
            .bin()
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        String::from_utf8(out).unwrap()
    }

    pub fn json(&self, args: &[&str]) -> serde_json::Value {
        serde_json::from_str(&self.stdout(args)).unwrap()
    }

    /// Add text and return the id printed by `added`/`merged`.
    pub fn add(&self, text: &str) -> i64 {
        let out = self.stdout(&["add", text]);
        out.split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| panic!("unexpected add output: {out}"))
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
