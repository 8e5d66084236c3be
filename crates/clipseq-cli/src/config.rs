use anyhow::Context;
use clipseq_core::{DuplicatePolicy, JoinMode, PasteAllMode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// What a repeated text capture does: `count` or `separate`
    pub duplicate_policy: DuplicatePolicy,
    /// Mark items used once they have been pasted
    pub dequeue_on_paste: bool,
    /// `merge` joins all text into one paste, `step` pastes item by item
    pub paste_all_text_mode: PasteAllMode,
    pub joiner_mode: JoinMode,
    /// Separator used by the `custom` joiner mode
    pub joiner_custom_sep: String,
    /// Pause between pastes in milliseconds
    pub min_interval_ms: u64,
    pub max_retries: u32,
    /// Items shown by `list` when no --limit is given
    pub history_default_count: usize,
    /// Source applications whose clipboard changes are never recorded
    pub blacklist: Vec<String>,
    pub storage: Storage,
    pub images: Images,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::MergeByCount,
            dequeue_on_paste: true,
            paste_all_text_mode: PasteAllMode::Merge,
            joiner_mode: JoinMode::Cjk,
            joiner_custom_sep: String::new(),
            min_interval_ms: 120,
            max_retries: 1,
            history_default_count: 50,
            blacklist: [
                "1Password",
                "Bitwarden",
                "KeePass",
                "KeePassXC",
                "Terminal",
                "PowerShell",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            storage: Storage::default(),
            images: Images::default(),
        }
    }
}

impl Settings {
    pub fn paste_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Storage {
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Images {
    pub dir: Option<String>,
}

fn expand(p: &str) -> Option<PathBuf> {
    let p = p.trim();
    if p.is_empty() {
        None
    } else {
        Some(PathBuf::from(shellexpand::tilde(p).to_string()))
    }
}

pub fn config_dir() -> PathBuf {
    if let Some(bd) = directories::BaseDirs::new() {
        bd.config_dir().join("clipseq")
    } else {
        PathBuf::from("./.config/clipseq")
    }
}

pub fn data_dir() -> PathBuf {
    if let Some(bd) = directories::BaseDirs::new() {
        bd.data_dir().join("clipseq")
    } else {
        PathBuf::from("./.local/share/clipseq")
    }
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.toml")
}

pub fn db_path(settings: &Settings) -> PathBuf {
    settings
        .storage
        .db_path
        .as_deref()
        .and_then(expand)
        .unwrap_or_else(|| data_dir().join("data.db"))
}

pub fn images_dir(settings: &Settings) -> PathBuf {
    settings
        .images
        .dir
        .as_deref()
        .and_then(expand)
        .unwrap_or_else(|| data_dir().join("images"))
}

/// Missing file means defaults; a file that does not parse is an error.
pub fn load_settings() -> anyhow::Result<Settings> {
    let path = settings_path();
    let raw = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Settings::default()),
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };
    let settings: Settings =
        toml::from_str(&raw).with_context(|| format!("invalid settings in {}", path.display()))?;
    tracing::debug!(path = %path.display(), "settings loaded");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let s: Settings = toml::from_str("").unwrap();
        assert_eq!(s.duplicate_policy, DuplicatePolicy::MergeByCount);
        assert_eq!(s.paste_all_text_mode, PasteAllMode::Merge);
        assert_eq!(s.joiner_mode, JoinMode::Cjk);
        assert_eq!(s.min_interval_ms, 120);
        assert_eq!(s.history_default_count, 50);
        assert!(s.blacklist.iter().any(|b| b == "KeePassXC"));
    }

    #[test]
    fn partial_file_overrides_only_given_keys() {
        let s: Settings = toml::from_str(
            r#"
            duplicate_policy = "separate"
            joiner_mode = "custom"
            joiner_custom_sep = " | "
            [storage]
            db_path = "/tmp/x.db"
            "#,
        )
        .unwrap();
        assert_eq!(s.duplicate_policy, DuplicatePolicy::Separate);
        assert_eq!(s.joiner_mode, JoinMode::Custom);
        assert_eq!(s.joiner_custom_sep, " | ");
        assert!(s.dequeue_on_paste);
        assert_eq!(db_path(&s), PathBuf::from("/tmp/x.db"));
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(toml::from_str::<Settings>(r#"joiner_mode = "klingon""#).is_err());
        assert!(toml::from_str::<Settings>(r#"duplicate_policy = "sometimes""#).is_err());
        assert!(toml::from_str::<Settings>(r#"paste_all_text_mode = "all""#).is_err());
    }
}
