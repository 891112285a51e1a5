use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Autocomplete history for the launch flow, persisted as a small JSON file.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub owner_history: Vec<String>,
    pub last_owner: Option<String>,
}

#[derive(Debug)]
pub struct PrefsStore {
    path: PathBuf,
    prefs: Preferences,
}

impl PrefsStore {
    /// FLINT_PREFS_FILE, or a dotfile in the working directory.
    pub fn default_path() -> PathBuf {
        std::env::var("FLINT_PREFS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".flint-prefs.json"))
    }

    /// A missing or unreadable file is not an error: the history just
    /// starts empty.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let prefs = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(prefs) => prefs,
                Err(error) => {
                    warn!(
                        "Preference file {} is corrupt ({}), starting fresh",
                        path.display(),
                        error
                    );
                    Preferences::default()
                }
            },
            Err(_) => Preferences::default(),
        };
        Self { path, prefs }
    }

    /// Record an owner name: moves it to the front of the history
    /// (deduplicated) and remembers it as the default for the next launch.
    pub fn record_owner(&mut self, owner: &str) -> anyhow::Result<()> {
        self.prefs.owner_history.retain(|known| known != owner);
        self.prefs.owner_history.insert(0, owner.to_string());
        self.prefs.last_owner = Some(owner.to_string());
        self.save()
    }

    pub fn last_owner(&self) -> Option<&str> {
        self.prefs.last_owner.as_deref()
    }

    pub fn owner_history(&self) -> &[String] {
        &self.prefs.owner_history
    }

    fn save(&self) -> anyhow::Result<()> {
        let raw = serde_json::to_string_pretty(&self.prefs)?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("writing preference file {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_owner_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let mut store = PrefsStore::open(&path);
        store.record_owner("alice").unwrap();
        store.record_owner("bob").unwrap();
        store.record_owner("alice").unwrap();

        let reopened = PrefsStore::open(&path);
        assert_eq!(reopened.owner_history(), ["alice", "bob"]);
        assert_eq!(reopened.last_owner(), Some("alice"));
    }

    #[test]
    fn corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = PrefsStore::open(&path);
        assert!(store.owner_history().is_empty());
        assert_eq!(store.last_owner(), None);
    }

    #[test]
    fn missing_file_starts_fresh() {
        let store = PrefsStore::open("/nonexistent/dir/prefs.json");
        assert!(store.owner_history().is_empty());
    }
}
