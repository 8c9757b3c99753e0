use crate::statics;
use crate::value::{DocNumber, DocValue};
use anyhow::Context;
use indexmap::IndexMap;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentFile {
    pub path: PathBuf,
    /// Seconds since the Unix epoch.
    #[serde(default)]
    pub opened_at: u64,
}

/// User preferences stored as a JSON5 file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorSettings {
    pub max_history: usize,
    pub max_recent_files: usize,
    pub recent_files: Vec<RecentFile>,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            max_history: statics::DEFAULT_MAX_HISTORY,
            max_recent_files: statics::DEFAULT_MAX_RECENT_FILES,
            recent_files: Vec::new(),
        }
    }
}

impl EditorSettings {
    pub fn parse_json5(text: &str) -> anyhow::Result<Self> {
        let mut settings: EditorSettings = json5::from_str(text).context("parsing settings")?;
        let cap = settings.max_recent_files;
        settings.recent_files.truncate(cap);
        Ok(settings)
    }

    /// Load from `path`; a missing file yields the defaults. Entries whose
    /// file no longer exists are dropped.
    pub fn load_path(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            debug!(?path, "no settings file, using defaults");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
        let mut settings = Self::parse_json5(&text).with_context(|| format!("loading {path:?}"))?;
        settings.recent_files.retain(|f| f.path.exists());
        Ok(settings)
    }

    pub fn save_path(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("creating {parent:?}"))?;
        }
        fs::write(path, self.to_value().to_json5_pretty())
            .with_context(|| format!("writing {path:?}"))
    }

    pub fn to_value(&self) -> DocValue {
        let number =
            |v: u64| DocValue::Number(DocNumber::I64(i64::try_from(v).unwrap_or(i64::MAX)));
        let recent = self
            .recent_files
            .iter()
            .map(|f| {
                let mut entry = IndexMap::new();
                entry.insert(
                    statics::SETTINGS_PATH.to_string(),
                    DocValue::String(f.path.to_string_lossy().into_owned()),
                );
                entry.insert(statics::SETTINGS_OPENED_AT.to_string(), number(f.opened_at));
                DocValue::Object(entry)
            })
            .collect();

        let mut map = IndexMap::new();
        map.insert(
            statics::SETTINGS_MAX_HISTORY.to_string(),
            number(self.max_history as u64),
        );
        map.insert(
            statics::SETTINGS_MAX_RECENT_FILES.to_string(),
            number(self.max_recent_files as u64),
        );
        map.insert(
            statics::SETTINGS_RECENT_FILES.to_string(),
            DocValue::Array(recent),
        );
        DocValue::Object(map)
    }

    /// Most recent first.
    pub fn recent_files(&self) -> &[RecentFile] {
        &self.recent_files
    }

    /// Move `path` to the front of the recent list, dropping older duplicates
    /// and anything past the cap.
    pub fn add_recent_file(&mut self, path: &Path) {
        let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.recent_files.retain(|f| f.path != path);
        let opened_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.recent_files.insert(0, RecentFile { path, opened_at });
        self.recent_files.truncate(self.max_recent_files);
    }

    pub fn remove_recent_file(&mut self, path: &Path) {
        let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.recent_files
            .retain(|f| f.path != canonical && f.path != path);
    }

    pub fn clear_recent_files(&mut self) {
        self.recent_files.clear();
    }
}
