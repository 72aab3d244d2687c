use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::favorites::Favorites;
use crate::filters::{FilterHistory, DEFAULT_FILTER_CAPACITY};
use crate::options::{SettingKey, Settings};

const SETTINGS_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse settings {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize settings {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write settings {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to prepare directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SettingsFile {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    values: Settings,
    #[serde(default)]
    favorites: Vec<String>,
    #[serde(default)]
    filters: Vec<String>,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

/// 設定、常用清單與篩選歷史的持久化儲存。 / Persists settings, favorites and filter history together.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
    favorites: Favorites,
    filters: FilterHistory,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>, settings: Settings) -> Self {
        let mut settings = settings;
        settings.sanitize();
        Self {
            path: path.into(),
            settings,
            favorites: Favorites::new(),
            filters: FilterHistory::default(),
        }
    }

    /// 載入設定；檔案不存在時使用預設值。 / Loads settings, using defaults when the file is missing.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Ok(Self::new(path, Settings::default()));
        }

        let contents = fs::read_to_string(&path).map_err(|source| SettingsError::Read {
            path: path.clone(),
            source,
        })?;
        let file: SettingsFile =
            serde_json::from_str(&contents).map_err(|source| SettingsError::Parse {
                path: path.clone(),
                source,
            })?;
        if file.version > SETTINGS_VERSION {
            tracing::warn!(
                path = %path.display(),
                version = file.version,
                "settings written by a newer version; unknown values fall back to defaults"
            );
        }

        let mut settings = file.values;
        settings.sanitize();
        Ok(Self {
            path,
            settings,
            favorites: Favorites::with_names(file.favorites),
            filters: FilterHistory::with_entries(DEFAULT_FILTER_CAPACITY, file.filters),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn favorites(&self) -> &Favorites {
        &self.favorites
    }

    pub fn filters(&self) -> &FilterHistory {
        &self.filters
    }

    /// 修改設定並立即寫回。 / Applies a change to the settings and persists.
    pub fn update<F>(&mut self, mut op: F) -> Result<(), SettingsError>
    where
        F: FnMut(&mut Settings),
    {
        op(&mut self.settings);
        self.settings.sanitize();
        self.save()
    }

    pub fn update_favorites<F, R>(&mut self, op: F) -> Result<R, SettingsError>
    where
        F: FnOnce(&mut Favorites) -> R,
    {
        let result = op(&mut self.favorites);
        self.save()?;
        Ok(result)
    }

    pub fn remember_filter(&mut self, filter: &str) -> Result<(), SettingsError> {
        self.filters.add(filter);
        self.save()
    }

    /// 記錄目前與前一個工作階段名稱。 / Records the current and previous session names.
    pub fn set_roles(
        &mut self,
        current: Option<&str>,
        previous: Option<&str>,
    ) -> Result<(), SettingsError> {
        let current = current.unwrap_or_default();
        let previous = previous.unwrap_or_default();
        if self.settings.get_str(SettingKey::CurrentName) == current
            && self.settings.get_str(SettingKey::PreviousName) == previous
        {
            return Ok(());
        }
        self.settings.put_str(SettingKey::CurrentName, current);
        self.settings.put_str(SettingKey::PreviousName, previous);
        self.save()
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| SettingsError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = SettingsFile {
            version: SETTINGS_VERSION,
            values: self.settings.clone(),
            favorites: self.favorites.to_vec(),
            filters: self.filters.to_vec(),
        };
        let payload =
            serde_json::to_string_pretty(&file).map_err(|source| SettingsError::Serialize {
                path: self.path.clone(),
                source,
            })?;

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, payload.as_bytes()).map_err(|source| SettingsError::Write {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|source| SettingsError::Write {
            path: self.path.clone(),
            source,
        })
    }
}
