use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use sessionmgr_settings::{filter_matches, Favorites, SettingKey, Settings, SortOrder};

use crate::descriptor::{compare, SessionDescriptor};
use crate::document::SessionDocument;
use crate::error::SessionError;
use crate::scanner::scan_sessions;

/// Characters that may not appear in a session name.
const INVALID_NAME_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// A catalog position, either concrete or one of the role sentinels.
/// 工作階段索引：實際位置或角色代稱。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionIndex {
    Current,
    Previous,
    Default,
    None,
    At(usize),
}

impl fmt::Display for SessionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionIndex::Current => f.write_str("current"),
            SessionIndex::Previous => f.write_str("previous"),
            SessionIndex::Default => f.write_str("default"),
            SessionIndex::None => f.write_str("none"),
            SessionIndex::At(index) => write!(f, "index {index}"),
        }
    }
}

/// Where sessions live and how the catalog is ordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    pub directory: PathBuf,
    /// Includes the leading dot.
    pub extension: String,
    pub default_name: String,
    pub sort_order: SortOrder,
    pub favorites_first: bool,
}

impl RegistryConfig {
    /// Reads the registry settings; an empty directory setting selects `fallback_dir`.
    pub fn from_settings(settings: &Settings, fallback_dir: &Path) -> Self {
        let directory = match settings.get_str(SettingKey::SessionDirectory).trim() {
            "" => fallback_dir.to_path_buf(),
            configured => PathBuf::from(configured),
        };
        Self {
            directory,
            extension: settings.session_extension().to_string(),
            default_name: settings.default_name().to_string(),
            sort_order: settings.sort_order(),
            favorites_first: settings.get_bool(SettingKey::FavoritesFirst),
        }
    }
}

/// In-memory session catalog with current/previous/default roles.
/// 工作階段目錄與目前、前一個、預設角色。
///
/// The catalog is rebuilt wholesale by [`SessionRegistry::rescan`]; indices
/// handed out before a mutating call must be re-resolved afterwards. Roles
/// survive rescans by name.
#[derive(Debug)]
pub struct SessionRegistry {
    config: RegistryConfig,
    favorites: Favorites,
    catalog: Vec<SessionDescriptor>,
    current: Option<usize>,
    previous: Option<usize>,
}

impl SessionRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            favorites: Favorites::new(),
            catalog: Vec::new(),
            current: None,
            previous: None,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Replaces the configuration and rebuilds the catalog when it changed.
    pub fn set_config(&mut self, config: RegistryConfig) -> Result<bool, SessionError> {
        if config == self.config {
            return Ok(false);
        }
        let previous_config = std::mem::replace(&mut self.config, config);
        if let Err(err) = self.rescan() {
            self.config = previous_config;
            return Err(err);
        }
        Ok(true)
    }

    /// Updates favorite flags and re-sorts without touching the disk.
    pub fn set_favorites(&mut self, favorites: Favorites) {
        self.favorites = favorites;
        let current = self.current_name().map(str::to_owned);
        let previous = self.previous_name().map(str::to_owned);
        let catalog = std::mem::take(&mut self.catalog);
        self.install(catalog, current.as_deref(), previous.as_deref());
    }

    pub fn descriptors(&self) -> &[SessionDescriptor] {
        &self.catalog
    }

    pub fn get(&self, index: usize) -> Option<&SessionDescriptor> {
        self.catalog.get(index)
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    /// Finds a session by name, preferring an exact match over a case-insensitive one.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.catalog
            .iter()
            .position(|descriptor| descriptor.name == name)
            .or_else(|| {
                self.catalog
                    .iter()
                    .position(|descriptor| descriptor.has_name(name))
            })
    }

    /// Re-enumerates the session directory, keeping roles by name.
    /// 重新掃描目錄，並依名稱保留角色。
    pub fn rescan(&mut self) -> Result<(), SessionError> {
        let current = self.current_name().map(str::to_owned);
        let previous = self.previous_name().map(str::to_owned);
        self.rescan_with_roles(current.as_deref(), previous.as_deref())
    }

    /// Rescans and assigns roles from persisted names.
    pub fn rescan_with_roles(
        &mut self,
        current: Option<&str>,
        previous: Option<&str>,
    ) -> Result<(), SessionError> {
        let catalog = scan_sessions(
            &self.config.directory,
            &self.config.extension,
            self.config.sort_order,
        )?;
        self.install(catalog, current, previous);
        Ok(())
    }

    fn install(
        &mut self,
        mut catalog: Vec<SessionDescriptor>,
        current: Option<&str>,
        previous: Option<&str>,
    ) {
        for descriptor in &mut catalog {
            descriptor.favorite = self.favorites.contains(&descriptor.name);
        }
        let order = self.config.sort_order;
        let favorites_first = self.config.favorites_first;
        catalog.sort_by(|a, b| compare(a, b, order, favorites_first));
        self.catalog = catalog;

        self.current = current
            .and_then(|name| self.position(name))
            .or_else(|| self.default_index());
        self.previous = previous.and_then(|name| self.position(name));
        if self.previous == self.current {
            self.previous = None;
        }
        tracing::debug!(
            sessions = self.catalog.len(),
            current = ?self.current_name(),
            previous = ?self.previous_name(),
            "session catalog rebuilt"
        );
    }

    /// Resolves a virtual index to a concrete catalog position.
    pub fn resolve(&self, index: SessionIndex) -> Option<usize> {
        match index {
            SessionIndex::Current => self.current,
            SessionIndex::Previous => self.previous,
            SessionIndex::Default => self.default_index(),
            SessionIndex::None => None,
            SessionIndex::At(index) => (index < self.catalog.len()).then_some(index),
        }
    }

    fn default_index(&self) -> Option<usize> {
        self.position(&self.config.default_name)
    }

    pub fn current_name(&self) -> Option<&str> {
        self.current
            .and_then(|index| self.catalog.get(index))
            .map(|descriptor| descriptor.name.as_str())
    }

    pub fn previous_name(&self) -> Option<&str> {
        self.previous
            .and_then(|index| self.catalog.get(index))
            .map(|descriptor| descriptor.name.as_str())
    }

    /// Name a virtual index refers to; the default name is returned even when
    /// no default file exists yet.
    pub fn name_of(&self, index: SessionIndex) -> Option<&str> {
        match self.resolve(index) {
            Some(position) => Some(self.catalog[position].name.as_str()),
            None if matches!(index, SessionIndex::Default | SessionIndex::Current) => {
                Some(self.config.default_name.as_str())
            }
            None => None,
        }
    }

    /// Path of the session file a virtual index refers to.
    /// 虛擬索引對應的工作階段檔案路徑。
    pub fn session_path(&self, index: SessionIndex) -> Option<PathBuf> {
        self.name_of(index).map(|name| self.path_for(name))
    }

    /// Path of the named session. Scanned sessions keep their on-disk file
    /// name; unknown names get the configured extension.
    pub fn path_for(&self, name: &str) -> PathBuf {
        let scanned = self
            .catalog
            .iter()
            .find(|descriptor| descriptor.name == name)
            .and_then(|descriptor| descriptor.file_name.as_deref());
        match scanned {
            Some(file_name) => self.config.directory.join(file_name),
            None => self
                .config
                .directory
                .join(format!("{name}{}", self.config.extension)),
        }
    }

    /// Makes `index` current, demoting the old current to previous.
    pub fn activate(&mut self, index: Option<usize>) {
        let index = index.filter(|&position| position < self.catalog.len());
        if index != self.current {
            if self.current.is_some() {
                self.previous = self.current;
            }
            self.current = index;
        }
        if self.previous == self.current {
            self.previous = None;
        }
    }

    /// Catalog positions passing `filter`; current and previous are always included.
    pub fn visible_indices(&self, filter: &str) -> Vec<usize> {
        self.catalog
            .iter()
            .enumerate()
            .filter(|(index, descriptor)| {
                Some(*index) == self.current
                    || Some(*index) == self.previous
                    || filter_matches(filter, &descriptor.name)
            })
            .map(|(index, _)| index)
            .collect()
    }

    /// Renames a session file, carrying its roles over to the new name.
    /// 重新命名工作階段，並讓角色跟隨新名稱。
    pub fn rename(&mut self, index: SessionIndex, new_name: &str) -> Result<usize, SessionError> {
        let new_name = validate_name(new_name)?;
        let position = self
            .resolve(index)
            .ok_or(SessionError::InvalidIndex(index))?;
        let old_name = self.catalog[position].name.clone();
        if old_name == new_name {
            return Ok(position);
        }
        let case_only = old_name.to_lowercase() == new_name.to_lowercase();
        self.ensure_available_except(new_name, Some(position), !case_only)?;

        let from = self.path_for(&old_name);
        let to = self.path_for(new_name);
        fs::rename(&from, &to).map_err(|err| SessionError::io(&from, err))?;
        tracing::info!(from = %old_name, to = %new_name, "renamed session");

        let follow = |role: Option<&str>| match role {
            Some(name) if name == old_name => Some(new_name.to_string()),
            other => other.map(str::to_owned),
        };
        let current = follow(self.current_name());
        let previous = follow(self.previous_name());
        self.rescan_with_roles(current.as_deref(), previous.as_deref())?;
        self.position(new_name)
            .ok_or_else(|| SessionError::InvalidIndex(SessionIndex::None))
    }

    /// Deletes a session file. The default and current sessions are protected.
    pub fn delete(&mut self, index: SessionIndex) -> Result<(), SessionError> {
        let position = self
            .resolve(index)
            .ok_or(SessionError::InvalidIndex(index))?;
        let name = self.catalog[position].name.clone();
        if Some(position) == self.default_index() {
            return Err(SessionError::Protected {
                name,
                role: "default",
            });
        }
        if Some(position) == self.current {
            return Err(SessionError::Protected {
                name,
                role: "current",
            });
        }

        let path = self.path_for(&name);
        fs::remove_file(&path).map_err(|err| SessionError::io(&path, err))?;
        tracing::info!(session = %name, "deleted session");

        if self.previous == Some(position) {
            self.previous = None;
        }
        self.rescan()
    }

    /// Creates an empty session file and returns its catalog position.
    pub fn create(&mut self, name: &str) -> Result<usize, SessionError> {
        let name = validate_name(name)?;
        self.ensure_available(name)?;
        let path = self.path_for(name);
        SessionDocument::empty().save(&path)?;
        tracing::info!(session = %name, "created session");
        self.rescan()?;
        self.position(name)
            .ok_or_else(|| SessionError::InvalidIndex(SessionIndex::None))
    }

    /// Copies an existing session file under a new name.
    pub fn copy(&mut self, index: SessionIndex, name: &str) -> Result<usize, SessionError> {
        let name = validate_name(name)?;
        let position = self
            .resolve(index)
            .ok_or(SessionError::InvalidIndex(index))?;
        self.ensure_available(name)?;
        let from = self.path_for(&self.catalog[position].name);
        let to = self.path_for(name);
        fs::copy(&from, &to).map_err(|err| SessionError::io(&from, err))?;
        tracing::info!(from = %self.catalog[position].name, to = %name, "copied session");
        self.rescan()?;
        self.position(name)
            .ok_or_else(|| SessionError::InvalidIndex(SessionIndex::None))
    }

    fn ensure_available(&self, name: &str) -> Result<(), SessionError> {
        self.ensure_available_except(name, None, true)
    }

    /// Rejects `name` when another catalog entry matches it case-insensitively.
    /// A case-only rename skips the disk check, since on case-insensitive
    /// filesystems the target path is the session's own file.
    fn ensure_available_except(
        &self,
        name: &str,
        except: Option<usize>,
        check_disk: bool,
    ) -> Result<(), SessionError> {
        let taken = self
            .catalog
            .iter()
            .enumerate()
            .any(|(position, descriptor)| Some(position) != except && descriptor.has_name(name))
            || (check_disk && self.path_for(name).exists());
        if taken {
            return Err(SessionError::NameCollision(name.to_string()));
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<&str, SessionError> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed.contains(INVALID_NAME_CHARS)
        || trimmed.chars().any(char::is_control)
    {
        return Err(SessionError::InvalidName(name.to_string()));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn registry_with(names: &[&str]) -> (TempDir, SessionRegistry) {
        let tmp = tempdir().unwrap();
        for name in names {
            SessionDocument::empty()
                .save(&tmp.path().join(format!("{name}.sess")))
                .unwrap();
        }
        let mut registry = SessionRegistry::new(RegistryConfig {
            directory: tmp.path().to_path_buf(),
            extension: ".sess".into(),
            default_name: "Default".into(),
            sort_order: SortOrder::Alpha,
            favorites_first: false,
        });
        registry.rescan().unwrap();
        (tmp, registry)
    }

    fn names(registry: &SessionRegistry) -> Vec<&str> {
        registry
            .descriptors()
            .iter()
            .map(|descriptor| descriptor.name.as_str())
            .collect()
    }

    #[test]
    fn current_falls_back_to_default() {
        let (_tmp, registry) = registry_with(&["Work", "Default"]);
        assert_eq!(registry.resolve(SessionIndex::Current), Some(0));
        assert_eq!(registry.current_name(), Some("Default"));
        assert_eq!(registry.resolve(SessionIndex::Previous), None);
    }

    #[test]
    fn resolve_handles_sentinels_and_bounds() {
        let (_tmp, registry) = registry_with(&["a", "b"]);
        assert_eq!(registry.resolve(SessionIndex::At(1)), Some(1));
        assert_eq!(registry.resolve(SessionIndex::At(2)), None);
        assert_eq!(registry.resolve(SessionIndex::None), None);
        assert_eq!(registry.resolve(SessionIndex::Default), None);
        assert_eq!(registry.resolve(SessionIndex::Current), None);
    }

    #[test]
    fn empty_catalog_still_has_a_default_path() {
        let (tmp, registry) = registry_with(&[]);
        assert!(registry.is_empty());
        assert_eq!(
            registry.session_path(SessionIndex::Default),
            Some(tmp.path().join("Default.sess"))
        );
        assert_eq!(registry.session_path(SessionIndex::Previous), None);
    }

    #[test]
    fn roles_survive_unrelated_churn() {
        let (tmp, mut registry) = registry_with(&["b", "d"]);
        registry.activate(Some(0));
        registry.activate(Some(1));
        assert_eq!(registry.current_name(), Some("d"));
        assert_eq!(registry.previous_name(), Some("b"));

        SessionDocument::empty()
            .save(&tmp.path().join("a.sess"))
            .unwrap();
        registry.rescan().unwrap();
        assert_eq!(names(&registry), vec!["a", "b", "d"]);
        assert_eq!(registry.resolve(SessionIndex::Current), Some(2));
        assert_eq!(registry.resolve(SessionIndex::Previous), Some(1));
    }

    #[test]
    fn rename_collisions_are_case_insensitive() {
        let (_tmp, mut registry) = registry_with(&["Alpha", "Beta"]);
        let err = registry.rename(SessionIndex::At(0), "beta").unwrap_err();
        assert!(matches!(err, SessionError::NameCollision(_)));
        assert_eq!(names(&registry), vec!["Alpha", "Beta"]);

        assert!(matches!(
            registry.rename(SessionIndex::At(0), "a/b"),
            Err(SessionError::InvalidName(_))
        ));
        assert!(matches!(
            registry.rename(SessionIndex::At(5), "Gamma"),
            Err(SessionError::InvalidIndex(SessionIndex::At(5)))
        ));
    }

    #[test]
    fn case_only_rename_does_not_clobber_a_sibling() {
        let (tmp, mut registry) = registry_with(&[]);
        fs::write(tmp.path().join("alpha.sess"), "<NotepadPlus><A/></NotepadPlus>").unwrap();
        fs::write(tmp.path().join("Alpha.sess"), "<NotepadPlus><B/></NotepadPlus>").unwrap();
        registry.rescan().unwrap();
        assert_eq!(names(&registry), vec!["Alpha", "alpha"]);

        let err = registry.rename(SessionIndex::At(1), "Alpha").unwrap_err();
        assert!(matches!(err, SessionError::NameCollision(_)));
        assert_eq!(
            fs::read_to_string(tmp.path().join("alpha.sess")).unwrap(),
            "<NotepadPlus><A/></NotepadPlus>"
        );
        assert_eq!(
            fs::read_to_string(tmp.path().join("Alpha.sess")).unwrap(),
            "<NotepadPlus><B/></NotepadPlus>"
        );
    }

    #[test]
    fn case_only_rename_of_a_lone_session_succeeds() {
        let (tmp, mut registry) = registry_with(&["beta"]);
        let position = registry.rename(SessionIndex::At(0), "Beta").unwrap();
        assert_eq!(names(&registry), vec!["Beta"]);
        assert_eq!(position, 0);
        assert!(tmp.path().join("Beta.sess").exists());
    }

    #[test]
    fn sessions_keep_their_on_disk_extension() {
        let (tmp, mut registry) = registry_with(&["Default"]);
        fs::write(tmp.path().join("Alpha.SESS"), "<NotepadPlus/>").unwrap();
        registry.rescan().unwrap();
        assert_eq!(names(&registry), vec!["Alpha", "Default"]);

        let path = registry.session_path(SessionIndex::At(0)).unwrap();
        assert_eq!(path, tmp.path().join("Alpha.SESS"));
        assert!(path.exists());

        let copied = registry.copy(SessionIndex::At(0), "Beta").unwrap();
        assert_eq!(registry.descriptors()[copied].name, "Beta");
        assert!(tmp.path().join("Beta.sess").exists());

        registry.delete(SessionIndex::At(0)).unwrap();
        assert!(!tmp.path().join("Alpha.SESS").exists());
        assert_eq!(names(&registry), vec!["Beta", "Default"]);
    }

    #[test]
    fn rename_carries_roles() {
        let (_tmp, mut registry) = registry_with(&["Alpha", "Beta"]);
        registry.activate(Some(0));
        registry.activate(Some(1));
        let position = registry.rename(SessionIndex::Previous, "Zulu").unwrap();
        assert_eq!(names(&registry), vec!["Beta", "Zulu"]);
        assert_eq!(registry.previous_name(), Some("Zulu"));
        assert_eq!(registry.resolve(SessionIndex::Previous), Some(position));
        assert_eq!(registry.current_name(), Some("Beta"));
    }

    #[test]
    fn delete_protects_default_and_current() {
        let (_tmp, mut registry) = registry_with(&["Default", "Other", "Work"]);
        registry.activate(Some(2));
        assert!(matches!(
            registry.delete(SessionIndex::Default),
            Err(SessionError::Protected { role: "default", .. })
        ));
        assert!(matches!(
            registry.delete(SessionIndex::Current),
            Err(SessionError::Protected { role: "current", .. })
        ));
        assert_eq!(registry.len(), 3);

        registry.activate(Some(1));
        registry.activate(Some(2));
        assert_eq!(registry.previous_name(), Some("Other"));
        registry.delete(SessionIndex::Previous).unwrap();
        assert_eq!(names(&registry), vec!["Default", "Work"]);
        assert_eq!(registry.resolve(SessionIndex::Previous), None);
        assert_eq!(registry.current_name(), Some("Work"));
    }

    #[test]
    fn create_and_copy() {
        let (tmp, mut registry) = registry_with(&["Work"]);
        let created = registry.create(" Fresh ").unwrap();
        assert_eq!(registry.get(created).unwrap().name, "Fresh");
        assert!(tmp.path().join("Fresh.sess").exists());
        assert!(matches!(
            registry.create("work"),
            Err(SessionError::NameCollision(_))
        ));

        let copied = registry.copy(SessionIndex::At(created), "Copy").unwrap();
        assert_eq!(registry.get(copied).unwrap().name, "Copy");
        assert_eq!(names(&registry), vec!["Copy", "Fresh", "Work"]);
    }

    #[test]
    fn visibility_filter_keeps_roles() {
        let (_tmp, mut registry) = registry_with(&["alpha", "beta", "gamma"]);
        registry.activate(Some(2));
        assert_eq!(registry.visible_indices("alp"), vec![0, 2]);
        assert_eq!(registry.visible_indices("*"), vec![0, 1, 2]);
        assert_eq!(registry.visible_indices("zzz"), vec![2]);
    }

    #[test]
    fn favorites_sort_first_when_configured() {
        let (_tmp, mut registry) = registry_with(&["a", "b", "c"]);
        registry.activate(Some(0));
        let mut config = registry.config().clone();
        config.favorites_first = true;
        registry.set_config(config).unwrap();
        registry.set_favorites(Favorites::with_names(vec!["c".into()]));
        assert_eq!(names(&registry), vec!["c", "a", "b"]);
        assert!(registry.get(0).unwrap().favorite);
        assert_eq!(registry.current_name(), Some("a"));
    }
}
