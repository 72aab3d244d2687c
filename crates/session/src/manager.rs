use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use sessionmgr_settings::{SettingKey, Settings, SettingsStore};

use crate::document::SessionDocument;
use crate::error::SessionError;
use crate::host::{BufferId, EditorHost};
use crate::registry::{RegistryConfig, SessionIndex, SessionRegistry};
use crate::store::GlobalStore;
use crate::sync::{inject_into_live_document, pull_global_to_session, push_session_to_global, SyncReport};

pub const SETTINGS_FILE: &str = "settings.json";
pub const GLOBAL_FILE: &str = "global.xml";
pub const SESSIONS_DIR: &str = "sessions";

/// Result of a load or save request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// Dropped because a load was in progress.
    Rejected,
}

/// Orchestrates the session lifecycle for one editor instance.
/// 協調單一編輯器實例的工作階段生命週期。
///
/// All calls happen on the editor's event thread. The only exclusion rule is
/// the in-flight load flag: while it is set, loads and saves are rejected
/// rather than queued.
#[derive(Debug)]
pub struct SessionManager {
    registry: SessionRegistry,
    global: GlobalStore,
    settings: SettingsStore,
    fallback_dir: PathBuf,
    loading: bool,
    shutting_down: bool,
    pending_save: Option<Instant>,
}

impl SessionManager {
    /// Opens the manager rooted at `config_dir`, loading settings and global
    /// properties and scanning the session directory.
    pub fn open(config_dir: impl AsRef<Path>) -> Result<Self, SessionError> {
        let config_dir = config_dir.as_ref();
        let settings = SettingsStore::load(config_dir.join(SETTINGS_FILE))?;
        let global = GlobalStore::load(config_dir.join(GLOBAL_FILE))?;
        Self::new(settings, global, config_dir.join(SESSIONS_DIR))
    }

    pub fn new(
        settings: SettingsStore,
        global: GlobalStore,
        fallback_dir: PathBuf,
    ) -> Result<Self, SessionError> {
        let config = RegistryConfig::from_settings(settings.settings(), &fallback_dir);
        let mut registry = SessionRegistry::new(config);
        registry.set_favorites(settings.favorites().clone());
        let mut manager = Self {
            registry,
            global,
            settings,
            fallback_dir,
            loading: false,
            shutting_down: false,
            pending_save: None,
        };
        manager.rescan_with_persisted_roles()?;
        Ok(manager)
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn global(&self) -> &GlobalStore {
        &self.global
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn pending_save(&self) -> Option<Instant> {
        self.pending_save
    }

    fn global_enabled(&self) -> bool {
        self.settings.settings().get_bool(SettingKey::GlobalBookmarks)
    }

    fn auto_save(&self) -> bool {
        self.settings.settings().get_bool(SettingKey::AutoSave)
    }

    fn rescan_with_persisted_roles(&mut self) -> Result<(), SessionError> {
        let settings = self.settings.settings();
        let current = non_empty(settings.get_str(SettingKey::CurrentName)).map(str::to_owned);
        let previous = non_empty(settings.get_str(SettingKey::PreviousName)).map(str::to_owned);
        self.registry
            .rescan_with_roles(current.as_deref(), previous.as_deref())
    }

    fn persist_roles(&mut self) -> Result<(), SessionError> {
        let current = self.registry.current_name().map(str::to_owned);
        let previous = self.registry.previous_name().map(str::to_owned);
        self.settings
            .set_roles(current.as_deref(), previous.as_deref())?;
        Ok(())
    }

    pub fn rescan(&mut self) -> Result<(), SessionError> {
        self.registry.rescan()?;
        self.persist_roles()
    }

    /// Loads using the configured `loadIntoCurrent` / `loadWithoutClosing` flags.
    pub fn load_default_flags(
        &mut self,
        host: &mut dyn EditorHost,
        index: SessionIndex,
    ) -> Result<Outcome, SessionError> {
        let settings = self.settings.settings();
        let into_current = settings.get_bool(SettingKey::LoadIntoCurrent);
        let without_closing = settings.get_bool(SettingKey::LoadWithoutClosing);
        self.load(host, index, into_current, without_closing)
    }

    /// Loads a session into the editor.
    /// 將工作階段載入編輯器。
    ///
    /// Unless `into_current`, the active session is saved first (with
    /// auto-save on) and becomes previous, and the target becomes current.
    pub fn load(
        &mut self,
        host: &mut dyn EditorHost,
        index: SessionIndex,
        into_current: bool,
        without_closing: bool,
    ) -> Result<Outcome, SessionError> {
        self.load_inner(host, index, into_current, without_closing, true)
    }

    fn load_inner(
        &mut self,
        host: &mut dyn EditorHost,
        index: SessionIndex,
        into_current: bool,
        without_closing: bool,
        save_active: bool,
    ) -> Result<Outcome, SessionError> {
        if self.loading {
            tracing::warn!(%index, "load rejected: another load is in progress");
            return Ok(Outcome::Rejected);
        }
        self.loading = true;
        self.pending_save = None;
        let result = self.load_guarded(host, index, into_current, without_closing, save_active);
        self.loading = false;
        result.map(|()| Outcome::Completed)
    }

    fn load_guarded(
        &mut self,
        host: &mut dyn EditorHost,
        index: SessionIndex,
        into_current: bool,
        without_closing: bool,
        save_active: bool,
    ) -> Result<(), SessionError> {
        let name = self
            .registry
            .name_of(index)
            .ok_or(SessionError::InvalidIndex(index))?
            .to_string();
        let path = self.registry.path_for(&name);

        if !into_current && save_active && self.auto_save() {
            if let Some(active) = self.registry.resolve(SessionIndex::Current) {
                if !self.registry.descriptors()[active].has_name(&name) {
                    self.save_guarded(host, SessionIndex::At(active))?;
                }
            }
        }

        let exists = path.exists();
        if exists && self.global_enabled() {
            self.pull_file(&path)?;
        }
        if !without_closing {
            host.close_all_documents()?;
        }
        if exists {
            host.load_session(&path)?;
        } else {
            tracing::debug!(session = %name, "no session file yet; starting empty");
        }

        if !into_current {
            self.registry.activate(self.registry.position(&name));
            self.persist_roles()?;
        }
        tracing::info!(session = %name, into_current, without_closing, "loaded session");
        Ok(())
    }

    /// Saves the editor state to a session; `None` targets the current one.
    /// 將編輯器狀態儲存至工作階段。
    pub fn save(
        &mut self,
        host: &mut dyn EditorHost,
        index: SessionIndex,
    ) -> Result<Outcome, SessionError> {
        if self.loading {
            tracing::warn!(%index, "save rejected: a load is in progress");
            return Ok(Outcome::Rejected);
        }
        self.save_guarded(host, index)?;
        Ok(Outcome::Completed)
    }

    fn save_guarded(
        &mut self,
        host: &mut dyn EditorHost,
        index: SessionIndex,
    ) -> Result<(), SessionError> {
        let index = match index {
            SessionIndex::None => SessionIndex::Current,
            other => other,
        };
        let name = self
            .registry
            .name_of(index)
            .ok_or(SessionError::InvalidIndex(index))?
            .to_string();
        let path = self.registry.path_for(&name);

        // The host writes the session file first. A failed push then leaves
        // that file written while the global store and the roles stay as
        // they were.
        host.save_session(&path)?;
        if self.global_enabled() {
            self.push_file(&path)?;
        }
        if self.registry.position(&name).is_none() {
            self.registry.rescan()?;
        }
        self.registry.activate(self.registry.position(&name));
        self.persist_roles()?;
        tracing::info!(session = %name, "saved session");
        Ok(())
    }

    /// Merges a session file into the global store and persists both sides.
    fn push_file(&mut self, path: &Path) -> Result<SyncReport, SessionError> {
        let document = SessionDocument::load(path)?;
        let mut staged = self.global.clone();
        let report = push_session_to_global(&document, &mut staged)?;
        staged.save()?;
        self.global = staged;
        Ok(report)
    }

    /// Rewrites a session file with global properties before the editor reads it.
    fn pull_file(&self, path: &Path) -> Result<SyncReport, SessionError> {
        let mut document = SessionDocument::load(path)?;
        let report = pull_global_to_session(&mut document, &self.global)?;
        if report.updated > 0 {
            document.save(path)?;
        }
        Ok(report)
    }

    /// Session to global merge on a stored session, without involving the editor.
    pub fn push_session(&mut self, index: SessionIndex) -> Result<SyncReport, SessionError> {
        let path = self.existing_path(index)?;
        self.push_file(&path)
    }

    /// Global to session merge on a stored session, without involving the editor.
    pub fn pull_session(&mut self, index: SessionIndex) -> Result<SyncReport, SessionError> {
        let path = self.existing_path(index)?;
        self.pull_file(&path)
    }

    fn existing_path(&self, index: SessionIndex) -> Result<PathBuf, SessionError> {
        let position = self
            .registry
            .resolve(index)
            .ok_or(SessionError::InvalidIndex(index))?;
        Ok(self
            .registry
            .path_for(&self.registry.descriptors()[position].name))
    }

    pub fn create(&mut self, name: &str) -> Result<usize, SessionError> {
        let position = self.registry.create(name)?;
        self.persist_roles()?;
        Ok(position)
    }

    pub fn copy(&mut self, index: SessionIndex, name: &str) -> Result<usize, SessionError> {
        let position = self.registry.copy(index, name)?;
        self.persist_roles()?;
        Ok(position)
    }

    /// Renames a session, keeping favorites and persisted role names aligned.
    pub fn rename(&mut self, index: SessionIndex, new_name: &str) -> Result<usize, SessionError> {
        let old_name = self
            .registry
            .resolve(index)
            .map(|position| self.registry.descriptors()[position].name.clone());
        let position = self.registry.rename(index, new_name)?;
        let new_name = self.registry.descriptors()[position].name.clone();
        if let Some(old_name) = old_name {
            if self.settings.favorites().contains(&old_name) {
                self.settings
                    .update_favorites(|favorites| favorites.rename(&old_name, &new_name))?;
                self.sync_favorites();
            }
        }
        self.persist_roles()?;
        Ok(self.registry.position(&new_name).unwrap_or(position))
    }

    pub fn delete(&mut self, index: SessionIndex) -> Result<(), SessionError> {
        let name = self
            .registry
            .resolve(index)
            .map(|position| self.registry.descriptors()[position].name.clone());
        self.registry.delete(index)?;
        if let Some(name) = name {
            if self.settings.favorites().contains(&name) {
                self.settings
                    .update_favorites(|favorites| favorites.remove(&name))?;
                self.sync_favorites();
            }
        }
        self.persist_roles()
    }

    pub fn set_favorite(&mut self, name: &str, favorite: bool) -> Result<bool, SessionError> {
        let changed = self.settings.update_favorites(|favorites| {
            if favorite {
                favorites.add(name)
            } else {
                favorites.remove(name)
            }
        })?;
        self.sync_favorites();
        Ok(changed)
    }

    fn sync_favorites(&mut self) {
        self.registry.set_favorites(self.settings.favorites().clone());
    }

    /// Visible catalog positions for `filter`; non-trivial filters are remembered.
    pub fn filter_sessions(&mut self, filter: &str) -> Result<Vec<usize>, SessionError> {
        self.settings.remember_filter(filter)?;
        Ok(self.registry.visible_indices(filter))
    }

    /// Changes settings and rescans when the directory, extension or ordering moved.
    /// 更新設定；若目錄、副檔名或排序改變則重新掃描。
    pub fn apply_settings<F>(&mut self, op: F) -> Result<(), SessionError>
    where
        F: FnMut(&mut Settings),
    {
        self.settings.update(op)?;
        let config = RegistryConfig::from_settings(self.settings.settings(), &self.fallback_dir);
        if self.registry.set_config(config)? {
            self.persist_roles()?;
        }
        Ok(())
    }

    /// Host finished starting: rebuild the catalog and optionally auto-load.
    pub fn on_ready(&mut self, host: &mut dyn EditorHost) -> Result<Outcome, SessionError> {
        self.shutting_down = false;
        self.rescan_with_persisted_roles()?;
        self.persist_roles()?;
        if !self.settings.settings().get_bool(SettingKey::AutoLoad) {
            return Ok(Outcome::Completed);
        }
        self.load_inner(host, SessionIndex::Current, false, false, false)
    }

    /// A document was opened: apply its global properties unless a load is
    /// bringing in the whole session.
    pub fn on_file_opened(&mut self, host: &mut dyn EditorHost, buffer: BufferId) -> bool {
        if self.loading || !self.global_enabled() {
            return false;
        }
        let Some(path) = host.document_path(buffer) else {
            return false;
        };
        inject_into_live_document(host, buffer, &path.to_string_lossy(), &self.global)
    }

    pub fn on_file_saved(&mut self, host: &mut dyn EditorHost) -> Result<Outcome, SessionError> {
        if !self.auto_save() || self.shutting_down {
            return Ok(Outcome::Completed);
        }
        self.save(host, SessionIndex::Current)
    }

    pub fn on_file_closed(&mut self, now: Instant) {
        self.schedule_save(now);
    }

    pub fn on_buffer_activated(&mut self, now: Instant) {
        self.schedule_save(now);
    }

    fn schedule_save(&mut self, now: Instant) {
        if !self.auto_save() || self.loading || self.shutting_down {
            return;
        }
        let delay = self.settings.settings().get_int(SettingKey::SaveDelay).max(0) as u64;
        self.pending_save = Some(now + Duration::from_secs(delay));
    }

    /// Fires a due deferred save. Returns `None` when nothing was due.
    pub fn tick(
        &mut self,
        host: &mut dyn EditorHost,
        now: Instant,
    ) -> Option<Result<Outcome, SessionError>> {
        let due = self.pending_save.filter(|deadline| *deadline <= now)?;
        self.pending_save = None;
        if self.shutting_down {
            return None;
        }
        if self.loading {
            tracing::debug!(?due, "deferred save skipped: load in progress");
            return Some(Ok(Outcome::Rejected));
        }
        Some(self.save(host, SessionIndex::Current))
    }

    pub fn on_language_changed(
        &mut self,
        host: &mut dyn EditorHost,
        buffer: BufferId,
        language: &str,
    ) -> Result<bool, SessionError> {
        if self.loading || !self.global_enabled() {
            return Ok(false);
        }
        let Some(path) = host.document_path(buffer) else {
            return Ok(false);
        };
        let mut staged = self.global.clone();
        if !staged.set_language(&path.to_string_lossy(), language) {
            return Ok(false);
        }
        staged.save()?;
        self.global = staged;
        Ok(true)
    }

    /// The editor is about to exit: cancel the deferred save, save once more
    /// while documents are still open, and flush the global store.
    pub fn on_before_shutdown(
        &mut self,
        host: &mut dyn EditorHost,
    ) -> Result<Outcome, SessionError> {
        self.shutting_down = true;
        self.pending_save = None;
        let outcome = if self.auto_save() {
            self.save(host, SessionIndex::Current)?
        } else {
            Outcome::Completed
        };
        if self.global_enabled() {
            self.global.save()?;
        }
        Ok(outcome)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    use crate::host::HostError;
    use tempfile::tempdir;

    #[derive(Default)]
    struct WritingEditor {
        saves: Vec<PathBuf>,
    }

    impl EditorHost for WritingEditor {
        fn close_all_documents(&mut self) -> Result<(), HostError> {
            Ok(())
        }
        fn load_session(&mut self, _path: &Path) -> Result<(), HostError> {
            Ok(())
        }
        fn save_session(&mut self, path: &Path) -> Result<(), HostError> {
            self.saves.push(path.to_path_buf());
            SessionDocument::empty()
                .save(path)
                .map_err(|err| HostError::new("save session", err.to_string()))
        }
        fn document_path(&self, _buffer: BufferId) -> Option<PathBuf> {
            None
        }
        fn go_to_line(&mut self, _buffer: BufferId, _line: u32) {}
        fn toggle_bookmark(&mut self, _buffer: BufferId) {}
        fn has_bookmark(&self, _buffer: BufferId, _line: u32) -> bool {
            false
        }
        fn set_first_visible_line(&mut self, _buffer: BufferId, _line: u32) {}
    }

    #[test]
    fn load_and_save_are_rejected_while_loading() {
        let tmp = tempdir().unwrap();
        let mut manager = SessionManager::open(tmp.path()).unwrap();
        let mut editor = WritingEditor::default();
        manager.create("Work").unwrap();
        let path = manager.registry().path_for("Work");
        let before = fs::read(&path).unwrap();

        manager.loading = true;
        assert_eq!(
            manager.save(&mut editor, SessionIndex::At(0)).unwrap(),
            Outcome::Rejected
        );
        assert_eq!(
            manager.load(&mut editor, SessionIndex::At(0), false, false).unwrap(),
            Outcome::Rejected
        );
        assert!(editor.saves.is_empty());
        assert_eq!(fs::read(&path).unwrap(), before);
        assert!(!manager.global().path().exists());
    }

    #[test]
    fn deferred_save_is_skipped_while_loading() {
        let tmp = tempdir().unwrap();
        let mut manager = SessionManager::open(tmp.path()).unwrap();
        let mut editor = WritingEditor::default();
        let start = Instant::now();
        manager.on_file_closed(start);
        manager.loading = true;
        let outcome = manager.tick(&mut editor, start + Duration::from_secs(60));
        assert!(matches!(outcome, Some(Ok(Outcome::Rejected))));
        assert!(manager.pending_save().is_none());
        assert!(editor.saves.is_empty());
    }
}
