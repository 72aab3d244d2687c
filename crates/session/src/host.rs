//! Operations the host editor performs on behalf of the session manager.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Opaque handle the host uses for an open document.
pub type BufferId = u64;

/// Failure reported by the host editor.
/// 宿主編輯器回報的失敗。
#[derive(Debug, Error)]
#[error("editor failed to {operation}: {message}")]
pub struct HostError {
    pub operation: &'static str,
    pub message: String,
}

impl HostError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

/// The editor side of the session lifecycle.
/// 工作階段生命週期中由編輯器負責的操作。
///
/// Line numbers are zero-based, as stored in session files.
pub trait EditorHost {
    fn close_all_documents(&mut self) -> Result<(), HostError>;

    /// Opens every document listed in the serialized session at `path`.
    fn load_session(&mut self, path: &Path) -> Result<(), HostError>;

    /// Writes the editor's open documents and view state to `path`.
    fn save_session(&mut self, path: &Path) -> Result<(), HostError>;

    fn document_path(&self, buffer: BufferId) -> Option<PathBuf>;

    fn go_to_line(&mut self, buffer: BufferId, line: u32);

    /// Toggles the bookmark on the line under the cursor.
    fn toggle_bookmark(&mut self, buffer: BufferId);

    fn has_bookmark(&self, buffer: BufferId, line: u32) -> bool;

    fn set_first_visible_line(&mut self, buffer: BufferId, line: u32);
}
