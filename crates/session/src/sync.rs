//! Merges between the global property store and session documents.
//!
//! Both directions parse every File entry before mutating anything, so a
//! malformed entry aborts the merge with neither side changed.

use crate::document::SessionDocument;
use crate::error::SessionError;
use crate::host::{BufferId, EditorHost};
use crate::store::{FileProps, GlobalStore};

/// Counts reported by a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// File entries visited.
    pub files: usize,
    /// Entries whose properties were copied across.
    pub updated: usize,
}

/// Session to global: the session is authoritative for every file it lists.
/// 工作階段寫入全域：以工作階段內容為準。
///
/// Each entry is touched in document order, so the last file listed ends up
/// at the front of the store.
pub fn push_session_to_global(
    session: &SessionDocument,
    global: &mut GlobalStore,
) -> Result<SyncReport, SessionError> {
    let entries = session.file_props()?;
    let files = entries.len();
    for (path, props) in entries {
        global.touch(&path, props);
    }
    tracing::debug!(files, "pushed session properties to global store");
    Ok(SyncReport {
        files,
        updated: files,
    })
}

/// Global to session: files with a global history take its language,
/// encoding and marks. The first visible line stays as the session has it.
/// 全域寫入工作階段：僅更新有全域紀錄的檔案。
pub fn pull_global_to_session(
    session: &mut SessionDocument,
    global: &GlobalStore,
) -> Result<SyncReport, SessionError> {
    // Validate before touching the tree.
    session.file_props()?;

    let mut report = SyncReport::default();
    for mut entry in session.files_mut() {
        report.files += 1;
        let Some(props) = global.get(entry.path()) else {
            continue;
        };
        entry.set_language(&props.language);
        entry.set_encoding(props.encoding);
        entry.replace_marks(&props.marks);
        report.updated += 1;
    }
    tracing::debug!(
        files = report.files,
        updated = report.updated,
        "pulled global properties into session"
    );
    Ok(report)
}

/// Applies the global properties of `path` to a freshly opened buffer.
/// 將全域屬性套用到剛開啟的文件。
///
/// Marks are only toggled on lines that are not bookmarked yet, which makes
/// repeated injection harmless. Returns `false` when the file has no entry.
pub fn inject_into_live_document(
    host: &mut dyn EditorHost,
    buffer: BufferId,
    path: &str,
    global: &GlobalStore,
) -> bool {
    let Some(props) = global.get(path) else {
        return false;
    };
    apply_props(host, buffer, props);
    true
}

fn apply_props(host: &mut dyn EditorHost, buffer: BufferId, props: &FileProps) {
    for &line in &props.marks {
        if host.has_bookmark(buffer, line) {
            continue;
        }
        host.go_to_line(buffer, line);
        host.toggle_bookmark(buffer);
    }
    host.set_first_visible_line(buffer, props.first_visible_line);
}
