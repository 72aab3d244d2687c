use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use sessionmgr_settings::SortOrder;

use crate::descriptor::{compare, SessionDescriptor};
use crate::error::SessionError;

/// Lists the sessions stored in `dir`, sorted by `order`.
/// 列出目錄中的工作階段並依設定排序。
///
/// A missing directory yields an empty catalog. Any other enumeration error is
/// returned to the caller.
pub fn scan_sessions(
    dir: &Path,
    extension: &str,
    order: SortOrder,
) -> Result<Vec<SessionDescriptor>, SessionError> {
    let scan_err = |source| SessionError::Scan {
        dir: dir.to_path_buf(),
        source,
    };
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(scan_err(err)),
    };

    let mut catalog = Vec::new();
    for entry in entries {
        let entry = entry.map_err(scan_err)?;
        let file_type = entry.file_type().map_err(scan_err)?;
        if !file_type.is_file() && !file_type.is_symlink() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            tracing::warn!(path = ?entry.path(), "skipping session file with a non UTF-8 name");
            continue;
        };
        let Some(name) = strip_extension(file_name, extension) else {
            continue;
        };
        let metadata = match fs::metadata(entry.path()) {
            Ok(metadata) => metadata,
            // Dangling symlink.
            Err(err) if err.kind() == ErrorKind::NotFound => continue,
            Err(err) => return Err(scan_err(err)),
        };
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().map_err(scan_err)?;
        let descriptor = SessionDescriptor::new(name, modified).with_file_name(file_name);
        insert_unique(&mut catalog, descriptor, extension);
    }

    catalog.sort_by(|a, b| compare(a, b, order, false));
    tracing::debug!(dir = %dir.display(), count = catalog.len(), "scanned session directory");
    Ok(catalog)
}

/// Keeps one descriptor per name. On case-sensitive filesystems `a.sess` and
/// `a.SESS` can coexist; the exact extension wins.
fn insert_unique(catalog: &mut Vec<SessionDescriptor>, descriptor: SessionDescriptor, extension: &str) {
    let Some(index) = catalog
        .iter()
        .position(|other| other.name == descriptor.name)
    else {
        catalog.push(descriptor);
        return;
    };
    let exact = |candidate: &SessionDescriptor| {
        candidate
            .file_name
            .as_deref()
            .is_some_and(|file_name| file_name.ends_with(extension))
    };
    let replace = !exact(&catalog[index]) && exact(&descriptor);
    let kept = if replace {
        descriptor.file_name.clone()
    } else {
        catalog[index].file_name.clone()
    };
    tracing::warn!(session = %descriptor.name, ?kept, "several files map to the same session name");
    if replace {
        catalog[index] = descriptor;
    }
}

fn strip_extension<'a>(file_name: &'a str, extension: &str) -> Option<&'a str> {
    let split = file_name.len().checked_sub(extension.len())?;
    if split == 0 || !file_name.is_char_boundary(split) {
        return None;
    }
    let (name, ext) = file_name.split_at(split);
    ext.eq_ignore_ascii_case(extension).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    #[test]
    fn missing_directory_is_empty() {
        let tmp = tempdir().unwrap();
        let catalog =
            scan_sessions(&tmp.path().join("absent"), ".npp-session", SortOrder::Alpha).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn lists_matching_files_only() {
        let tmp = tempdir().unwrap();
        for name in [
            "beta.npp-session",
            "Alpha.NPP-SESSION",
            "notes.txt",
            ".npp-session",
            "Work.npp-session.tmp",
        ] {
            fs::write(tmp.path().join(name), "<NotepadPlus />").unwrap();
        }
        fs::create_dir(tmp.path().join("dir.npp-session")).unwrap();

        let catalog = scan_sessions(tmp.path(), ".npp-session", SortOrder::Alpha).unwrap();
        let names: Vec<_> = catalog.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "beta"]);
        assert_eq!(catalog[0].file_name.as_deref(), Some("Alpha.NPP-SESSION"));
    }

    #[test]
    fn exact_extension_wins_over_case_variant() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("Work.SESS"), "<A/>").unwrap();
        fs::write(tmp.path().join("Work.sess"), "<B/>").unwrap();

        let catalog = scan_sessions(tmp.path(), ".sess", SortOrder::Alpha).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].file_name.as_deref(), Some("Work.sess"));
    }

    #[test]
    fn date_order_uses_modification_time() {
        let tmp = tempdir().unwrap();
        let base = SystemTime::now() - Duration::from_secs(3600);
        for (offset, name) in [(10, "old"), (30, "new"), (20, "mid")] {
            let path = tmp.path().join(format!("{name}.sess"));
            fs::write(&path, "<NotepadPlus />").unwrap();
            let file = fs::File::options().write(true).open(&path).unwrap();
            file.set_modified(base + Duration::from_secs(offset)).unwrap();
        }

        let catalog = scan_sessions(tmp.path(), ".sess", SortOrder::Date).unwrap();
        let names: Vec<_> = catalog.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["new", "mid", "old"]);
    }

    #[test]
    fn strips_extension_case_insensitively() {
        assert_eq!(strip_extension("a.SESS", ".sess"), Some("a"));
        assert_eq!(strip_extension(".sess", ".sess"), None);
        assert_eq!(strip_extension("s", ".sess"), None);
        assert_eq!(strip_extension("a.sess.bak", ".sess"), None);
    }
}
