use std::cmp::Ordering;
use std::time::SystemTime;

use sessionmgr_settings::SortOrder;

/// A session file found during a directory scan.
/// 目錄掃描時找到的工作階段檔案。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescriptor {
    /// File name without directory or extension.
    pub name: String,
    pub modified: SystemTime,
    pub favorite: bool,
    /// File name as found on disk, when it was scanned rather than synthesized.
    pub file_name: Option<String>,
}

impl SessionDescriptor {
    pub fn new(name: impl Into<String>, modified: SystemTime) -> Self {
        Self {
            name: name.into(),
            modified,
            favorite: false,
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

/// Catalog ordering: the configured key, optionally with favorites grouped first.
pub fn compare(
    a: &SessionDescriptor,
    b: &SessionDescriptor,
    order: SortOrder,
    favorites_first: bool,
) -> Ordering {
    let group = if favorites_first {
        b.favorite.cmp(&a.favorite)
    } else {
        Ordering::Equal
    };
    group.then_with(|| match order {
        SortOrder::Alpha => alpha(a, b),
        SortOrder::Date => b.modified.cmp(&a.modified).then_with(|| alpha(a, b)),
    })
}

fn alpha(a: &SessionDescriptor, b: &SessionDescriptor) -> Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.name.cmp(&b.name))
}
