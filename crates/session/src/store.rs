use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::util::write_atomic;

/// Root element of the global property file.
pub const GLOBAL_ROOT: &str = "SessionMgr";
/// Encoding value written by the editor when none was chosen.
pub const DEFAULT_ENCODING: i32 = -1;

/// Per-file properties shared by every session that opens the file.
/// 所有工作階段共用的單檔屬性。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileProps {
    pub language: String,
    pub encoding: i32,
    pub first_visible_line: u32,
    /// Bookmarked lines in document order.
    pub marks: Vec<u32>,
}

impl Default for FileProps {
    fn default() -> Self {
        Self {
            language: String::new(),
            encoding: DEFAULT_ENCODING,
            first_visible_line: 0,
            marks: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GlobalFileXml {
    #[serde(rename = "File", default)]
    files: Vec<GlobalEntryXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GlobalEntryXml {
    #[serde(rename = "@filename")]
    filename: String,
    #[serde(rename = "@lang", default)]
    lang: String,
    #[serde(rename = "@encoding", default = "default_encoding")]
    encoding: i32,
    #[serde(rename = "@firstVisibleLine", default)]
    first_visible_line: u32,
    #[serde(rename = "Mark", default)]
    marks: Vec<MarkXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MarkXml {
    #[serde(rename = "@line")]
    line: u32,
}

fn default_encoding() -> i32 {
    DEFAULT_ENCODING
}

/// Global property store keyed by the literal file path.
/// 以檔案路徑字串為鍵的全域屬性存放區。
///
/// Iteration order is most recently touched first. Paths are compared as
/// stored; no case folding or symlink resolution takes place.
#[derive(Debug, Clone)]
pub struct GlobalStore {
    path: PathBuf,
    entries: IndexMap<String, FileProps>,
}

impl GlobalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: IndexMap::new(),
        }
    }

    /// Loads the store from disk. A missing file yields an empty store.
    /// 從磁碟載入；若檔案不存在則回傳空白存放區。
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref().to_path_buf();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::new(path)),
            Err(err) => return Err(SessionError::io(path, err)),
        };
        let file: GlobalFileXml =
            quick_xml::de::from_str(&contents).map_err(|source| SessionError::GlobalParse {
                path: path.clone(),
                source,
            })?;

        let mut entries = IndexMap::with_capacity(file.files.len());
        for entry in file.files {
            if entries.contains_key(&entry.filename) {
                tracing::warn!(file = %entry.filename, "ignoring duplicate global property entry");
                continue;
            }
            let props = FileProps {
                language: entry.lang,
                encoding: entry.encoding,
                first_visible_line: entry.first_visible_line,
                marks: entry.marks.into_iter().map(|mark| mark.line).collect(),
            };
            entries.insert(entry.filename, props);
        }
        tracing::debug!(path = %path.display(), count = entries.len(), "loaded global properties");
        Ok(Self { path, entries })
    }

    /// Persists the store using an atomic write.
    pub fn save(&self) -> Result<(), SessionError> {
        let file = GlobalFileXml {
            files: self
                .entries
                .iter()
                .map(|(filename, props)| GlobalEntryXml {
                    filename: filename.clone(),
                    lang: props.language.clone(),
                    encoding: props.encoding,
                    first_visible_line: props.first_visible_line,
                    marks: props.marks.iter().map(|&line| MarkXml { line }).collect(),
                })
                .collect(),
        };
        let xml = quick_xml::se::to_string_with_root(GLOBAL_ROOT, &file).map_err(|source| {
            SessionError::GlobalEncode {
                path: self.path.clone(),
                source,
            }
        })?;
        let mut payload = String::with_capacity(xml.len() + 48);
        payload.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\" ?>\n");
        payload.push_str(&xml);
        payload.push('\n');
        write_atomic(&self.path, payload.as_bytes()).map_err(|err| SessionError::io(&self.path, err))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, path: &str) -> Option<&FileProps> {
        self.entries.get(path)
    }

    /// Replaces the entry for `path` and moves it to the front.
    /// 取代指定路徑的項目並移至最前端。
    pub fn touch(&mut self, path: &str, props: FileProps) {
        self.entries.shift_remove(path);
        self.entries.shift_insert(0, path.to_string(), props);
    }

    /// Updates the language of an existing entry, moving it to the front.
    pub fn set_language(&mut self, path: &str, language: &str) -> bool {
        let Some(mut props) = self.entries.get(path).cloned() else {
            return false;
        };
        if props.language == language {
            return false;
        }
        props.language = language.to_string();
        self.touch(path, props);
        true
    }

    pub fn remove(&mut self, path: &str) -> bool {
        self.entries.shift_remove(path).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileProps)> {
        self.entries.iter().map(|(path, props)| (path.as_str(), props))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
