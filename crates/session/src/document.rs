use std::fs;
use std::path::Path;

use crate::error::SessionError;
use crate::store::{FileProps, DEFAULT_ENCODING};
use crate::util::write_atomic;
use crate::xml::{XmlDocument, XmlElement, XmlNode};

const ROOT: &str = "NotepadPlus";
const SESSION: &str = "Session";
const FILE: &str = "File";
const MARK: &str = "Mark";

const ATTR_PATH: &str = "filename";
const ATTR_LANGUAGE: &str = "lang";
const ATTR_ENCODING: &str = "encoding";
const ATTR_FIRST_VISIBLE_LINE: &str = "firstVisibleLine";
const ATTR_LINE: &str = "line";

/// A serialized session: view sections holding File entries and their marks.
/// 工作階段文件：各檢視區段內的檔案項目與書籤。
///
/// Only the file path, language, encoding, first visible line and mark lines
/// are interpreted; everything else in the document is carried through
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDocument {
    tree: XmlDocument,
}

impl SessionDocument {
    /// A document with no open files in either view.
    pub fn empty() -> Self {
        let mut session = XmlElement::new(SESSION);
        session.set_attr("activeView", "0");
        for view in ["mainView", "subView"] {
            let mut element = XmlElement::new(view);
            element.set_attr("activeIndex", "0");
            session.push_element(element);
        }
        let mut root = XmlElement::new(ROOT);
        root.push_element(session);
        Self {
            tree: XmlDocument::new(root),
        }
    }

    pub fn parse(input: &str, origin: &Path) -> Result<Self, SessionError> {
        let tree = XmlDocument::parse(input).map_err(|source| SessionError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        Ok(Self { tree })
    }

    /// Reads and parses the session file at `path`.
    /// 從磁碟讀取並解析工作階段檔案。
    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let contents = fs::read_to_string(path).map_err(|err| SessionError::io(path, err))?;
        Self::parse(&contents, path)
    }

    /// Serializes the document and replaces `path` atomically.
    pub fn save(&self, path: &Path) -> Result<(), SessionError> {
        let bytes = self.to_bytes(path)?;
        write_atomic(path, &bytes).map_err(|err| SessionError::io(path, err))
    }

    pub fn to_bytes(&self, origin: &Path) -> Result<Vec<u8>, SessionError> {
        self.tree
            .to_xml_bytes()
            .map_err(|source| SessionError::Parse {
                path: origin.to_path_buf(),
                source,
            })
    }

    /// File entries across every view, in document order.
    pub fn files(&self) -> Vec<FileEntry<'_>> {
        let Some(session) = self.tree.root.child(SESSION) else {
            return Vec::new();
        };
        session
            .elements()
            .filter(|view| is_view(view))
            .flat_map(|view| view.elements().filter(|element| element.name == FILE))
            .filter(|element| element.attr(ATTR_PATH).is_some())
            .map(|element| FileEntry { element })
            .collect()
    }

    pub fn files_mut(&mut self) -> Vec<FileEntryMut<'_>> {
        let Some(session) = self.tree.root.child_mut(SESSION) else {
            return Vec::new();
        };
        session
            .elements_mut()
            .filter(|view| is_view(view))
            .flat_map(|view| view.elements_mut().filter(|element| element.name == FILE))
            .filter(|element| element.attr(ATTR_PATH).is_some())
            .map(|element| FileEntryMut { element })
            .collect()
    }

    /// Parses every File entry, failing on the first malformed attribute.
    pub fn file_props(&self) -> Result<Vec<(String, FileProps)>, SessionError> {
        self.files()
            .into_iter()
            .map(|entry| Ok((entry.path().to_string(), entry.props()?)))
            .collect()
    }

    /// Appends a File entry to the named view, creating the view when needed.
    pub fn add_file(&mut self, view: &str, path: &str, props: &FileProps) {
        if self.tree.root.child(SESSION).is_none() {
            self.tree.root.push_element(XmlElement::new(SESSION));
        }
        let Some(session) = self.tree.root.child_mut(SESSION) else {
            return;
        };
        if session.child(view).is_none() {
            session.push_element(XmlElement::new(view));
        }
        let Some(view) = session.child_mut(view) else {
            return;
        };
        let mut element = XmlElement::new(FILE);
        element.set_attr(ATTR_PATH, path);
        let mut entry = FileEntryMut {
            element: &mut element,
        };
        entry.set_language(&props.language);
        entry.set_encoding(props.encoding);
        entry.set_first_visible_line(props.first_visible_line);
        entry.replace_marks(&props.marks);
        view.push_element(element);
    }
}

fn is_view(element: &XmlElement) -> bool {
    element.name.ends_with("View")
}

/// Read-only view of a File entry.
#[derive(Debug, Clone, Copy)]
pub struct FileEntry<'a> {
    element: &'a XmlElement,
}

impl<'a> FileEntry<'a> {
    pub fn path(&self) -> &'a str {
        self.element.attr(ATTR_PATH).unwrap_or_default()
    }

    pub fn props(&self) -> Result<FileProps, SessionError> {
        read_props(self.element)
    }
}

/// Mutable view of a File entry.
#[derive(Debug)]
pub struct FileEntryMut<'a> {
    element: &'a mut XmlElement,
}

impl FileEntryMut<'_> {
    pub fn path(&self) -> &str {
        self.element.attr(ATTR_PATH).unwrap_or_default()
    }

    pub fn props(&self) -> Result<FileProps, SessionError> {
        read_props(self.element)
    }

    pub fn set_language(&mut self, language: &str) {
        self.element.set_attr(ATTR_LANGUAGE, language);
    }

    pub fn set_encoding(&mut self, encoding: i32) {
        self.element.set_attr(ATTR_ENCODING, encoding.to_string());
    }

    pub fn set_first_visible_line(&mut self, line: u32) {
        self.element
            .set_attr(ATTR_FIRST_VISIBLE_LINE, line.to_string());
    }

    /// Replaces the Mark children wholesale, keeping every other child.
    /// 整批取代書籤子節點，保留其他子節點。
    pub fn replace_marks(&mut self, lines: &[u32]) {
        let insert_at = self
            .element
            .children
            .iter()
            .position(|node| matches!(node, XmlNode::Element(child) if child.name == MARK))
            .unwrap_or(0);
        self.element.remove_elements(MARK);
        let marks = lines.iter().map(|line| {
            let mut mark = XmlElement::new(MARK);
            mark.set_attr(ATTR_LINE, line.to_string());
            XmlNode::Element(mark)
        });
        self.element.children.splice(insert_at..insert_at, marks);
    }
}

fn read_props(element: &XmlElement) -> Result<FileProps, SessionError> {
    let file = element.attr(ATTR_PATH).unwrap_or_default();
    let encoding = match element.attr(ATTR_ENCODING) {
        Some(value) => parse_attr(file, ATTR_ENCODING, value)?,
        None => DEFAULT_ENCODING,
    };
    let first_visible_line = match element.attr(ATTR_FIRST_VISIBLE_LINE) {
        Some(value) => parse_attr(file, ATTR_FIRST_VISIBLE_LINE, value)?,
        None => 0,
    };
    let marks = element
        .elements()
        .filter(|child| child.name == MARK)
        .filter_map(|mark| mark.attr(ATTR_LINE))
        .map(|value| parse_attr(file, ATTR_LINE, value))
        .collect::<Result<Vec<u32>, _>>()?;
    Ok(FileProps {
        language: element.attr(ATTR_LANGUAGE).unwrap_or_default().to_string(),
        encoding,
        first_visible_line,
        marks,
    })
}

fn parse_attr<T: std::str::FromStr>(
    file: &str,
    attribute: &'static str,
    value: &str,
) -> Result<T, SessionError> {
    value
        .trim()
        .parse()
        .map_err(|_| SessionError::InvalidAttribute {
            file: file.to_string(),
            attribute,
            value: value.to_string(),
        })
}
