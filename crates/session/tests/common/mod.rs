#![allow(dead_code)]

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use sessionmgr_session::{BufferId, EditorHost, FileProps, HostError, SessionDocument};

/// A document open in the fake editor.
#[derive(Debug, Clone, Default)]
pub struct OpenDoc {
    pub path: String,
    pub language: String,
    pub first_visible_line: u32,
    pub bookmarks: BTreeSet<u32>,
}

/// Editor stand-in that reads and writes real session documents.
#[derive(Debug, Default)]
pub struct FakeEditor {
    pub docs: Vec<OpenDoc>,
    pub calls: Vec<String>,
    pub cursor: u32,
    pub toggles: usize,
}

impl FakeEditor {
    pub fn open(&mut self, path: &str, marks: &[u32]) -> BufferId {
        self.docs.push(OpenDoc {
            path: path.to_string(),
            language: "Normal Text".to_string(),
            first_visible_line: 0,
            bookmarks: marks.iter().copied().collect(),
        });
        (self.docs.len() - 1) as BufferId
    }

    pub fn doc(&self, path: &str) -> Option<&OpenDoc> {
        self.docs.iter().find(|doc| doc.path == path)
    }

    pub fn marks(&self, path: &str) -> Vec<u32> {
        self.doc(path)
            .map(|doc| doc.bookmarks.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls.iter().filter(|call| call.starts_with(prefix)).count()
    }

    fn slot(&mut self, buffer: BufferId) -> Option<&mut OpenDoc> {
        self.docs.get_mut(buffer as usize)
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl EditorHost for FakeEditor {
    fn close_all_documents(&mut self) -> Result<(), HostError> {
        self.calls.push("close_all".to_string());
        self.docs.clear();
        Ok(())
    }

    fn load_session(&mut self, path: &Path) -> Result<(), HostError> {
        self.calls.push(format!("load {}", file_stem(path)));
        let document = SessionDocument::load(path)
            .map_err(|err| HostError::new("load session", err.to_string()))?;
        let files = document
            .file_props()
            .map_err(|err| HostError::new("load session", err.to_string()))?;
        for (path, props) in files {
            self.docs.push(OpenDoc {
                path,
                language: props.language,
                first_visible_line: props.first_visible_line,
                bookmarks: props.marks.into_iter().collect(),
            });
        }
        Ok(())
    }

    fn save_session(&mut self, path: &Path) -> Result<(), HostError> {
        self.calls.push(format!("save {}", file_stem(path)));
        let mut document = SessionDocument::empty();
        for doc in &self.docs {
            document.add_file(
                "mainView",
                &doc.path,
                &FileProps {
                    language: doc.language.clone(),
                    encoding: -1,
                    first_visible_line: doc.first_visible_line,
                    marks: doc.bookmarks.iter().copied().collect(),
                },
            );
        }
        document
            .save(path)
            .map_err(|err| HostError::new("save session", err.to_string()))
    }

    fn document_path(&self, buffer: BufferId) -> Option<PathBuf> {
        self.docs
            .get(buffer as usize)
            .map(|doc| PathBuf::from(&doc.path))
    }

    fn go_to_line(&mut self, _buffer: BufferId, line: u32) {
        self.cursor = line;
    }

    fn toggle_bookmark(&mut self, buffer: BufferId) {
        self.toggles += 1;
        let line = self.cursor;
        if let Some(doc) = self.slot(buffer) {
            if !doc.bookmarks.remove(&line) {
                doc.bookmarks.insert(line);
            }
        }
    }

    fn has_bookmark(&self, buffer: BufferId, line: u32) -> bool {
        self.docs
            .get(buffer as usize)
            .map(|doc| doc.bookmarks.contains(&line))
            .unwrap_or(false)
    }

    fn set_first_visible_line(&mut self, buffer: BufferId, line: u32) {
        if let Some(doc) = self.slot(buffer) {
            doc.first_visible_line = line;
        }
    }
}

/// Writes a session file listing `files` (path, marks) under `<config>/sessions`.
pub fn write_session(config_dir: &Path, name: &str, files: &[(&str, &[u32])]) -> PathBuf {
    let mut document = SessionDocument::empty();
    for (path, marks) in files {
        document.add_file(
            "mainView",
            path,
            &FileProps {
                marks: marks.to_vec(),
                ..FileProps::default()
            },
        );
    }
    let path = config_dir
        .join("sessions")
        .join(format!("{name}.npp-session"));
    document.save(&path).expect("write session");
    path
}

pub fn session_marks(path: &Path, file: &str) -> Vec<u32> {
    SessionDocument::load(path)
        .expect("load session")
        .file_props()
        .expect("parse session")
        .into_iter()
        .find(|(candidate, _)| candidate == file)
        .map(|(_, props)| props.marks)
        .unwrap_or_default()
}

pub fn names(manager: &sessionmgr_session::SessionManager) -> Vec<String> {
    manager
        .registry()
        .descriptors()
        .iter()
        .map(|descriptor| descriptor.name.clone())
        .collect()
}

pub fn remove_session(config_dir: &Path, name: &str) {
    fs::remove_file(
        config_dir
            .join("sessions")
            .join(format!("{name}.npp-session")),
    )
    .expect("remove session file");
}
