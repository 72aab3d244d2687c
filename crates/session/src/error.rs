use std::io;
use std::path::PathBuf;

use sessionmgr_settings::SettingsError;
use thiserror::Error;

use crate::host::HostError;
use crate::registry::SessionIndex;
use crate::xml::XmlError;

/// Error type for session management and property synchronisation.
/// 工作階段管理與屬性同步時可能出現的錯誤。
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to list session directory {dir}: {source}")]
    Scan {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed session document {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: XmlError,
    },
    #[error("malformed global property file {path}: {source}")]
    GlobalParse {
        path: PathBuf,
        #[source]
        source: quick_xml::DeError,
    },
    #[error("failed to encode global property file {path}: {source}")]
    GlobalEncode {
        path: PathBuf,
        #[source]
        source: quick_xml::DeError,
    },
    #[error("invalid {attribute} value '{value}' for {file}")]
    InvalidAttribute {
        file: String,
        attribute: &'static str,
        value: String,
    },
    #[error("invalid session name '{0}'")]
    InvalidName(String),
    #[error("a session named '{0}' already exists")]
    NameCollision(String),
    #[error("no session at {0}")]
    InvalidIndex(SessionIndex),
    #[error("session '{name}' is the {role} session and cannot be deleted")]
    Protected { name: String, role: &'static str },
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl SessionError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SessionError::Io {
            path: path.into(),
            source,
        }
    }
}
