//! Named editor sessions with global per-file properties.
//! 管理具名編輯器工作階段，並同步各檔案的全域屬性（書籤、語言、編碼）。

mod util;

pub mod descriptor;
pub mod document;
pub mod error;
pub mod host;
pub mod manager;
pub mod registry;
pub mod scanner;
pub mod store;
pub mod sync;
pub mod xml;

pub use descriptor::SessionDescriptor;
pub use document::{FileEntry, FileEntryMut, SessionDocument};
pub use error::SessionError;
pub use host::{BufferId, EditorHost, HostError};
pub use manager::{Outcome, SessionManager, GLOBAL_FILE, SESSIONS_DIR, SETTINGS_FILE};
pub use registry::{RegistryConfig, SessionIndex, SessionRegistry};
pub use scanner::scan_sessions;
pub use store::{FileProps, GlobalStore};
pub use sync::{
    inject_into_live_document, pull_global_to_session, push_session_to_global, SyncReport,
};
