//! 工作階段管理的設定、常用清單與篩選歷史。 / Settings, favorites and filter history for the session manager.

pub mod favorites;
pub mod filters;
pub mod options;
pub mod store;

pub use favorites::Favorites;
pub use filters::{filter_matches, FilterHistory, DEFAULT_FILTER_CAPACITY, MATCH_ALL};
pub use options::{
    SettingKey, SettingKind, SettingValue, Settings, SortOrder, DEFAULT_SESSION_EXTENSION,
    DEFAULT_SESSION_NAME, MAX_SAVE_DELAY_SECONDS,
};
pub use store::{SettingsError, SettingsStore};
