use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// 預設工作階段副檔名。 / Default extension for session files.
pub const DEFAULT_SESSION_EXTENSION: &str = ".npp-session";
/// 預設工作階段名稱。 / Default name of the default session.
pub const DEFAULT_SESSION_NAME: &str = "Default";
/// 延遲儲存的上限秒數。 / Upper bound for the deferred save delay.
pub const MAX_SAVE_DELAY_SECONDS: i64 = 60;

/// 所有可設定項目的封閉列舉。 / Closed set of configurable options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SettingKey {
    AutoSave,
    AutoLoad,
    LoadIntoCurrent,
    LoadWithoutClosing,
    GlobalBookmarks,
    SortOrder,
    FavoritesFirst,
    SaveDelay,
    SessionDirectory,
    SessionExtension,
    DefaultName,
    CurrentName,
    PreviousName,
}

/// 設定值的型別。 / The value type a key carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Bool,
    Int,
    Str,
}

impl SettingKey {
    pub const ALL: [SettingKey; 13] = [
        SettingKey::AutoSave,
        SettingKey::AutoLoad,
        SettingKey::LoadIntoCurrent,
        SettingKey::LoadWithoutClosing,
        SettingKey::GlobalBookmarks,
        SettingKey::SortOrder,
        SettingKey::FavoritesFirst,
        SettingKey::SaveDelay,
        SettingKey::SessionDirectory,
        SettingKey::SessionExtension,
        SettingKey::DefaultName,
        SettingKey::CurrentName,
        SettingKey::PreviousName,
    ];

    pub fn kind(self) -> SettingKind {
        match self {
            SettingKey::AutoSave
            | SettingKey::AutoLoad
            | SettingKey::LoadIntoCurrent
            | SettingKey::LoadWithoutClosing
            | SettingKey::GlobalBookmarks
            | SettingKey::FavoritesFirst => SettingKind::Bool,
            SettingKey::SaveDelay => SettingKind::Int,
            SettingKey::SortOrder
            | SettingKey::SessionDirectory
            | SettingKey::SessionExtension
            | SettingKey::DefaultName
            | SettingKey::CurrentName
            | SettingKey::PreviousName => SettingKind::Str,
        }
    }

    /// 各鍵的預設值。 / Default value of each key.
    pub fn default_value(self) -> SettingValue {
        match self {
            SettingKey::AutoSave | SettingKey::GlobalBookmarks => SettingValue::Bool(true),
            SettingKey::AutoLoad
            | SettingKey::LoadIntoCurrent
            | SettingKey::LoadWithoutClosing
            | SettingKey::FavoritesFirst => SettingValue::Bool(false),
            SettingKey::SaveDelay => SettingValue::Int(3),
            SettingKey::SortOrder => SettingValue::Str(SortOrder::Alpha.as_str().to_string()),
            SettingKey::SessionExtension => SettingValue::Str(DEFAULT_SESSION_EXTENSION.to_string()),
            SettingKey::DefaultName => SettingValue::Str(DEFAULT_SESSION_NAME.to_string()),
            SettingKey::SessionDirectory | SettingKey::CurrentName | SettingKey::PreviousName => {
                SettingValue::Str(String::new())
            }
        }
    }

    /// 序列化使用的名稱。 / Name used on disk and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            SettingKey::AutoSave => "autoSave",
            SettingKey::AutoLoad => "autoLoad",
            SettingKey::LoadIntoCurrent => "loadIntoCurrent",
            SettingKey::LoadWithoutClosing => "loadWithoutClosing",
            SettingKey::GlobalBookmarks => "globalBookmarks",
            SettingKey::SortOrder => "sortOrder",
            SettingKey::FavoritesFirst => "favoritesFirst",
            SettingKey::SaveDelay => "saveDelay",
            SettingKey::SessionDirectory => "sessionDirectory",
            SettingKey::SessionExtension => "sessionExtension",
            SettingKey::DefaultName => "defaultName",
            SettingKey::CurrentName => "currentName",
            SettingKey::PreviousName => "previousName",
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKey {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        SettingKey::ALL
            .into_iter()
            .find(|key| key.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| format!("unknown setting '{value}'"))
    }
}

/// 標記型別的設定值。 / A setting value tagged with its type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl SettingValue {
    pub fn kind(&self) -> SettingKind {
        match self {
            SettingValue::Bool(_) => SettingKind::Bool,
            SettingValue::Int(_) => SettingKind::Int,
            SettingValue::Str(_) => SettingKind::Str,
        }
    }

    /// 依指定型別解析文字輸入。 / Parses textual input for a key of the given kind.
    pub fn parse(kind: SettingKind, input: &str) -> Result<Self, String> {
        let trimmed = input.trim();
        match kind {
            SettingKind::Bool => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(SettingValue::Bool(true)),
                "false" | "no" | "off" | "0" => Ok(SettingValue::Bool(false)),
                _ => Err(format!("'{input}' is not a boolean")),
            },
            SettingKind::Int => trimmed
                .parse::<i64>()
                .map(SettingValue::Int)
                .map_err(|err| format!("'{input}' is not an integer: {err}")),
            SettingKind::Str => Ok(SettingValue::Str(input.to_string())),
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(value) => write!(f, "{value}"),
            SettingValue::Int(value) => write!(f, "{value}"),
            SettingValue::Str(value) => f.write_str(value),
        }
    }
}

/// 工作階段清單的排序方式。 / Ordering applied to the session catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Alpha,
    /// 依修改時間遞減，名稱為次要鍵。 / Newest first, name as tiebreak.
    Date,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Alpha => "alpha",
            SortOrder::Date => "date",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "alpha" => Some(SortOrder::Alpha),
            "date" => Some(SortOrder::Date),
            _ => None,
        }
    }
}

/// 以封閉列舉為鍵的設定對照表。 / Typed settings map keyed by the closed enum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Settings {
    values: BTreeMap<SettingKey, SettingValue>,
}

/// 未知的鍵或無法解讀的值會被略過。 / Unknown keys and unreadable values are skipped.
impl<'de> Deserialize<'de> for Settings {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
        let mut values = BTreeMap::new();
        for (name, value) in raw {
            let Ok(key) = name.parse::<SettingKey>() else {
                tracing::warn!(setting = %name, "ignoring unknown setting");
                continue;
            };
            match serde_json::from_value::<SettingValue>(value) {
                Ok(value) => {
                    values.insert(key, value);
                }
                Err(err) => {
                    tracing::warn!(setting = %name, %err, "ignoring unreadable setting value");
                }
            }
        }
        Ok(Self { values })
    }
}

impl Default for Settings {
    fn default() -> Self {
        let values = SettingKey::ALL
            .into_iter()
            .map(|key| (key, key.default_value()))
            .collect();
        Self { values }
    }
}

impl Settings {
    /// 取得原始值；缺漏時回傳預設值。 / Raw value, falling back to the key default.
    pub fn get(&self, key: SettingKey) -> SettingValue {
        self.values
            .get(&key)
            .cloned()
            .unwrap_or_else(|| key.default_value())
    }

    /// 寫入原始值；型別不符時拒絕。 / Stores a raw value, rejecting a kind mismatch.
    pub fn put(&mut self, key: SettingKey, value: SettingValue) -> Result<(), String> {
        if value.kind() != key.kind() {
            return Err(format!("setting '{key}' expects a {:?} value", key.kind()));
        }
        self.values.insert(key, value);
        self.sanitize();
        Ok(())
    }

    pub fn get_bool(&self, key: SettingKey) -> bool {
        match self.values.get(&key) {
            Some(SettingValue::Bool(value)) => *value,
            _ => matches!(key.default_value(), SettingValue::Bool(true)),
        }
    }

    pub fn get_int(&self, key: SettingKey) -> i64 {
        match (self.values.get(&key), key.default_value()) {
            (Some(SettingValue::Int(value)), _) => *value,
            (_, SettingValue::Int(fallback)) => fallback,
            _ => 0,
        }
    }

    pub fn get_str(&self, key: SettingKey) -> &str {
        match self.values.get(&key) {
            Some(SettingValue::Str(value)) => value,
            _ => "",
        }
    }

    pub fn put_bool(&mut self, key: SettingKey, value: bool) {
        debug_assert_eq!(key.kind(), SettingKind::Bool);
        self.values.insert(key, SettingValue::Bool(value));
    }

    pub fn put_int(&mut self, key: SettingKey, value: i64) {
        debug_assert_eq!(key.kind(), SettingKind::Int);
        self.values.insert(key, SettingValue::Int(value));
        self.sanitize();
    }

    pub fn put_str(&mut self, key: SettingKey, value: impl Into<String>) {
        debug_assert_eq!(key.kind(), SettingKind::Str);
        self.values.insert(key, SettingValue::Str(value.into()));
        self.sanitize();
    }

    pub fn sort_order(&self) -> SortOrder {
        SortOrder::parse(self.get_str(SettingKey::SortOrder)).unwrap_or_default()
    }

    /// 副檔名一律帶有前導點。 / Extension, always with its leading dot.
    pub fn session_extension(&self) -> &str {
        self.get_str(SettingKey::SessionExtension)
    }

    pub fn default_name(&self) -> &str {
        self.get_str(SettingKey::DefaultName)
    }

    /// 修正型別錯誤或超出範圍的值。 / Repairs mistyped or out-of-range values.
    pub fn sanitize(&mut self) {
        for key in SettingKey::ALL {
            let valid = matches!(self.values.get(&key), Some(value) if value.kind() == key.kind());
            if !valid {
                self.values.insert(key, key.default_value());
            }
        }

        if let Some(SettingValue::Int(delay)) = self.values.get_mut(&SettingKey::SaveDelay) {
            *delay = (*delay).clamp(0, MAX_SAVE_DELAY_SECONDS);
        }

        if let Some(SettingValue::Str(order)) = self.values.get_mut(&SettingKey::SortOrder) {
            let normalized = SortOrder::parse(order).unwrap_or_default();
            *order = normalized.as_str().to_string();
        }

        if let Some(SettingValue::Str(ext)) = self.values.get_mut(&SettingKey::SessionExtension) {
            let trimmed = ext.trim();
            *ext = if trimmed.is_empty() || trimmed == "." {
                DEFAULT_SESSION_EXTENSION.to_string()
            } else if trimmed.starts_with('.') {
                trimmed.to_string()
            } else {
                format!(".{trimmed}")
            };
        }

        if let Some(SettingValue::Str(name)) = self.values.get_mut(&SettingKey::DefaultName) {
            if name.trim().is_empty() {
                *name = DEFAULT_SESSION_NAME.to_string();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_key() {
        let settings = Settings::default();
        for key in SettingKey::ALL {
            assert_eq!(settings.get(key).kind(), key.kind(), "{key}");
        }
        assert!(settings.get_bool(SettingKey::AutoSave));
        assert!(!settings.get_bool(SettingKey::AutoLoad));
        assert_eq!(settings.get_int(SettingKey::SaveDelay), 3);
        assert_eq!(settings.session_extension(), DEFAULT_SESSION_EXTENSION);
        assert_eq!(settings.default_name(), "Default");
        assert_eq!(settings.sort_order(), SortOrder::Alpha);
    }

    #[test]
    fn put_rejects_kind_mismatch() {
        let mut settings = Settings::default();
        let err = settings
            .put(SettingKey::AutoSave, SettingValue::Int(1))
            .unwrap_err();
        assert!(err.contains("autoSave"));
        assert!(settings.get_bool(SettingKey::AutoSave));
    }

    #[test]
    fn sanitize_repairs_values() {
        let mut settings = Settings::default();
        settings.put_str(SettingKey::SessionExtension, "sess");
        assert_eq!(settings.session_extension(), ".sess");

        settings.put_int(SettingKey::SaveDelay, 900);
        assert_eq!(settings.get_int(SettingKey::SaveDelay), MAX_SAVE_DELAY_SECONDS);

        settings.put_str(SettingKey::SortOrder, "DATE");
        assert_eq!(settings.sort_order(), SortOrder::Date);
        settings.put_str(SettingKey::SortOrder, "bogus");
        assert_eq!(settings.sort_order(), SortOrder::Alpha);

        settings.put_str(SettingKey::DefaultName, "  ");
        assert_eq!(settings.default_name(), "Default");
    }

    #[test]
    fn parse_values_by_kind() {
        assert_eq!(
            SettingValue::parse(SettingKind::Bool, "Yes").unwrap(),
            SettingValue::Bool(true)
        );
        assert_eq!(
            SettingValue::parse(SettingKind::Int, " 12 ").unwrap(),
            SettingValue::Int(12)
        );
        assert!(SettingValue::parse(SettingKind::Int, "twelve").is_err());
        assert_eq!("autoload".parse::<SettingKey>().unwrap(), SettingKey::AutoLoad);
        assert!("nope".parse::<SettingKey>().is_err());
    }
}
