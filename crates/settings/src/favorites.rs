/// 常用工作階段名稱的有序集合。 / Ordered set of favorite session names.
///
/// 名稱比較不分大小寫，與工作階段檔名的比較方式一致。 / Membership is
/// case-insensitive, matching how session file names collide.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Favorites {
    names: Vec<String>,
}

impl Favorites {
    pub fn new() -> Self {
        Self::default()
    }

    /// 依序列化資料還原，並去除重複項目。 / Rebuilds the set from persisted names, dropping duplicates.
    pub fn with_names(names: Vec<String>) -> Self {
        let mut favorites = Self::new();
        for name in names {
            favorites.add(name);
        }
        favorites
    }

    /// 加入名稱；已存在時回傳 `false`。 / Adds a name, returning `false` when already present.
    pub fn add(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if name.trim().is_empty() || self.contains(&name) {
            return false;
        }
        self.names.push(name);
        true
    }

    /// 移除名稱。 / Removes a name and reports whether it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        let initial_len = self.names.len();
        self.names.retain(|existing| !same_name(existing, name));
        initial_len != self.names.len()
    }

    /// 工作階段改名時同步更新。 / Follows a session rename.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        match self.names.iter_mut().find(|existing| same_name(existing, from)) {
            Some(slot) => {
                *slot = to.to_string();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|existing| same_name(existing, name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.names.clone()
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}
