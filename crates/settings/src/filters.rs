use std::collections::VecDeque;

/// 篩選歷史的預設容量。 / Default number of remembered filters.
pub const DEFAULT_FILTER_CAPACITY: usize = 20;

/// 代表「全部符合」的篩選字串。 / Filter text that matches every session.
pub const MATCH_ALL: &str = "*";

/// 管理最近使用的篩選字串。 / Maintains a bounded most-recently-used filter history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterHistory {
    capacity: usize,
    entries: VecDeque<String>,
}

impl Default for FilterHistory {
    fn default() -> Self {
        Self::new(DEFAULT_FILTER_CAPACITY)
    }
}

impl FilterHistory {
    /// 建立指定容量的清單。 / Creates a history with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// 依序列化資料還原。 / Reconstructs the history from persisted entries.
    pub fn with_entries(capacity: usize, entries: Vec<String>) -> Self {
        let mut history = Self::new(capacity);
        for entry in entries.into_iter().rev() {
            history.add(entry);
        }
        history
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 加入或提升篩選字串至頂端。 / Inserts or promotes a filter to the front.
    pub fn add(&mut self, filter: impl Into<String>) {
        let filter = filter.into();
        let trimmed = filter.trim();
        if trimmed.is_empty() || trimmed == MATCH_ALL {
            return;
        }
        let filter = trimmed.to_string();
        self.entries.retain(|existing| existing != &filter);
        self.entries.push_front(filter);
        while self.entries.len() > self.capacity {
            self.entries.pop_back();
        }
    }

    pub fn remove(&mut self, filter: &str) -> bool {
        let initial_len = self.entries.len();
        self.entries.retain(|existing| existing != filter);
        initial_len != self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }
}

/// 判斷名稱是否符合篩選字串（不分大小寫的子字串）。 / Case-insensitive substring match; `*` and empty match everything.
pub fn filter_matches(filter: &str, name: &str) -> bool {
    let filter = filter.trim();
    if filter.is_empty() || filter == MATCH_ALL {
        return true;
    }
    name.to_lowercase().contains(&filter.to_lowercase())
}
