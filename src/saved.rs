//! The collection of terms a reader chose to keep.
//!
//! The store is a plain value: the web layer loads it from a cookie at the
//! start of a request, mutates it, and writes the serialized form back.

use crate::error::SavedTermsError;
use crate::parser::parse_terms;
use crate::terms::TermRecord;
use serde_json::Value;

/// Upper bound on kept terms; the oldest entry is evicted past this.
pub const MAX_SAVED_TERMS: usize = 64;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SavedTermStore {
    entries: Vec<TermRecord>,
}

impl SavedTermStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a store from [`SavedTermStore::serialize`] output.
    ///
    /// Blank input is an empty store. Only a value that is not a JSON array is
    /// an error; malformed elements are skipped and later duplicates of a term
    /// are ignored.
    pub fn load_from_serialized(serialized: &str) -> Result<Self, SavedTermsError> {
        let mut store = Self::new();
        if serialized.trim().is_empty() {
            return Ok(store);
        }
        let items: Vec<Value> = serde_json::from_str(serialized)?;
        for record in parse_terms(&items) {
            if !store.contains(&record.term) {
                store.push_bounded(record);
            }
        }
        Ok(store)
    }

    pub fn serialize(&self) -> String {
        serde_json::to_string(&self.entries).unwrap_or_else(|_| "[]".to_string())
    }

    /// Inserts `record`, returning `true` when the term was not saved before.
    ///
    /// Re-adding a saved term refreshes its definition and category in place.
    pub fn add(&mut self, record: TermRecord) -> bool {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.term == record.term) {
            *existing = record;
            return false;
        }
        self.push_bounded(record);
        true
    }

    pub fn remove(&mut self, term: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.term != term);
        self.entries.len() != before
    }

    /// Drops and returns the entry saved longest ago.
    pub fn evict_oldest(&mut self) -> Option<TermRecord> {
        if self.entries.is_empty() {
            return None;
        }
        Some(self.entries.remove(0))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, term: &str) -> bool {
        self.entries.iter().any(|entry| entry.term == term)
    }

    pub fn get(&self, term: &str) -> Option<&TermRecord> {
        self.entries.iter().find(|entry| entry.term == term)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TermRecord> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push_bounded(&mut self, record: TermRecord) {
        if self.entries.len() >= MAX_SAVED_TERMS {
            self.entries.remove(0);
        }
        self.entries.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(term: &str, definition: &str) -> TermRecord {
        TermRecord::new(term, definition, Some("技术")).unwrap()
    }

    #[test]
    fn add_dedupes_by_exact_term() {
        let mut store = SavedTermStore::new();
        assert!(store.add(record("LLM", "大型语言模型")));
        assert!(!store.add(record("LLM", "large language model")));
        assert!(store.add(record("llm", "lowercase is a different term")));
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("LLM").unwrap().definition, "large language model");
        let order: Vec<_> = store.iter().map(|r| r.term.as_str()).collect();
        assert_eq!(order, vec!["LLM", "llm"]);
    }

    #[test]
    fn remove_and_clear() {
        let mut store = SavedTermStore::new();
        store.add(record("GPU", "图形处理器"));
        store.add(record("CPU", "中央处理器"));
        assert!(store.remove("GPU"));
        assert!(!store.remove("GPU"));
        assert!(store.contains("CPU"));
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn serialize_round_trips() {
        let mut store = SavedTermStore::new();
        store.add(record("RAG", "检索增强生成"));
        store.add(record("Token", "词元"));
        let restored = SavedTermStore::load_from_serialized(&store.serialize()).unwrap();
        assert_eq!(restored, store);
    }

    #[test]
    fn load_tolerates_blank_and_rejects_garbage() {
        assert!(SavedTermStore::load_from_serialized("").unwrap().is_empty());
        assert!(SavedTermStore::load_from_serialized("{not json").is_err());
    }

    #[test]
    fn load_skips_invalid_entries_and_duplicates() {
        let raw = r#"[
            {"term":"AI","definition":"人工智能"},
            {"term":" ","definition":"blank"},
            {"term":"AI","definition":"duplicate"}
        ]"#;
        let store = SavedTermStore::load_from_serialized(raw).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("AI").unwrap().definition, "人工智能");
        assert_eq!(store.get("AI").unwrap().category, crate::terms::DEFAULT_CATEGORY);
    }

    #[test]
    fn load_keeps_valid_entries_next_to_malformed_ones() {
        let raw = r#"[
            {"term":"LLM","definition":"大型语言模型","category":"模型"},
            {"term":"RAG"},
            {"term":"GPU","definition":"图形处理器","category":["硬件"]},
            "not an object",
            {"term":"Token","definition":"词元","category":3}
        ]"#;
        let store = SavedTermStore::load_from_serialized(raw).unwrap();
        let terms: Vec<_> = store.iter().map(|r| r.term.as_str()).collect();
        assert_eq!(terms, vec!["LLM", "GPU", "Token"]);
        assert_eq!(store.get("GPU").unwrap().category, crate::terms::DEFAULT_CATEGORY);
        assert_eq!(store.get("Token").unwrap().category, "3");
        assert!(SavedTermStore::load_from_serialized(r#"{"term":"LLM"}"#).is_err());
    }

    #[test]
    fn evict_oldest_pops_front() {
        let mut store = SavedTermStore::new();
        assert!(store.evict_oldest().is_none());
        store.add(record("GPU", "图形处理器"));
        store.add(record("CPU", "中央处理器"));
        assert_eq!(store.evict_oldest().unwrap().term, "GPU");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut store = SavedTermStore::new();
        for idx in 0..=MAX_SAVED_TERMS {
            store.add(record(&format!("term-{idx}"), "definition"));
        }
        assert_eq!(store.len(), MAX_SAVED_TERMS);
        assert!(!store.contains("term-0"));
        assert!(store.contains(&format!("term-{MAX_SAVED_TERMS}")));
    }
}
