use serde::{Deserialize, Serialize};

/// Category assigned when the model omits one or leaves it blank.
pub const DEFAULT_CATEGORY: &str = "其他";

/// One concept the model claims exists in the analysed text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermRecord {
    pub term: String,
    pub definition: String,
    #[serde(default = "default_category")]
    pub category: String,
}

impl TermRecord {
    /// Builds a record from untrimmed fields.
    ///
    /// Returns `None` when `term` or `definition` is empty after trimming. A
    /// blank `category` falls back to [`DEFAULT_CATEGORY`].
    pub fn new(
        term: impl AsRef<str>,
        definition: impl AsRef<str>,
        category: Option<&str>,
    ) -> Option<Self> {
        let term = term.as_ref().trim();
        let definition = definition.as_ref().trim();
        if term.is_empty() || definition.is_empty() {
            return None;
        }
        let category = category
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_CATEGORY);
        Some(Self {
            term: term.to_string(),
            definition: definition.to_string(),
            category: category.to_string(),
        })
    }
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_and_defaults_category() {
        let record = TermRecord::new("  RAG ", " 检索增强生成\n", Some("   ")).expect("valid");
        assert_eq!(record.term, "RAG");
        assert_eq!(record.definition, "检索增强生成");
        assert_eq!(record.category, DEFAULT_CATEGORY);
    }

    #[test]
    fn new_rejects_blank_term_or_definition() {
        assert!(TermRecord::new(" ", "definition", None).is_none());
        assert!(TermRecord::new("term", "\t", None).is_none());
    }

    #[test]
    fn deserialize_fills_missing_category() {
        let record: TermRecord =
            serde_json::from_str(r#"{"term":"LLM","definition":"大型语言模型"}"#).unwrap();
        assert_eq!(record.category, DEFAULT_CATEGORY);
    }
}
