use std::collections::HashMap;

use crate::config::ScoringConfig;
use crate::models::{Category, Flag, Transaction};

/// One step of the categorization chain.
pub trait CategoryMatcher: Send + Sync {
    fn name(&self) -> &'static str;
    fn matches(&self, tx: &Transaction, flags: &[Flag]) -> Option<Category>;
}

/// Ordered matcher chain; the first matcher to return a category wins.
///
/// Order:
/// 1. **Address tag**: either counterparty is a known tagged address.
/// 2. **Memo keyword**: memo contains a category keyword.
/// 3. **Default transfer**: direction known and amount unremarkable.
///
/// Falls through to `Unknown` when nothing applies.
pub struct Categorizer {
    matchers: Vec<Box<dyn CategoryMatcher>>,
}

impl Categorizer {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            matchers: vec![
                Box::new(AddressTagMatcher {
                    tags: config.address_tags.clone(),
                }),
                Box::new(MemoKeywordMatcher {
                    keywords: config.category_keywords.clone(),
                }),
                Box::new(DefaultTransferMatcher),
            ],
        }
    }

    pub fn categorize(&self, tx: &Transaction, flags: &[Flag]) -> Category {
        for matcher in &self.matchers {
            if let Some(category) = matcher.matches(tx, flags) {
                tracing::trace!(tx_id = %tx.tx_id, matcher = matcher.name(), %category, "Categorized");
                return category;
            }
        }
        Category::Unknown
    }

    pub fn matcher_names(&self) -> Vec<&'static str> {
        self.matchers.iter().map(|m| m.name()).collect()
    }
}

struct AddressTagMatcher {
    tags: HashMap<String, Category>,
}

impl CategoryMatcher for AddressTagMatcher {
    fn name(&self) -> &'static str {
        "address_tag"
    }

    fn matches(&self, tx: &Transaction, _flags: &[Flag]) -> Option<Category> {
        // Destination tag wins over source tag.
        self.tags
            .get(&tx.to_addr)
            .or_else(|| self.tags.get(&tx.from_addr))
            .copied()
    }
}

struct MemoKeywordMatcher {
    keywords: Vec<(Category, Vec<String>)>,
}

impl CategoryMatcher for MemoKeywordMatcher {
    fn name(&self) -> &'static str {
        "memo_keyword"
    }

    fn matches(&self, tx: &Transaction, _flags: &[Flag]) -> Option<Category> {
        let memo = tx.memo.as_deref()?.to_lowercase();
        let words: Vec<&str> = memo
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        if words.is_empty() {
            return None;
        }

        // Keywords match word prefixes, so "tumbl" catches "tumbler".
        self.keywords
            .iter()
            .find(|(_, kws)| kws.iter().any(|kw| words.iter().any(|w| w.starts_with(kw.as_str()))))
            .map(|(category, _)| *category)
    }
}

struct DefaultTransferMatcher;

impl CategoryMatcher for DefaultTransferMatcher {
    fn name(&self) -> &'static str {
        "default_transfer"
    }

    fn matches(&self, tx: &Transaction, flags: &[Flag]) -> Option<Category> {
        let unremarkable = tx.direction.is_some() && !flags.contains(&Flag::HighAmount);
        unremarkable.then_some(Category::Transfer)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
