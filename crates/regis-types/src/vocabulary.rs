//! Vocabularies for choice fields.
//!
//! A choice field either carries its terms inline or names a vocabulary that
//! is resolved when the field is bound to a context.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// An ordered set of allowed text terms.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    terms: Vec<String>,
}

impl Vocabulary {
    /// Build a vocabulary from terms, dropping duplicates but keeping order.
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut terms: Vec<String> = Vec::new();
        for value in values {
            let value = value.into();
            if !terms.contains(&value) {
                terms.push(value);
            }
        }
        Self { terms }
    }

    pub fn contains(&self, term: &str) -> bool {
        self.terms.iter().any(|t| t == term)
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Resolves named vocabularies when a field is bound.
pub trait VocabularyResolver {
    fn resolve(&self, name: &str) -> Option<Vocabulary>;
}

/// A fixed name-to-vocabulary table.
#[derive(Clone, Debug, Default)]
pub struct StaticVocabularies {
    vocabularies: HashMap<String, Vocabulary>,
}

impl StaticVocabularies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, vocabulary: Vocabulary) {
        self.vocabularies.insert(name.into(), vocabulary);
    }
}

impl VocabularyResolver for StaticVocabularies {
    fn resolve(&self, name: &str) -> Option<Vocabulary> {
        self.vocabularies.get(name).cloned()
    }
}

/// A resolver that knows no vocabularies.
pub struct NoVocabularies;

impl VocabularyResolver for NoVocabularies {
    fn resolve(&self, _name: &str) -> Option<Vocabulary> {
        None
    }
}
