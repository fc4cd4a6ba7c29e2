//! Request and response types for search backend operations.

/// Summary of a full-corpus rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReindexSummary {
    /// Number of documents in the new corpus.
    pub indexed: usize,
    /// Name of the physical index that became active, for backends that
    /// rebuild into a shadow index.
    pub active_index: Option<String>,
}

impl ReindexSummary {
    pub fn new(indexed: usize) -> Self {
        Self {
            indexed,
            active_index: None,
        }
    }

    pub fn with_active_index(mut self, name: impl Into<String>) -> Self {
        self.active_index = Some(name.into());
        self
    }
}
