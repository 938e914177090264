use std::collections::HashMap;

use uuid::Uuid;

use huddle_types::models::SearchKind;
use huddle_types::store::{
    SearchEntry, SearchMatch, SearchRepository, StoreResult, normalize_term,
};

/// Linear-scan substring index over lower-cased blobs.
///
/// Fine at chat scale; every query walks every entry of the requested kind.
#[derive(Default)]
pub struct SearchIndex {
    entries: HashMap<(SearchKind, Uuid), SearchEntry>,
}

impl SearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SearchRepository for SearchIndex {
    fn index(&mut self, entry: SearchEntry) -> StoreResult<()> {
        self.entries.insert((entry.kind, entry.id), entry);
        Ok(())
    }

    fn query(&self, term: &str, kind: SearchKind, limit: usize) -> StoreResult<Vec<SearchMatch>> {
        let Some(term) = normalize_term(term) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<SearchMatch> = self
            .entries
            .values()
            .filter(|e| e.kind == kind && e.blob.contains(&term))
            .map(|e| SearchMatch {
                id: e.id,
                kind: e.kind,
                timestamp: e.timestamp,
            })
            .collect();

        // Newest first; id breaks ties so equal timestamps stay deterministic.
        hits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(limit);
        Ok(hits)
    }
}
