// Identity Cache
//
// Run-scoped mapping from a Redash query id to the Databricks objects
// created for it. Gives create-query at-most-once semantics within a
// single process invocation; there is no eviction and no persistence.

use std::collections::HashMap;
use std::sync::Mutex;

/// Target identifiers created for one migrated source query.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedQuery {
    /// Databricks query id.
    pub query_id: String,
    /// Source visualization id -> Databricks visualization id.
    pub viz_ids: HashMap<i64, String>,
}

/// Cache of already-migrated queries, keyed by Redash query id.
#[derive(Debug, Default)]
pub struct IdentityCache {
    entries: Mutex<HashMap<i64, CachedQuery>>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up whether this query has already been migrated in this run.
    pub fn read(&self, source_id: i64) -> Option<CachedQuery> {
        self.entries
            .lock()
            .expect("identity cache lock poisoned")
            .get(&source_id)
            .cloned()
    }

    /// Record the target ids created for a source query.
    pub fn write(&self, source_id: i64, created: CachedQuery) {
        self.entries
            .lock()
            .expect("identity cache lock poisoned")
            .insert(source_id, created);
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .expect("identity cache lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_miss_then_hit() {
        let cache = IdentityCache::new();
        assert!(cache.read(42).is_none());

        let entry = CachedQuery {
            query_id: "dbx-42".to_string(),
            viz_ids: HashMap::from([(7, "viz-7".to_string())]),
        };
        cache.write(42, entry.clone());

        assert_eq!(cache.read(42), Some(entry));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_write_overwrites() {
        let cache = IdentityCache::new();
        cache.write(
            1,
            CachedQuery {
                query_id: "a".to_string(),
                viz_ids: HashMap::new(),
            },
        );
        cache.write(
            1,
            CachedQuery {
                query_id: "b".to_string(),
                viz_ids: HashMap::new(),
            },
        );
        assert_eq!(cache.read(1).unwrap().query_id, "b");
        assert_eq!(cache.len(), 1);
    }
}
