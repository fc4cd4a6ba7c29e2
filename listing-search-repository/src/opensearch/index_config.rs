//! OpenSearch index configuration and mappings.
//!
//! This module defines the index settings and mappings for the listing search
//! index. Physical indices are versioned (`listings_v0`, `listings_v1`, ...)
//! and every read and write goes through the alias.

use serde_json::{json, Value};

/// Configuration for the search index.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// The alias name for the search index (used for all operations).
    pub alias: String,
    /// The version of the physical index created on first start.
    pub version: u32,
}

impl IndexConfig {
    /// Create a new index configuration.
    ///
    /// # Arguments
    ///
    /// * `alias` - The index alias name
    /// * `version` - The initial version number
    pub fn new(alias: impl Into<String>, version: u32) -> Self {
        Self {
            alias: alias.into(),
            version,
        }
    }

    /// Get the versioned index name behind the alias (e.g., "listings_v3").
    pub fn versioned_index_name(&self, version: u32) -> String {
        format!("{}_v{}", self.alias, version)
    }

    /// Parse the version out of a physical index name created by
    /// [`IndexConfig::versioned_index_name`].
    pub fn parse_version(&self, index_name: &str) -> Option<u32> {
        index_name
            .strip_prefix(self.alias.as_str())?
            .strip_prefix("_v")?
            .parse()
            .ok()
    }

    /// Version for the next full rebuild, given the indices the alias
    /// currently points to.
    pub fn next_version<'a>(&self, current: impl IntoIterator<Item = &'a String>) -> u32 {
        current
            .into_iter()
            .filter_map(|name| self.parse_version(name))
            .max()
            .map(|v| v.saturating_add(1))
            .unwrap_or(self.version)
    }
}

/// Get the index settings and mappings for the listing search index.
///
/// The configuration includes:
/// - **text** fields for title, description and tags, each with a keyword
///   sub-field
/// - **keyword** taxonomy fields with a lowercase normalizer, so filters and
///   facets ignore case
/// - numeric and date fields for range filters and sorting
pub fn get_index_settings() -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1,
            "analysis": {
                "normalizer": {
                    "lowercase_normalizer": {
                        "type": "custom",
                        "filter": ["lowercase"]
                    }
                }
            }
        },
        "mappings": {
            "properties": {
                "id": { "type": "keyword" },
                "title": {
                    "type": "text",
                    "fields": { "raw": { "type": "keyword" } }
                },
                "description": { "type": "text" },
                "tags": {
                    "type": "text",
                    "fields": {
                        "keyword": { "type": "keyword", "normalizer": "lowercase_normalizer" }
                    }
                },
                "sports": { "type": "keyword", "normalizer": "lowercase_normalizer" },
                "levels": { "type": "keyword", "normalizer": "lowercase_normalizer" },
                "category": { "type": "keyword", "normalizer": "lowercase_normalizer" },
                "file_type": { "type": "keyword", "normalizer": "lowercase_normalizer" },
                "price_cents": { "type": "long" },
                "rating": { "type": "float" },
                "purchase_count": { "type": "long" },
                "view_count": { "type": "long" },
                "is_listed": { "type": "boolean" },
                "status": { "type": "keyword" },
                "seller_id": { "type": "keyword" },
                "seller_name": { "type": "keyword", "index": false },
                "uploaded_at": { "type": "date" },
                "indexed_at": { "type": "date" }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_settings_structure() {
        let settings = get_index_settings();
        let properties = &settings["mappings"]["properties"];

        assert!(settings["settings"]["number_of_shards"].is_number());
        assert_eq!(properties["title"]["type"], "text");
        assert_eq!(properties["sports"]["type"], "keyword");
        assert_eq!(properties["sports"]["normalizer"], "lowercase_normalizer");
        assert_eq!(properties["tags"]["fields"]["keyword"]["type"], "keyword");
        assert_eq!(properties["uploaded_at"]["type"], "date");
        assert_eq!(properties["is_listed"]["type"], "boolean");
        assert!(settings["settings"]["analysis"]["normalizer"]["lowercase_normalizer"].is_object());
    }

    #[test]
    fn test_versioned_index_name() {
        let config = IndexConfig::new("listings", 0);
        assert_eq!(config.versioned_index_name(0), "listings_v0");
        assert_eq!(config.versioned_index_name(42), "listings_v42");
    }

    #[test]
    fn test_parse_version() {
        let config = IndexConfig::new("listings", 0);
        assert_eq!(config.parse_version("listings_v7"), Some(7));
        assert_eq!(config.parse_version("listings"), None);
        assert_eq!(config.parse_version("other_v1"), None);
        assert_eq!(config.parse_version("listings_vx"), None);
    }

    #[test]
    fn test_next_version() {
        let config = IndexConfig::new("listings", 3);
        assert_eq!(config.next_version(&Vec::<String>::new()), 3);

        let current = vec!["listings_v4".to_string(), "listings_v9".to_string()];
        assert_eq!(config.next_version(&current), 10);

        let foreign = vec!["legacy-index".to_string()];
        assert_eq!(config.next_version(&foreign), 3);
    }
}
