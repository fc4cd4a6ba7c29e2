//! Content similarity between two listings.

use std::collections::HashSet;

use crate::types::listing_document::ListingDocument;

/// Weights of the content similarity score.
///
/// Shared by the recommendation engine and the catalog, which ranks
/// candidates with the same weights before truncating them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentWeights {
    pub same_seller: f64,
    /// Per shared sport tag.
    pub shared_sport: f64,
    /// Per shared level tag.
    pub shared_level: f64,
    pub same_category: f64,
    /// Weight of `ln(1 + purchase_count)`.
    pub popularity: f64,
}

impl Default for ContentWeights {
    fn default() -> Self {
        Self {
            same_seller: 2.0,
            shared_sport: 1.5,
            shared_level: 1.0,
            same_category: 1.0,
            popularity: 0.1,
        }
    }
}

/// Outcome of comparing a candidate with a source listing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentMatch {
    pub score: f64,
    pub same_seller: bool,
}

impl ContentWeights {
    /// Similarity of `candidate` to `source`, or `None` if they share no
    /// seller, sport, level or category. Tags and categories compare
    /// case-insensitively.
    pub fn score(
        &self,
        source: &ListingDocument,
        candidate: &ListingDocument,
    ) -> Option<ContentMatch> {
        let same_seller = candidate.seller_id == source.seller_id;
        let shared_sports = shared_tags(&source.sports, &candidate.sports);
        let shared_levels = shared_tags(&source.levels, &candidate.levels);
        let same_category = match (&source.category, &candidate.category) {
            (Some(a), Some(b)) => a.to_lowercase() == b.to_lowercase(),
            _ => false,
        };

        if !same_seller && shared_sports == 0 && shared_levels == 0 && !same_category {
            return None;
        }

        let mut score = shared_sports as f64 * self.shared_sport
            + shared_levels as f64 * self.shared_level
            + (candidate.purchase_count as f64).ln_1p() * self.popularity;
        if same_seller {
            score += self.same_seller;
        }
        if same_category {
            score += self.same_category;
        }

        Some(ContentMatch { score, same_seller })
    }
}

/// Number of tags present in both lists, compared case-insensitively.
pub fn shared_tags(a: &[String], b: &[String]) -> usize {
    let left: HashSet<String> = a.iter().map(|t| t.to_lowercase()).collect();
    let right: HashSet<String> = b.iter().map(|t| t.to_lowercase()).collect();
    left.intersection(&right).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn listing(seller: Uuid, sports: &[&str], levels: &[&str]) -> ListingDocument {
        ListingDocument::new(Uuid::new_v4(), seller, "Drill", 500)
            .with_sports(sports.iter().map(|s| s.to_string()).collect())
            .with_levels(levels.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_score_adds_every_shared_attribute() {
        let seller = Uuid::new_v4();
        let source = listing(seller, &["Soccer"], &["youth"]).with_category("Drills");
        let candidate = listing(seller, &["soccer", "futsal"], &["YOUTH"])
            .with_category("drills")
            .with_counters(10, 0);

        let matched = ContentWeights::default().score(&source, &candidate).unwrap();
        let expected = 2.0 + 1.5 + 1.0 + 1.0 + 11f64.ln() * 0.1;
        assert!(matched.same_seller);
        assert!((matched.score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_unrelated_listing_has_no_score() {
        let source = listing(Uuid::new_v4(), &["soccer"], &["youth"]);
        let candidate = listing(Uuid::new_v4(), &["golf"], &["pro"]).with_counters(1000, 0);
        assert!(ContentWeights::default().score(&source, &candidate).is_none());
    }

    #[test]
    fn test_popularity_never_outweighs_a_shared_seller() {
        let seller = Uuid::new_v4();
        let source = listing(seller, &["soccer"], &["youth"]);
        let best = listing(seller, &["soccer"], &["youth"]);
        let popular = listing(Uuid::new_v4(), &[], &["youth"]).with_counters(100, 0);

        let weights = ContentWeights::default();
        let best = weights.score(&source, &best).unwrap().score;
        let popular = weights.score(&source, &popular).unwrap().score;
        assert!((best - 4.5).abs() < 1e-9);
        assert!(best > popular);
    }

    #[test]
    fn test_shared_tags_ignore_case() {
        let a = vec!["Soccer".to_string(), "Futsal".to_string()];
        let b = vec!["soccer".to_string(), "tennis".to_string()];
        assert_eq!(shared_tags(&a, &b), 1);
        assert_eq!(shared_tags(&a, &[]), 0);
    }
}
