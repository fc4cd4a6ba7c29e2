//! Recommendation result types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::listing_document::ListingDocument;

/// Why a listing was recommended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum RecommendationReason {
    /// Bought by buyers of the source listing.
    CoPurchase,
    /// Sold by the seller of the source listing.
    SameSeller,
    /// Shares a sport tag with the source listing.
    SameSport,
    /// Similar taxonomy or category.
    SimilarContent,
}

impl RecommendationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationReason::CoPurchase => "co-purchase",
            RecommendationReason::SameSeller => "same-seller",
            RecommendationReason::SameSport => "same-sport",
            RecommendationReason::SimilarContent => "similar-content",
        }
    }
}

/// A related listing.
///
/// `similarity_score` is internal to the stage that produced the entry and
/// is not comparable across reasons.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationResult {
    pub id: Uuid,
    pub title: String,
    pub sports: Vec<String>,
    pub levels: Vec<String>,
    pub price_cents: u64,
    pub rating: f64,
    pub purchase_count: u64,
    pub similarity_score: f64,
    pub reason: RecommendationReason,
}

impl RecommendationResult {
    pub fn from_document(
        doc: &ListingDocument,
        similarity_score: f64,
        reason: RecommendationReason,
    ) -> Self {
        Self {
            id: doc.id,
            title: doc.title.clone(),
            sports: doc.sports.clone(),
            levels: doc.levels.clone(),
            price_cents: doc.price_cents,
            rating: doc.rating,
            purchase_count: doc.purchase_count,
            similarity_score,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_serialization() {
        let json = serde_json::to_string(&RecommendationReason::CoPurchase).unwrap();
        assert_eq!(json, "\"co-purchase\"");
        assert_eq!(
            RecommendationReason::SimilarContent.as_str(),
            "similar-content"
        );
    }
}
