//! Listing document types for the search index.
//!
//! This module defines the denormalized projection of a catalog listing that
//! is pushed to every search backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Upper bound of the rating scale.
pub const MAX_RATING: f64 = 5.0;

/// Moderation/lifecycle status of a catalog listing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    /// Visible and purchasable.
    #[default]
    Active,
    /// Created by the seller but never published.
    Draft,
    /// Hidden by moderation.
    Suspended,
    /// Withdrawn by the seller.
    Archived,
}

impl ListingStatus {
    /// Returns the storage representation used by the catalog.
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Draft => "draft",
            ListingStatus::Suspended => "suspended",
            ListingStatus::Archived => "archived",
        }
    }

    /// Parse a catalog status column. Unknown values are treated as `Draft`
    /// so that they never become searchable by accident.
    pub fn from_db(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" | "published" => ListingStatus::Active,
            "suspended" => ListingStatus::Suspended,
            "archived" | "deleted" => ListingStatus::Archived,
            _ => ListingStatus::Draft,
        }
    }
}

/// Document representation of a listing in the search index.
///
/// Documents are derived from catalog rows and are never owned by the search
/// layer: they are rebuilt whenever a listing is created, edited or changes
/// status.
///
/// # Fields
///
/// - `id`: Unique identifier of the listing (catalog resource id)
/// - `title` / `description`: Primary and secondary full-text fields
/// - `tags`: Free-text tags
/// - `sports` / `levels`: Taxonomy tags used for filtering and similarity
/// - `price_cents`: Price in minor currency units
/// - `rating`: Average rating, always within `[0, 5]`, also when deserialized
/// - `is_listed` / `status`: Visibility flags; see [`ListingDocument::is_searchable`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingDocument {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub sports: Vec<String>,
    #[serde(default)]
    pub levels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    pub price_cents: u64,
    #[serde(deserialize_with = "deserialize_rating")]
    pub rating: f64,
    pub purchase_count: u64,
    pub view_count: u64,
    pub is_listed: bool,
    #[serde(default)]
    pub status: ListingStatus,
    pub seller_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller_name: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub indexed_at: DateTime<Utc>,
}

fn deserialize_rating<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    f64::deserialize(deserializer).map(ListingDocument::clamp_rating)
}

impl ListingDocument {
    /// Create a new listed, active document with zeroed counters.
    ///
    /// # Example
    ///
    /// ```
    /// use listing_search_shared::ListingDocument;
    /// use uuid::Uuid;
    ///
    /// let doc = ListingDocument::new(Uuid::new_v4(), Uuid::new_v4(), "Zone defense drills", 1299);
    /// assert!(doc.is_searchable());
    /// ```
    pub fn new(id: Uuid, seller_id: Uuid, title: impl Into<String>, price_cents: u64) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: title.into(),
            description: String::new(),
            tags: Vec::new(),
            sports: Vec::new(),
            levels: Vec::new(),
            category: None,
            file_type: None,
            price_cents,
            rating: 0.0,
            purchase_count: 0,
            view_count: 0,
            is_listed: true,
            status: ListingStatus::Active,
            seller_id,
            seller_name: None,
            uploaded_at: now,
            indexed_at: now,
        }
    }

    /// Only listed documents with an active status are visible to search.
    pub fn is_searchable(&self) -> bool {
        self.is_listed && self.status == ListingStatus::Active
    }

    /// Clamp a raw rating into `[0, 5]`. NaN maps to zero.
    pub fn clamp_rating(rating: f64) -> f64 {
        if rating.is_nan() {
            0.0
        } else {
            rating.clamp(0.0, MAX_RATING)
        }
    }

    /// Convert a signed catalog price into minor units, flooring negatives at zero.
    pub fn price_from_db(price: i64) -> u64 {
        price.max(0) as u64
    }

    /// Re-apply the document invariants (rating range) after manual edits.
    pub fn normalized(mut self) -> Self {
        self.rating = Self::clamp_rating(self.rating);
        self
    }

    /// The first sport tag, used where a single sport is displayed.
    pub fn primary_sport(&self) -> Option<&str> {
        self.sports.first().map(String::as_str)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_sports(mut self, sports: Vec<String>) -> Self {
        self.sports = sports;
        self
    }

    pub fn with_levels(mut self, levels: Vec<String>) -> Self {
        self.levels = levels;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_file_type(mut self, file_type: impl Into<String>) -> Self {
        self.file_type = Some(file_type.into());
        self
    }

    /// Set the rating, clamped into `[0, 5]`.
    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Self::clamp_rating(rating);
        self
    }

    pub fn with_counters(mut self, purchase_count: u64, view_count: u64) -> Self {
        self.purchase_count = purchase_count;
        self.view_count = view_count;
        self
    }

    pub fn with_seller_name(mut self, seller_name: impl Into<String>) -> Self {
        self.seller_name = Some(seller_name.into());
        self
    }

    pub fn with_uploaded_at(mut self, uploaded_at: DateTime<Utc>) -> Self {
        self.uploaded_at = uploaded_at;
        self
    }

    pub fn with_visibility(mut self, is_listed: bool, status: ListingStatus) -> Self {
        self.is_listed = is_listed;
        self.status = status;
        self
    }
}
