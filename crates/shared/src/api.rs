use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::documents::{MediaDocument, MediaType, SessionDocument, UserDocument};

// ============================================================================
// Migration
// ============================================================================

/// Per-entity document counts produced by one migration run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationSummary {
    pub families: u64,
    pub users: u64,
    pub media: u64,
    pub sessions: u64,
    pub watch_history: u64,
}

impl MigrationSummary {
    pub fn total(&self) -> u64 {
        self.families + self.users + self.media + self.sessions + self.watch_history
    }
}

// ============================================================================
// Family shared media
// ============================================================================

/// Media a family member currently holds through an active rental
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedMedia {
    pub family_member: String,
    pub media_id: i64,
    pub media_name: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
}

/// One user's entry in the family overview report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyOverviewEntry {
    pub user_name: String,
    pub available_media: Vec<SharedMedia>,
}

/// Data-access strategy used to evaluate the active rental window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowStrategy {
    /// Relational join over normalized rows
    Joined,
    /// Documents linked by id fields
    Referenced,
    /// Family members embedded in the family document
    Embedded,
}

impl WindowStrategy {
    pub const ALL: [WindowStrategy; 3] = [
        WindowStrategy::Joined,
        WindowStrategy::Referenced,
        WindowStrategy::Embedded,
    ];
}

/// Response of the per-user family media query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyMediaResponse {
    pub user_id: i64,
    pub strategy: WindowStrategy,
    pub available_media: Vec<SharedMedia>,
}

// ============================================================================
// Rentals
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentRequest {
    pub user_id: i64,
    pub media_id: i64,
    pub duration_hours: i64,
}

/// A rental as recorded by whichever store was live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalReceipt {
    pub store: LiveStore,
    pub session_id: i64,
    pub user_id: i64,
    pub media_id: i64,
    pub date_of_rent: DateTime<Utc>,
    pub duration_hours: i64,
    pub cost: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchRequest {
    pub user_id: i64,
    pub media_id: i64,
    #[serde(default)]
    pub family_watch: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchReceipt {
    pub store: LiveStore,
    pub watch_history_id: i64,
    pub user_id: i64,
    pub media_id: i64,
    pub date_of_watch: DateTime<Utc>,
    pub family_watch: bool,
}

// ============================================================================
// Listings
// ============================================================================

/// Rows read from whichever store is live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing<T> {
    pub store: LiveStore,
    pub items: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserListing {
    pub user_id: i64,
    pub user_name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaListing {
    pub media_id: i64,
    pub media_name: String,
    pub genre: String,
    pub prod_year: i64,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub cost_per_day: i64,
}

/// One past or running rental of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalHistoryEntry {
    pub session_id: i64,
    pub media_id: i64,
    pub media_name: String,
    pub cost: i64,
    pub duration_hours: i64,
    pub date_of_rent: DateTime<Utc>,
}

impl From<&UserDocument> for UserListing {
    fn from(user: &UserDocument) -> Self {
        Self {
            user_id: user.user_id,
            user_name: user.user_name.clone(),
            email: user.email.clone(),
        }
    }
}

impl From<&MediaDocument> for MediaListing {
    fn from(media: &MediaDocument) -> Self {
        Self {
            media_id: media.media_id,
            media_name: media.media_name.clone(),
            genre: media.genre.clone(),
            prod_year: media.prod_year,
            media_type: media.media_type,
            cost_per_day: media.cost_per_day,
        }
    }
}

/// Uses the media name frozen into the session
impl From<&SessionDocument> for RentalHistoryEntry {
    fn from(session: &SessionDocument) -> Self {
        Self {
            session_id: session.session_id,
            media_id: session.media.media_id,
            media_name: session.media.media_name.clone(),
            cost: session.cost,
            duration_hours: session.duration,
            date_of_rent: session.date_of_rent,
        }
    }
}

// ============================================================================
// Store status
// ============================================================================

/// Which store currently serves reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveStore {
    #[default]
    Relational,
    Document,
}

impl LiveStore {
    pub fn default_strategy(&self) -> WindowStrategy {
        match self {
            LiveStore::Relational => WindowStrategy::Joined,
            LiveStore::Document => WindowStrategy::Embedded,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsResponse {
    pub live_store: LiveStore,
    pub relational: BTreeMap<String, u64>,
    pub documents: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchResponse {
    pub live_store: LiveStore,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrated: Option<MigrationSummary>,
}

/// Body of every error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_summary_serialization() {
        let summary = MigrationSummary {
            families: 2,
            users: 5,
            media: 8,
            sessions: 3,
            watch_history: 1,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["families"], 2);
        assert_eq!(json["watch_history"], 1);
        assert_eq!(summary.total(), 19);
    }

    #[test]
    fn test_shared_media_serialization() {
        let item = SharedMedia {
            family_member: "Zhami".to_string(),
            media_id: 4,
            media_name: "Inception".to_string(),
            media_type: MediaType::Film,
        };
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("\"type\":\"film\""));
        assert!(json.contains("\"family_member\":\"Zhami\""));
    }

    #[test]
    fn test_window_strategy_serialization() {
        let strategy: WindowStrategy = serde_json::from_str("\"referenced\"").unwrap();
        assert_eq!(strategy, WindowStrategy::Referenced);
        assert_eq!(
            serde_json::to_string(&WindowStrategy::Joined).unwrap(),
            "\"joined\""
        );
    }

    #[test]
    fn test_live_store_default_strategy() {
        assert_eq!(LiveStore::default(), LiveStore::Relational);
        assert_eq!(LiveStore::Relational.default_strategy(), WindowStrategy::Joined);
        assert_eq!(LiveStore::Document.default_strategy(), WindowStrategy::Embedded);
    }

    #[test]
    fn test_watch_request_defaults_to_solo_watch() {
        let req: WatchRequest = serde_json::from_str(r#"{"user_id":1,"media_id":2}"#).unwrap();
        assert!(!req.family_watch);
    }

    #[test]
    fn test_media_listing_uses_type_field() {
        let listing: Listing<MediaListing> = serde_json::from_str(
            r#"{"store":"document","items":[{"media_id":2,"media_name":"Breaking Bad","genre":"Crime","prod_year":2008,"type":"series","cost_per_day":3}]}"#,
        )
        .unwrap();
        assert_eq!(listing.store, LiveStore::Document);
        assert_eq!(listing.items[0].media_type, MediaType::Series);
    }

    #[test]
    fn test_switch_response_omits_empty_summary() {
        let response = SwitchResponse {
            live_store: LiveStore::Relational,
            migrated: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"live_store":"relational"}"#);
    }
}
