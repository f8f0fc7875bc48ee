//! Active rental window: which media a user can currently watch through the
//! open rentals of the other members of their family.
//!
//! The rule itself lives in [`active_window`], a pure function. Strategies only
//! differ in how they resolve family members and sessions, so every strategy
//! produces the same result for the same data.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use shared::{FamilyOverviewEntry, MediaType, SharedMedia, WindowStrategy};
use std::collections::BTreeMap;

use crate::{document::DocumentStore, error::AppResult, relational::RelationalStore};

mod embedded;
mod joined;
mod referenced;

pub use embedded::EmbeddedResolver;
pub use joined::JoinedResolver;
pub use referenced::ReferencedResolver;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyMember {
    pub user_id: i64,
    pub user_name: String,
}

/// One rental as the window rule sees it
#[derive(Debug, Clone, PartialEq)]
pub struct RentalRecord {
    pub renter_id: i64,
    pub media_id: i64,
    pub media_name: String,
    pub media_type: MediaType,
    pub date_of_rent: DateTime<Utc>,
    pub duration_hours: i64,
}

impl RentalRecord {
    /// `None` when the end overflows the calendar; such a rental never ends
    pub fn rental_end(&self) -> Option<DateTime<Utc>> {
        Duration::try_hours(self.duration_hours)
            .and_then(|d| self.date_of_rent.checked_add_signed(d))
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.rental_end().map_or(true, |end| end > now)
    }
}

#[async_trait]
pub trait FamilyMemberResolver: Send + Sync {
    /// Members of the user's family other than the user. Empty when the user
    /// does not exist or has no family.
    async fn other_members(&self, user_id: i64) -> AppResult<Vec<FamilyMember>>;

    /// Every user, ordered by id
    async fn all_users(&self) -> AppResult<Vec<FamilyMember>>;
}

#[async_trait]
pub trait RentalSessionResolver: Send + Sync {
    /// Every session rented by any of `user_ids`, ordered by session id
    async fn sessions_of(&self, user_ids: &[i64]) -> AppResult<Vec<RentalRecord>>;
}

/// Sessions of `members` still running at `now`, one entry per session.
/// A rental ending exactly at `now` is over.
pub fn active_window(
    members: &[FamilyMember],
    sessions: &[RentalRecord],
    now: DateTime<Utc>,
) -> Vec<SharedMedia> {
    let names: BTreeMap<i64, &str> = members
        .iter()
        .map(|m| (m.user_id, m.user_name.as_str()))
        .collect();

    sessions
        .iter()
        .filter(|s| s.is_active_at(now))
        .filter_map(|s| {
            names.get(&s.renter_id).map(|name| SharedMedia {
                family_member: name.to_string(),
                media_id: s.media_id,
                media_name: s.media_name.clone(),
                media_type: s.media_type,
            })
        })
        .collect()
}

/// Resolves members and their sessions through `resolver`, then applies the
/// window rule
pub async fn evaluate<R>(resolver: &R, user_id: i64, now: DateTime<Utc>) -> AppResult<Vec<SharedMedia>>
where
    R: FamilyMemberResolver + RentalSessionResolver + ?Sized,
{
    let members = resolver.other_members(user_id).await?;
    if members.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = members.iter().map(|m| m.user_id).collect();
    let sessions = resolver.sessions_of(&ids).await?;
    Ok(active_window(&members, &sessions, now))
}

/// Evaluates the window against either store with a chosen strategy
pub struct RentalWindowEvaluator<'a> {
    relational: &'a RelationalStore,
    documents: &'a DocumentStore,
}

impl<'a> RentalWindowEvaluator<'a> {
    pub fn new(relational: &'a RelationalStore, documents: &'a DocumentStore) -> Self {
        Self {
            relational,
            documents,
        }
    }

    pub async fn shared_media(
        &self,
        user_id: i64,
        strategy: WindowStrategy,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<SharedMedia>> {
        tracing::debug!("Evaluating rental window for user {} ({:?})", user_id, strategy);
        match strategy {
            WindowStrategy::Joined => evaluate(&JoinedResolver::new(self.relational), user_id, now).await,
            WindowStrategy::Referenced => {
                evaluate(&ReferencedResolver::new(self.documents), user_id, now).await
            }
            WindowStrategy::Embedded => {
                evaluate(&EmbeddedResolver::new(self.documents), user_id, now).await
            }
        }
    }

    /// Window of every user with at least one shared media item, keyed by user id
    pub async fn family_overview(
        &self,
        strategy: WindowStrategy,
        now: DateTime<Utc>,
    ) -> AppResult<BTreeMap<i64, FamilyOverviewEntry>> {
        let users = match strategy {
            WindowStrategy::Joined => JoinedResolver::new(self.relational).all_users().await?,
            WindowStrategy::Referenced => ReferencedResolver::new(self.documents).all_users().await?,
            WindowStrategy::Embedded => EmbeddedResolver::new(self.documents).all_users().await?,
        };

        let mut overview = BTreeMap::new();
        for user in users {
            let available_media = self.shared_media(user.user_id, strategy, now).await?;
            if !available_media.is_empty() {
                overview.insert(
                    user.user_id,
                    FamilyOverviewEntry {
                        user_name: user.user_name,
                        available_media,
                    },
                );
            }
        }
        Ok(overview)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::memory_store;
    use crate::migration::MigrationOrchestrator;
    use crate::relational::fixtures::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 7, 20, 0, 0).unwrap()
    }

    fn member(user_id: i64, name: &str) -> FamilyMember {
        FamilyMember {
            user_id,
            user_name: name.to_string(),
        }
    }

    fn rental(renter_id: i64, media_id: i64, hours_ago: i64, duration_hours: i64) -> RentalRecord {
        RentalRecord {
            renter_id,
            media_id,
            media_name: format!("media-{}", media_id),
            media_type: MediaType::Film,
            date_of_rent: now() - Duration::hours(hours_ago),
            duration_hours,
        }
    }

    #[test]
    fn test_window_boundaries() {
        let members = vec![member(2, "Grisha")];

        let active = active_window(&members, &[rental(2, 1, 1, 2)], now());
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].family_member, "Grisha");

        let mut half_hour_in = rental(2, 1, 0, 2);
        half_hour_in.date_of_rent = now() - Duration::minutes(30);
        assert_eq!(active_window(&members, &[half_hour_in], now()).len(), 1);

        assert!(active_window(&members, &[rental(2, 1, 3, 2)], now()).is_empty());
        // Ends exactly now
        assert!(active_window(&members, &[rental(2, 1, 2, 2)], now()).is_empty());
    }

    #[test]
    fn test_overflowing_end_never_expires() {
        let members = vec![member(2, "Grisha")];
        let endless = rental(2, 1, 1, 3_000_000_000);
        assert_eq!(endless.rental_end(), None);
        assert!(endless.is_active_at(now()));
        assert_eq!(active_window(&members, &[endless], now()).len(), 1);
    }

    #[test]
    fn test_window_keeps_duplicates_and_ignores_non_members() {
        let members = vec![member(2, "Grisha"), member(3, "Dana")];
        let sessions = vec![
            rental(2, 1, 1, 5),
            rental(3, 1, 1, 5),
            rental(2, 1, 0, 5),
            rental(9, 4, 0, 5),
        ];
        let active = active_window(&members, &sessions, now());
        let names: Vec<&str> = active.iter().map(|m| m.family_member.as_str()).collect();
        assert_eq!(names, vec!["Grisha", "Dana", "Grisha"]);
        assert!(active.iter().all(|m| m.media_id == 1));
    }

    /// Family with Zhami and Grisha, Dana alone in a second family, Solo
    /// without a family. Grisha holds an active film and an expired series.
    async fn seeded() -> RelationalStore {
        let store = store().await;
        let fans = family(&store, "Movie Fans").await;
        let night = family(&store, "Night Owls").await;
        let zhami = user(&store, "Zhami", Some(fans.family_id)).await;
        let grisha = user(&store, "Grisha", Some(fans.family_id)).await;
        let dana = user(&store, "Dana", Some(night.family_id)).await;
        let solo = user(&store, "Solo", None).await;

        let inception = media(&store, "Inception", 5).await;
        store.insert_film(inception.media_id, 148, 1).await.unwrap();
        let bb = media(&store, "Breaking Bad", 3).await;
        store.insert_series(bb.media_id, 62, false).await.unwrap();
        let untyped = media(&store, "Untyped", 1).await;

        let hours_ago = |h: i64| now() - Duration::hours(h);
        session(&store, grisha.user_id, inception.media_id, hours_ago(1), 2).await;
        session(&store, grisha.user_id, bb.media_id, hours_ago(30), 24).await;
        session(&store, zhami.user_id, untyped.media_id, hours_ago(2), 2).await;
        session(&store, dana.user_id, bb.media_id, hours_ago(1), 48).await;
        session(&store, solo.user_id, inception.media_id, hours_ago(1), 48).await;
        store
    }

    #[tokio::test]
    async fn test_member_sees_other_members_active_rentals() {
        let relational = seeded().await;
        let documents = memory_store().await;
        let evaluator = RentalWindowEvaluator::new(&relational, &documents);

        let zhami = evaluator
            .shared_media(1, WindowStrategy::Joined, now())
            .await
            .unwrap();
        assert_eq!(
            zhami,
            vec![SharedMedia {
                family_member: "Grisha".to_string(),
                media_id: 1,
                media_name: "Inception".to_string(),
                media_type: MediaType::Film,
            }]
        );

        // Zhami's own rental ended exactly now
        let grisha = evaluator
            .shared_media(2, WindowStrategy::Joined, now())
            .await
            .unwrap();
        assert!(grisha.is_empty());

        for user_id in [3, 4, 404] {
            let result = evaluator
                .shared_media(user_id, WindowStrategy::Joined, now())
                .await
                .unwrap();
            assert!(result.is_empty(), "user {}", user_id);
        }
    }

    #[tokio::test]
    async fn test_strategies_agree() {
        let relational = seeded().await;
        // A rental still running for a second family member
        let extra = user(&relational, "Aru", Some(1)).await;
        session(&relational, extra.user_id, 2, now() - Duration::hours(5), 6).await;
        session(&relational, extra.user_id, 2, now() - Duration::hours(1), 6).await;

        let documents = memory_store().await;
        MigrationOrchestrator::new(&relational, &documents)
            .run()
            .await
            .unwrap();
        let evaluator = RentalWindowEvaluator::new(&relational, &documents);

        for user_id in 1..=6 {
            let mut results = Vec::new();
            for strategy in WindowStrategy::ALL {
                let mut media = evaluator.shared_media(user_id, strategy, now()).await.unwrap();
                media.sort_by(|a, b| {
                    (&a.family_member, a.media_id).cmp(&(&b.family_member, b.media_id))
                });
                results.push(media);
            }
            assert_eq!(results[0], results[1], "user {}", user_id);
            assert_eq!(results[0], results[2], "user {}", user_id);
        }

        let zhami = evaluator
            .shared_media(1, WindowStrategy::Embedded, now())
            .await
            .unwrap();
        assert_eq!(zhami.len(), 3);
        assert_eq!(zhami.iter().filter(|m| m.family_member == "Aru").count(), 2);
    }

    #[tokio::test]
    async fn test_huge_duration_row_is_active_under_every_strategy() {
        let relational = seeded().await;
        session(&relational, 2, 2, now() - Duration::hours(1), 3_000_000_000).await;

        let documents = memory_store().await;
        MigrationOrchestrator::new(&relational, &documents)
            .run()
            .await
            .unwrap();
        let evaluator = RentalWindowEvaluator::new(&relational, &documents);

        for strategy in WindowStrategy::ALL {
            let zhami = evaluator.shared_media(1, strategy, now()).await.unwrap();
            assert_eq!(zhami.len(), 2, "{:?}", strategy);
            assert!(zhami.iter().any(|m| m.media_name == "Breaking Bad"));
        }
    }

    #[tokio::test]
    async fn test_family_overview() {
        let relational = seeded().await;
        let documents = memory_store().await;
        MigrationOrchestrator::new(&relational, &documents)
            .run()
            .await
            .unwrap();
        let evaluator = RentalWindowEvaluator::new(&relational, &documents);

        for strategy in WindowStrategy::ALL {
            let overview = evaluator.family_overview(strategy, now()).await.unwrap();
            assert_eq!(overview.len(), 1, "{:?}", strategy);
            assert_eq!(overview[&1].user_name, "Zhami");
            assert_eq!(overview[&1].available_media[0].media_name, "Inception");
        }
    }
}
