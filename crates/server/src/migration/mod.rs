//! Relational to document migration.
//!
//! A run wipes the document store, then migrates one collection at a time in
//! dependency order. Each collection is mapped in memory first and written as
//! a single batch, so a bad row leaves that collection empty while the
//! collections migrated before it stay in place.

use serde::Serialize;
use shared::{FamilyDocument, MediaDocument, MigrationSummary, UserDocument};
use std::collections::{BTreeMap, HashMap};

use crate::{
    document::{Collection, DocumentStore},
    error::{AppError, AppResult},
    relational::RelationalReader,
    reset::ResetCoordinator,
};

pub mod mapper;

use mapper::{MediaDetails, SnapshotIndex, UserLookups};

/// Collections a collection's documents are built from
fn dependencies(collection: Collection) -> &'static [Collection] {
    match collection {
        Collection::Families => &[],
        Collection::Users => &[Collection::Families],
        Collection::Media => &[],
        Collection::Sessions | Collection::WatchHistory => {
            &[Collection::Users, Collection::Media]
        }
    }
}

/// Progress of one migration run. Steps may be driven individually; each
/// step checks that everything it depends on already completed.
pub struct Migration<'a> {
    reader: &'a dyn RelationalReader,
    documents: &'a DocumentStore,
    users: HashMap<i64, UserDocument>,
    media: HashMap<i64, MediaDocument>,
    families: Vec<FamilyDocument>,
    completed: BTreeMap<Collection, u64>,
}

impl<'a> Migration<'a> {
    pub fn new(reader: &'a dyn RelationalReader, documents: &'a DocumentStore) -> Self {
        Self {
            reader,
            documents,
            users: HashMap::new(),
            media: HashMap::new(),
            families: Vec::new(),
            completed: BTreeMap::new(),
        }
    }

    pub fn is_completed(&self, collection: Collection) -> bool {
        self.completed.contains_key(&collection)
    }

    fn check_ready(&self, collection: Collection) -> AppResult<()> {
        if self.is_completed(collection) {
            return Err(AppError::validation(format!(
                "{} already migrated in this run",
                collection.name()
            )));
        }
        for dependency in dependencies(collection) {
            if !self.is_completed(*dependency) {
                return Err(AppError::MigrationOrder {
                    entity: collection.name(),
                    requires: dependency.name(),
                });
            }
        }
        Ok(())
    }

    /// Migrates one collection and returns the number of documents written
    pub async fn migrate(&mut self, collection: Collection) -> AppResult<u64> {
        self.check_ready(collection)?;

        let count = match collection {
            Collection::Families => self.migrate_families().await?,
            Collection::Users => self.migrate_users().await?,
            Collection::Media => self.migrate_media().await?,
            Collection::Sessions => self.migrate_sessions().await?,
            Collection::WatchHistory => self.migrate_watch_history().await?,
        };

        self.completed.insert(collection, count);
        tracing::info!("Migrated {} {} documents", count, collection.name());
        Ok(count)
    }

    pub fn summary(&self) -> MigrationSummary {
        let count = |c: Collection| self.completed.get(&c).copied().unwrap_or(0);
        MigrationSummary {
            families: count(Collection::Families),
            users: count(Collection::Users),
            media: count(Collection::Media),
            sessions: count(Collection::Sessions),
            watch_history: count(Collection::WatchHistory),
        }
    }

    /// Writes the batch and moves the collection's sequence past its largest id
    async fn persist<T: Serialize>(
        &self,
        collection: Collection,
        docs: &[T],
        id_of: impl Fn(&T) -> i64,
    ) -> AppResult<u64> {
        let written = self.documents.insert_many(collection, docs).await?;
        if let Some(max_id) = docs.iter().map(id_of).max() {
            self.documents
                .sequences()
                .advance_to(collection.id_field(), max_id)
                .await?;
        }
        Ok(written)
    }

    async fn migrate_families(&mut self) -> AppResult<u64> {
        let families = self.reader.families().await?;
        let users = self.reader.users().await?;
        let members = mapper::group_members(&users);

        let docs: Vec<FamilyDocument> = families
            .iter()
            .map(|family| mapper::map_family(family, &members))
            .collect();
        let count = self
            .persist(Collection::Families, &docs, |d| d.family_id)
            .await?;
        self.families = docs;
        Ok(count)
    }

    async fn migrate_users(&mut self) -> AppResult<u64> {
        let users = self.reader.users().await?;
        let devices = self.reader.devices().await?;
        let friendships = self.reader.friendships().await?;
        let lookups = UserLookups::build(&self.families, &users, &devices, &friendships)?;

        let docs = users
            .iter()
            .map(|user| mapper::map_user(user, &lookups))
            .collect::<AppResult<Vec<_>>>()?;
        let count = self.persist(Collection::Users, &docs, |d| d.user_id).await?;
        self.users = docs.into_iter().map(|d| (d.user_id, d)).collect();
        Ok(count)
    }

    async fn migrate_media(&mut self) -> AppResult<u64> {
        let media = self.reader.media().await?;
        let details = MediaDetails::build(&self.reader.films().await?, &self.reader.series().await?);

        let docs = media
            .iter()
            .map(|m| mapper::map_media(m, &details))
            .collect::<AppResult<Vec<_>>>()?;
        let count = self.persist(Collection::Media, &docs, |d| d.media_id).await?;
        self.media = docs.into_iter().map(|d| (d.media_id, d)).collect();
        Ok(count)
    }

    async fn migrate_sessions(&mut self) -> AppResult<u64> {
        let sessions = self.reader.sessions().await?;
        let index = SnapshotIndex::new(&self.users, &self.media);

        let docs = sessions
            .iter()
            .map(|s| mapper::map_session(s, &index))
            .collect::<AppResult<Vec<_>>>()?;
        self.persist(Collection::Sessions, &docs, |d| d.session_id)
            .await
    }

    async fn migrate_watch_history(&mut self) -> AppResult<u64> {
        let entries = self.reader.watch_history().await?;
        let index = SnapshotIndex::new(&self.users, &self.media);

        let docs = entries
            .iter()
            .map(|w| mapper::map_watch_history(w, &index))
            .collect::<AppResult<Vec<_>>>()?;
        self.persist(Collection::WatchHistory, &docs, |d| d.watch_history_id)
            .await
    }
}

/// Full migration: wipe, then every collection in dependency order
pub struct MigrationOrchestrator<'a> {
    reader: &'a dyn RelationalReader,
    documents: &'a DocumentStore,
}

impl<'a> MigrationOrchestrator<'a> {
    pub const ORDER: [Collection; 5] = [
        Collection::Families,
        Collection::Users,
        Collection::Media,
        Collection::Sessions,
        Collection::WatchHistory,
    ];

    pub fn new(reader: &'a dyn RelationalReader, documents: &'a DocumentStore) -> Self {
        Self { reader, documents }
    }

    pub async fn run(&self) -> AppResult<MigrationSummary> {
        tracing::info!("Starting migration to the document store");
        ResetCoordinator::reset_documents(self.documents).await?;

        let mut migration = Migration::new(self.reader, self.documents);
        for collection in Self::ORDER {
            if let Err(e) = migration.migrate(collection).await {
                tracing::error!(
                    "Migration stopped at {}: {} (document store left partial)",
                    collection.name(),
                    e
                );
                return Err(e);
            }
        }

        let summary = migration.summary();
        tracing::info!("Migration finished: {} documents", summary.total());
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{memory_store, DocumentRentals, Filter};
    use crate::relational::fixtures::*;
    use crate::relational::{
        Device, Family, Film, Friendship, Media, NewDevice, NewWatchHistory, RelationalStore,
        Series, Session, User, WatchHistory,
    };
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use shared::{DeviceEntry, MediaType, SessionDocument, TypeDetails, WatchHistoryDocument};

    /// Reader over in-memory rows, for source states the relational schema
    /// would refuse to store
    #[derive(Default)]
    struct FixtureReader {
        families: Vec<Family>,
        users: Vec<User>,
        media: Vec<Media>,
        sessions: Vec<Session>,
    }

    #[async_trait]
    impl RelationalReader for FixtureReader {
        async fn families(&self) -> AppResult<Vec<Family>> {
            Ok(self.families.clone())
        }
        async fn users(&self) -> AppResult<Vec<User>> {
            Ok(self.users.clone())
        }
        async fn devices(&self) -> AppResult<Vec<Device>> {
            Ok(vec![])
        }
        async fn friendships(&self) -> AppResult<Vec<Friendship>> {
            Ok(vec![])
        }
        async fn media(&self) -> AppResult<Vec<Media>> {
            Ok(self.media.clone())
        }
        async fn films(&self) -> AppResult<Vec<Film>> {
            Ok(vec![])
        }
        async fn series(&self) -> AppResult<Vec<Series>> {
            Ok(vec![])
        }
        async fn sessions(&self) -> AppResult<Vec<Session>> {
            Ok(self.sessions.clone())
        }
        async fn watch_history(&self) -> AppResult<Vec<WatchHistory>> {
            Ok(vec![])
        }
    }

    /// Two families, four users (Zhami with two devices), a film, a series,
    /// an untyped media item and two sessions
    async fn seeded() -> RelationalStore {
        let store = store().await;
        let fans = family(&store, "Movie Fans").await;
        let night = family(&store, "Night Owls").await;
        let zhami = user(&store, "Zhami", Some(fans.family_id)).await;
        let grisha = user(&store, "Grisha", Some(fans.family_id)).await;
        let dana = user(&store, "Dana", Some(night.family_id)).await;
        user(&store, "Solo", None).await;

        store.insert_friendship(zhami.user_id, grisha.user_id).await.unwrap();
        store.insert_friendship(dana.user_id, zhami.user_id).await.unwrap();

        for device_name in ["Living room TV", "Phone"] {
            store
                .insert_device(&NewDevice {
                    device_name: device_name.to_string(),
                    registration_date: date(2025, 2, 1),
                    user_id: zhami.user_id,
                })
                .await
                .unwrap();
        }

        let inception = media(&store, "Inception", 5).await;
        store.insert_film(inception.media_id, 148, 1).await.unwrap();
        let bb = media(&store, "Breaking Bad", 3).await;
        store.insert_series(bb.media_id, 62, false).await.unwrap();
        media(&store, "Untyped", 1).await;

        let at = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        session(&store, grisha.user_id, inception.media_id, at, 2).await;
        session(&store, zhami.user_id, bb.media_id, at, 48).await;
        store
            .insert_watch_history(&NewWatchHistory {
                user_id: zhami.user_id,
                media_id: bb.media_id,
                date_of_watch: at,
                family_watch: true,
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_run_migrates_every_collection() {
        let relational = seeded().await;
        let documents = memory_store().await;

        let summary = MigrationOrchestrator::new(&relational, &documents)
            .run()
            .await
            .unwrap();
        assert_eq!(
            summary,
            MigrationSummary {
                families: 2,
                users: 4,
                media: 3,
                sessions: 2,
                watch_history: 1,
            }
        );

        let untyped: MediaDocument = documents
            .find_by_id(Collection::Media, 3)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(untyped.media_type, MediaType::Unknown);
        assert_eq!(untyped.type_details, TypeDetails::Unknown {});

        let family: FamilyDocument = documents
            .find_by_id(Collection::Families, 1)
            .await
            .unwrap()
            .unwrap();
        let names: Vec<&str> = family.users.iter().map(|u| u.user_name.as_str()).collect();
        assert_eq!(names, vec!["Zhami", "Grisha"]);

        let zhami: UserDocument = documents
            .find_by_id(Collection::Users, 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(zhami.friends, vec![2, 3]);
        assert_eq!(zhami.family_id, Some(1));
        assert_eq!(
            zhami.devices,
            vec![
                DeviceEntry {
                    device_id: 1,
                    device_name: "Living room TV".to_string(),
                },
                DeviceEntry {
                    device_id: 2,
                    device_name: "Phone".to_string(),
                },
            ]
        );

        let grisha: UserDocument = documents
            .find_by_id(Collection::Users, 2)
            .await
            .unwrap()
            .unwrap();
        assert!(grisha.devices.is_empty());

        let watch: WatchHistoryDocument = documents
            .find_by_id(Collection::WatchHistory, 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(watch.media.media_type, MediaType::Series);
        assert_eq!(watch.user.family_id, Some(1));
    }

    #[tokio::test]
    async fn test_run_is_idempotent() {
        let relational = seeded().await;
        let documents = memory_store().await;
        let orchestrator = MigrationOrchestrator::new(&relational, &documents);

        let first = orchestrator.run().await.unwrap();
        let stats = documents.stats().await.unwrap();
        let second = orchestrator.run().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(documents.stats().await.unwrap(), stats);
        assert_eq!(
            documents.sequences().current("session_id").await.unwrap(),
            Some(2)
        );
    }

    #[tokio::test]
    async fn test_session_before_users_is_an_order_error() {
        let relational = seeded().await;
        let documents = memory_store().await;
        let mut migration = Migration::new(&relational, &documents);

        let err = migration.migrate(Collection::Sessions).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::MigrationOrder { entity: "sessions", requires: "users" }
        ));

        let err = migration.migrate(Collection::Users).await.unwrap_err();
        assert_eq!(err.code(), "MIGRATION_ORDER_ERROR");

        migration.migrate(Collection::Families).await.unwrap();
        migration.migrate(Collection::Users).await.unwrap();
        let err = migration.migrate(Collection::Sessions).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::MigrationOrder { entity: "sessions", requires: "media" }
        ));
        assert_eq!(documents.count(Collection::Sessions).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bad_row_leaves_partial_state() {
        let date = date(2025, 1, 1);
        let reader = FixtureReader {
            families: vec![],
            users: vec![User {
                user_id: 1,
                user_name: "Zhami".to_string(),
                email: "zhami@example.com".to_string(),
                birthday: date,
                location: "Almaty".to_string(),
                bio: String::new(),
                family_id: None,
            }],
            media: vec![Media {
                media_id: 4,
                media_name: "Inception".to_string(),
                genre: "Sci-Fi".to_string(),
                prod_year: 2010,
                descr: String::new(),
                location: "USA".to_string(),
                cost_per_day: 5,
            }],
            sessions: vec![Session {
                session_id: 1,
                user_id: 1,
                media_id: 99,
                date_of_rent: Utc::now(),
                cost: 5,
                duration: 2,
            }],
        };
        let documents = memory_store().await;

        let err = MigrationOrchestrator::new(&reader, &documents)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { resource: "media", id: 99 }));

        let stats = documents.stats().await.unwrap();
        assert_eq!(stats["users"], 1);
        assert_eq!(stats["media"], 1);
        assert_eq!(stats["sessions"], 0);
        assert_eq!(stats["watch_history"], 0);
    }

    #[tokio::test]
    async fn test_snapshots_are_frozen_until_next_run() {
        let relational = seeded().await;
        let documents = memory_store().await;
        let orchestrator = MigrationOrchestrator::new(&relational, &documents);
        orchestrator.run().await.unwrap();

        let mut grisha = relational.get_user(2).await.unwrap().unwrap();
        grisha.user_name = "Grigory".to_string();
        relational.update_user(&grisha).await.unwrap();
        let mut inception = relational.get_media(1).await.unwrap().unwrap();
        inception.media_name = "Inception (Director's Cut)".to_string();
        inception.cost_per_day = 7;
        relational.update_media(&inception).await.unwrap();

        let sessions: Vec<SessionDocument> = documents
            .find(Collection::Sessions, &[Filter::eq("user.user_id", 2_i64)])
            .await
            .unwrap();
        assert_eq!(sessions[0].user.user_name, "Grisha");
        assert_eq!(sessions[0].media.media_name, "Inception");
        assert_eq!(sessions[0].media.cost_per_day, 5);

        orchestrator.run().await.unwrap();
        let sessions: Vec<SessionDocument> = documents
            .find(Collection::Sessions, &[Filter::eq("user.user_id", 2_i64)])
            .await
            .unwrap();
        assert_eq!(sessions[0].user.user_name, "Grigory");
        assert_eq!(sessions[0].media.media_name, "Inception (Director's Cut)");
        assert_eq!(sessions[0].media.cost_per_day, 7);

        inception.media_id = 404;
        let err = relational.update_media(&inception).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { resource: "media", id: 404 }));
    }

    #[tokio::test]
    async fn test_document_rental_after_migration_continues_ids() {
        let relational = seeded().await;
        // Leave a gap in the relational session ids
        let extra = session(&relational, 1, 1, Utc::now(), 1).await;
        sqlx::query("DELETE FROM Sessions WHERE session_id = 2")
            .execute(relational.pool())
            .await
            .unwrap();

        let documents = memory_store().await;
        MigrationOrchestrator::new(&relational, &documents)
            .run()
            .await
            .unwrap();

        let session = DocumentRentals::new(&documents)
            .rent_media(1, 2, 5, Utc::now())
            .await
            .unwrap();
        assert_eq!(session.session_id, extra.session_id + 1);
        assert_eq!(session.media.media_type, MediaType::Series);
    }
}
