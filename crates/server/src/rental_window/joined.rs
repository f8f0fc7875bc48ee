use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::MediaType;
use sqlx::{FromRow, QueryBuilder, Sqlite};

use super::{FamilyMember, FamilyMemberResolver, RentalRecord, RentalSessionResolver};
use crate::{error::AppResult, relational::RelationalStore};

/// Resolution through joins over the normalized tables
pub struct JoinedResolver<'a> {
    store: &'a RelationalStore,
}

impl<'a> JoinedResolver<'a> {
    pub fn new(store: &'a RelationalStore) -> Self {
        Self { store }
    }
}

#[derive(FromRow)]
struct MemberRow {
    user_id: i64,
    user_name: String,
}

impl From<MemberRow> for FamilyMember {
    fn from(row: MemberRow) -> Self {
        FamilyMember {
            user_id: row.user_id,
            user_name: row.user_name,
        }
    }
}

#[derive(FromRow)]
struct RentalRow {
    renter_id: i64,
    media_id: i64,
    media_name: String,
    media_type: String,
    date_of_rent: DateTime<Utc>,
    duration_hours: i64,
}

impl From<RentalRow> for RentalRecord {
    fn from(row: RentalRow) -> Self {
        RentalRecord {
            renter_id: row.renter_id,
            media_id: row.media_id,
            media_name: row.media_name,
            media_type: MediaType::parse(&row.media_type).unwrap_or(MediaType::Unknown),
            date_of_rent: row.date_of_rent,
            duration_hours: row.duration_hours,
        }
    }
}

#[async_trait]
impl<'a> FamilyMemberResolver for JoinedResolver<'a> {
    async fn other_members(&self, user_id: i64) -> AppResult<Vec<FamilyMember>> {
        let rows = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT other.user_id, other.user_name
            FROM Users AS me
            JOIN Users AS other
              ON other.family_id = me.family_id AND other.user_id <> me.user_id
            WHERE me.user_id = ?
            ORDER BY other.user_id
            "#,
        )
        .bind(user_id)
        .fetch_all(self.store.pool())
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn all_users(&self) -> AppResult<Vec<FamilyMember>> {
        let rows = sqlx::query_as::<_, MemberRow>(
            "SELECT user_id, user_name FROM Users ORDER BY user_id",
        )
        .fetch_all(self.store.pool())
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl<'a> RentalSessionResolver for JoinedResolver<'a> {
    async fn sessions_of(&self, user_ids: &[i64]) -> AppResult<Vec<RentalRecord>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT s.user_id AS renter_id,
                   m.media_id,
                   m.media_name,
                   CASE
                       WHEN f.film_id IS NOT NULL THEN 'film'
                       WHEN se.series_id IS NOT NULL THEN 'series'
                       ELSE 'unknown'
                   END AS media_type,
                   s.date_of_rent,
                   s.duration AS duration_hours
            FROM Sessions AS s
            JOIN Media AS m ON m.media_id = s.media_id
            LEFT JOIN Film AS f ON f.media_id = m.media_id
            LEFT JOIN Series AS se ON se.media_id = m.media_id
            WHERE s.user_id IN (
            "#,
        );
        let mut separated = builder.separated(", ");
        for id in user_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY s.session_id");

        let rows: Vec<RentalRow> = builder.build_query_as().fetch_all(self.store.pool()).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
