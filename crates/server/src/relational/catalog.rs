use chrono::{DateTime, Utc};
use shared::{MediaListing, MediaType, RentalHistoryEntry, UserListing};
use sqlx::FromRow;

use super::RelationalStore;
use crate::error::AppResult;

#[derive(FromRow)]
struct MediaListingRow {
    media_id: i64,
    media_name: String,
    genre: String,
    prod_year: i64,
    media_type: String,
    cost_per_day: i64,
}

impl From<MediaListingRow> for MediaListing {
    fn from(row: MediaListingRow) -> Self {
        MediaListing {
            media_id: row.media_id,
            media_name: row.media_name,
            genre: row.genre,
            prod_year: row.prod_year,
            media_type: MediaType::parse(&row.media_type).unwrap_or(MediaType::Unknown),
            cost_per_day: row.cost_per_day,
        }
    }
}

#[derive(FromRow)]
struct RentalHistoryRow {
    session_id: i64,
    media_id: i64,
    media_name: String,
    cost: i64,
    duration: i64,
    date_of_rent: DateTime<Utc>,
}

impl From<RentalHistoryRow> for RentalHistoryEntry {
    fn from(row: RentalHistoryRow) -> Self {
        RentalHistoryEntry {
            session_id: row.session_id,
            media_id: row.media_id,
            media_name: row.media_name,
            cost: row.cost,
            duration_hours: row.duration,
            date_of_rent: row.date_of_rent,
        }
    }
}

impl RelationalStore {
    /// Every user, by name
    pub async fn list_users(&self) -> AppResult<Vec<UserListing>> {
        let rows: Vec<(i64, String, String)> = sqlx::query_as(
            "SELECT user_id, user_name, email FROM Users ORDER BY user_name, user_id",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(user_id, user_name, email)| UserListing {
                user_id,
                user_name,
                email,
            })
            .collect())
    }

    /// Every media item with its type, by name
    pub async fn list_media(&self) -> AppResult<Vec<MediaListing>> {
        let rows = sqlx::query_as::<_, MediaListingRow>(
            r#"
            SELECT m.media_id, m.media_name, m.genre, m.prod_year, m.cost_per_day,
                   CASE
                       WHEN f.film_id IS NOT NULL THEN 'film'
                       WHEN s.series_id IS NOT NULL THEN 'series'
                       ELSE 'unknown'
                   END AS media_type
            FROM Media AS m
            LEFT JOIN Film AS f ON f.media_id = m.media_id
            LEFT JOIN Series AS s ON s.media_id = m.media_id
            ORDER BY m.media_name, m.media_id
            "#,
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Sessions of one user joined with the current media name, newest first.
    /// Empty for an unknown user.
    pub async fn user_rentals(&self, user_id: i64) -> AppResult<Vec<RentalHistoryEntry>> {
        let rows = sqlx::query_as::<_, RentalHistoryRow>(
            r#"
            SELECT s.session_id, s.media_id, m.media_name, s.cost, s.duration, s.date_of_rent
            FROM Sessions AS s
            JOIN Media AS m ON m.media_id = s.media_id
            WHERE s.user_id = ?
            ORDER BY s.date_of_rent DESC, s.session_id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
