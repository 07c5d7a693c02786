//! Point-in-time read view used to initialise every stream at startup.

use super::{DbError, to_position};
use sqlx::{Sqlite, SqlitePool, Transaction};
use syncd_proto::{Category, StreamPosition};

/// A read transaction whose view is pinned when it is opened.
///
/// All nine providers read their high-water mark through the same snapshot,
/// so the first composed token reflects one moment in time even while
/// consumers keep writing.
pub struct DatabaseSnapshot {
    tx: Transaction<'static, Sqlite>,
}

impl DatabaseSnapshot {
    pub(super) async fn begin(pool: &SqlitePool) -> Result<Self, DbError> {
        let mut tx = pool.begin().await?;
        // SQLite starts a deferred read snapshot at the first table read, not at BEGIN.
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sqlite_master")
            .fetch_one(&mut *tx)
            .await?;
        Ok(Self { tx })
    }

    /// Highest position ever issued for `category`.
    ///
    /// Read from `sqlite_sequence`, so deleting acknowledged rows never moves
    /// a stream backwards. Returns zero for categories with no table.
    pub async fn max_position(&mut self, category: Category) -> Result<StreamPosition, DbError> {
        let Some(table) = stream_table(category) else {
            return Ok(StreamPosition::ZERO);
        };
        let seq: Option<i64> = sqlx::query_scalar("SELECT seq FROM sqlite_sequence WHERE name = ?")
            .bind(table)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(seq.map(to_position).unwrap_or_default())
    }

    /// End the read transaction.
    pub async fn finish(self) -> Result<(), DbError> {
        self.tx.commit().await?;
        Ok(())
    }
}

/// Table whose AUTOINCREMENT sequence backs a category.
pub(crate) fn stream_table(category: Category) -> Option<&'static str> {
    match category {
        Category::Pdu => Some("room_events"),
        Category::Typing => None,
        Category::Receipt => Some("receipts"),
        Category::Invite => Some("invites"),
        Category::SendToDevice => Some("send_to_device"),
        Category::AccountData => Some("account_data"),
        Category::DeviceList => Some("device_list_changes"),
        Category::NotificationData => Some("notification_data"),
        Category::Presence => Some("presence"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn every_durable_category_has_a_table() {
        for category in Category::ALL {
            assert_eq!(stream_table(category).is_some(), category.is_durable());
        }
    }

    #[tokio::test]
    async fn empty_database_starts_at_zero() {
        let db = Database::new(":memory:").await.unwrap();
        let mut snapshot = db.snapshot().await.unwrap();
        for category in Category::ALL {
            assert_eq!(
                snapshot.max_position(category).await.unwrap(),
                StreamPosition::ZERO
            );
        }
        snapshot.finish().await.unwrap();
    }

    #[tokio::test]
    async fn deleted_rows_do_not_lower_the_sequence() {
        let db = Database::new(":memory:").await.unwrap();
        for _ in 0..3 {
            sqlx::query("INSERT INTO device_list_changes (user_id) VALUES ('@a:test')")
                .execute(db.pool())
                .await
                .unwrap();
        }
        sqlx::query("DELETE FROM device_list_changes")
            .execute(db.pool())
            .await
            .unwrap();

        let mut snapshot = db.snapshot().await.unwrap();
        assert_eq!(
            snapshot.max_position(Category::DeviceList).await.unwrap(),
            StreamPosition::new(3)
        );
        snapshot.finish().await.unwrap();
    }
}
