//! Account data repository.

use super::{DbError, PositionRange, from_json, parse_id, to_json, to_position};
use sqlx::SqlitePool;
use syncd_proto::{AccountData, StreamAccountData, StreamPosition, UserId};

const TABLE: &str = "account_data";

/// Repository for global and per-room account data.
pub struct AccountDataRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AccountDataRepository<'a> {
    /// Create a new account data repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Store account data, replacing any previous value of the same type.
    pub async fn store_account_data(&self, data: &AccountData) -> Result<StreamPosition, DbError> {
        let content = to_json(&data.content)?;
        // Global data is keyed by the empty room so the uniqueness constraint applies.
        let room_id = data.room_id.as_ref().map(|r| r.as_str()).unwrap_or("");
        let result = sqlx::query(
            r#"
            INSERT OR REPLACE INTO account_data (user_id, room_id, data_type, content)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(data.user_id.as_str())
        .bind(room_id)
        .bind(&data.data_type)
        .bind(&content)
        .execute(self.pool)
        .await?;

        Ok(to_position(result.last_insert_rowid()))
    }

    /// Account data of `user_id` changed within `range`, in position order.
    pub async fn account_data_in_range(
        &self,
        user_id: &UserId,
        range: PositionRange,
    ) -> Result<Vec<StreamAccountData>, DbError> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let (from, to) = range.bounds();
        let rows: Vec<(i64, String, String, String)> = sqlx::query_as(
            r#"
            SELECT id, room_id, data_type, content FROM account_data
            WHERE user_id = ? AND id > ? AND id <= ?
            ORDER BY id ASC
            "#,
        )
        .bind(user_id.as_str())
        .bind(from)
        .bind(to)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, room_id, data_type, content)| {
                let room_id = if room_id.is_empty() {
                    None
                } else {
                    Some(parse_id(TABLE, room_id)?)
                };
                Ok(StreamAccountData {
                    position: to_position(id),
                    data: AccountData {
                        user_id: user_id.clone(),
                        room_id,
                        data_type,
                        content: from_json(TABLE, &content)?,
                    },
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use serde_json::json;
    use syncd_proto::RoomId;

    #[tokio::test]
    async fn global_and_room_data_are_distinct() {
        let db = Database::new(":memory:").await.unwrap();
        let repo = db.account_data();
        let alice = UserId::parse("@alice:test").unwrap();

        let global = AccountData {
            user_id: alice.clone(),
            room_id: None,
            data_type: "m.push_rules".into(),
            content: json!({ "v": 1 }),
        };
        let tagged = AccountData {
            room_id: Some(RoomId::parse("!r:test").unwrap()),
            data_type: "m.tag".into(),
            ..global.clone()
        };

        repo.store_account_data(&global).await.unwrap();
        repo.store_account_data(&tagged).await.unwrap();
        let updated = repo
            .store_account_data(&AccountData {
                content: json!({ "v": 2 }),
                ..global.clone()
            })
            .await
            .unwrap();

        let rows = repo
            .account_data_in_range(&alice, PositionRange::new(StreamPosition::ZERO, updated))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].data.data_type, "m.tag");
        assert_eq!(rows[1].data.content["v"], 2);
        assert!(rows[1].data.room_id.is_none());
    }
}
