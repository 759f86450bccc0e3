use crate::entities::{prelude::*, view_cache};
use crate::models::timestamp;
use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{LikeExpr, OnConflict};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

/// Key/value rows backing the derived-view cache.
pub struct CacheRepository {
    conn: DatabaseConnection,
}

/// Converts a glob (`*` wildcard) into a LIKE pattern escaped with `\`.
pub(crate) fn glob_to_like(pattern: &str) -> String {
    let mut like = String::with_capacity(pattern.len() + 4);
    for ch in pattern.chars() {
        match ch {
            '*' => like.push('%'),
            '%' | '_' | '\\' => {
                like.push('\\');
                like.push(ch);
            }
            other => like.push(other),
        }
    }
    like
}

impl CacheRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<String>> {
        let entry = ViewCache::find_by_id(key.to_string())
            .filter(view_cache::Column::ExpiresAt.gt(timestamp(now)))
            .one(&self.conn)
            .await?;
        Ok(entry.map(|e| e.value))
    }

    pub async fn set(&self, key: &str, value: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let active_model = view_cache::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
            expires_at: Set(timestamp(expires_at)),
        };

        ViewCache::insert(active_model)
            .on_conflict(
                OnConflict::column(view_cache::Column::Key)
                    .update_columns([view_cache::Column::Value, view_cache::Column::ExpiresAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<u64> {
        let result = ViewCache::delete_by_id(key.to_string())
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn delete_matching(&self, pattern: &str) -> Result<u64> {
        let result = ViewCache::delete_many()
            .filter(view_cache::Column::Key.like(LikeExpr::new(glob_to_like(pattern)).escape('\\')))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = ViewCache::delete_many()
            .filter(view_cache::Column::ExpiresAt.lte(timestamp(now)))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::glob_to_like;

    #[test]
    fn glob_translation_escapes_like_metacharacters() {
        assert_eq!(glob_to_like("season:abc:*"), "season:abc:%");
        assert_eq!(glob_to_like("a_b%c"), "a\\_b\\%c");
        assert_eq!(glob_to_like("show:1"), "show:1");
    }
}
