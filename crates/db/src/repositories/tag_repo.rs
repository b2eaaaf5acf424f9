//! Repository for the `tags` and `taggings` tables.
//!
//! Taggings are polymorphic: `taggable_type` names the owning table's
//! entity and `taggable_id` its row.

use sqlx::{PgConnection, PgExecutor};
use tarantula_core::tagging::TagList;
use tarantula_core::types::DbId;

/// Provides tag assignment for any taggable entity.
pub struct TagRepo;

impl TagRepo {
    /// Replace the tags of a taggable row with `tags`.
    ///
    /// Tags are created on first use. An empty list removes every tag.
    /// Runs on the caller's connection so it joins any open transaction.
    pub async fn tag_with(
        conn: &mut PgConnection,
        taggable_type: &str,
        taggable_id: DbId,
        tags: &TagList,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM taggings WHERE taggable_type = $1 AND taggable_id = $2")
            .bind(taggable_type)
            .bind(taggable_id)
            .execute(&mut *conn)
            .await?;

        for name in tags.names() {
            // DO NOTHING would return no row for an existing tag.
            let tag_id: DbId = sqlx::query_scalar(
                "INSERT INTO tags (name) VALUES ($1) \
                 ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
                 RETURNING id",
            )
            .bind(name)
            .fetch_one(&mut *conn)
            .await?;

            sqlx::query(
                "INSERT INTO taggings (tag_id, taggable_type, taggable_id) VALUES ($1, $2, $3)",
            )
            .bind(tag_id)
            .bind(taggable_type)
            .bind(taggable_id)
            .execute(&mut *conn)
            .await?;
        }

        tracing::debug!(taggable_type, taggable_id, count = tags.len(), "Tags replaced");
        Ok(())
    }

    /// Current tags of a taggable row.
    pub async fn tags_for<'e, E>(
        executor: E,
        taggable_type: &str,
        taggable_id: DbId,
    ) -> Result<TagList, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT t.name FROM tags t \
             JOIN taggings tg ON tg.tag_id = t.id \
             WHERE tg.taggable_type = $1 AND tg.taggable_id = $2 \
             ORDER BY t.name",
        )
        .bind(taggable_type)
        .bind(taggable_id)
        .fetch_all(executor)
        .await?;
        Ok(TagList::from_names(names))
    }
}
