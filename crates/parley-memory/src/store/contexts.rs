//! AI context fragments.

use super::{json_column, to_json_column, Store};
use parley_core::{
    error::ParleyError,
    message::ChannelKind,
    model::AiContext,
};

type ContextRow = (String, String, String, String, String, bool, bool);

fn context_from_row(row: ContextRow) -> AiContext {
    let (id, owner_id, name, content, channels, exclusive, enabled) = row;
    let names: Vec<String> = json_column(&channels);
    AiContext {
        id,
        owner_id,
        name,
        content,
        channels: names.iter().filter_map(|c| ChannelKind::parse(c)).collect(),
        exclusive,
        enabled,
    }
}

impl Store {
    /// Insert or replace an AI context by id.
    pub async fn save_ai_context(&self, context: &AiContext) -> Result<(), ParleyError> {
        let channels: Vec<&str> = context.channels.iter().map(|c| c.as_str()).collect();
        sqlx::query(
            "INSERT INTO ai_contexts (id, owner_id, name, content, channels, exclusive, enabled) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
                name = excluded.name, \
                content = excluded.content, \
                channels = excluded.channels, \
                exclusive = excluded.exclusive, \
                enabled = excluded.enabled",
        )
        .bind(&context.id)
        .bind(&context.owner_id)
        .bind(&context.name)
        .bind(&context.content)
        .bind(to_json_column(&channels)?)
        .bind(context.exclusive)
        .bind(context.enabled)
        .execute(&self.pool)
        .await
        .map_err(|e| ParleyError::Memory(format!("save ai context failed: {e}")))?;

        Ok(())
    }

    /// All contexts of an owner, oldest first.
    pub async fn list_ai_contexts(&self, owner_id: &str) -> Result<Vec<AiContext>, ParleyError> {
        let rows: Vec<ContextRow> = sqlx::query_as(
            "SELECT id, owner_id, name, content, channels, exclusive, enabled \
             FROM ai_contexts WHERE owner_id = ? ORDER BY created_at, rowid",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ParleyError::Memory(format!("query failed: {e}")))?;

        Ok(rows.into_iter().map(context_from_row).collect())
    }

    /// Enabled contexts of an owner that apply to `channel`.
    pub async fn enabled_contexts_for_channel(
        &self,
        owner_id: &str,
        channel: ChannelKind,
    ) -> Result<Vec<AiContext>, ParleyError> {
        Ok(self
            .list_ai_contexts(owner_id)
            .await?
            .into_iter()
            .filter(|c| c.enabled && c.channels.contains(&channel))
            .collect())
    }
}
