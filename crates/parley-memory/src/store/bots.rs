//! Bot rows: one per (owner, channel) with access lists.

use super::{json_column, to_json_column, Store};
use parley_core::{error::ParleyError, message::ChannelKind, model::Bot};

type BotRow = (String, String, String, bool, String, String);

fn bot_from_row(row: BotRow) -> Result<Bot, ParleyError> {
    let (id, owner_id, channel, enabled, whitelist, blacklist) = row;
    let channel = ChannelKind::parse(&channel)
        .ok_or_else(|| ParleyError::Memory(format!("unknown channel in bots: {channel}")))?;
    Ok(Bot {
        id,
        owner_id,
        channel,
        enabled,
        whitelist: json_column(&whitelist),
        blacklist: json_column(&blacklist),
    })
}

impl Store {
    /// Insert or replace the bot row for `(bot.owner_id, bot.channel)`.
    pub async fn upsert_bot(&self, bot: &Bot) -> Result<(), ParleyError> {
        sqlx::query(
            "INSERT INTO bots (id, owner_id, channel, enabled, whitelist, blacklist) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(owner_id, channel) DO UPDATE SET \
                enabled = excluded.enabled, \
                whitelist = excluded.whitelist, \
                blacklist = excluded.blacklist, \
                updated_at = datetime('now')",
        )
        .bind(&bot.id)
        .bind(&bot.owner_id)
        .bind(bot.channel.as_str())
        .bind(bot.enabled)
        .bind(to_json_column(&bot.whitelist)?)
        .bind(to_json_column(&bot.blacklist)?)
        .execute(&self.pool)
        .await
        .map_err(|e| ParleyError::Memory(format!("upsert bot failed: {e}")))?;

        Ok(())
    }

    /// The bot row for an owner on a channel.
    pub async fn get_bot(
        &self,
        owner_id: &str,
        channel: ChannelKind,
    ) -> Result<Option<Bot>, ParleyError> {
        let row: Option<BotRow> = sqlx::query_as(
            "SELECT id, owner_id, channel, enabled, whitelist, blacklist \
             FROM bots WHERE owner_id = ? AND channel = ?",
        )
        .bind(owner_id)
        .bind(channel.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ParleyError::Memory(format!("query failed: {e}")))?;

        row.map(bot_from_row).transpose()
    }
}
