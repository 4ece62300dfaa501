//! Contacts, their per-channel handles and assigned contexts.

use super::Store;
use parley_core::{error::ParleyError, message::ChannelKind, model::Contact};
use std::collections::HashMap;

impl Store {
    /// Insert a contact with its handles and context assignments.
    pub async fn create_contact(&self, contact: &Contact) -> Result<(), ParleyError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ParleyError::Memory(format!("begin failed: {e}")))?;

        sqlx::query("INSERT INTO contacts (id, owner_id, name, avatar) VALUES (?, ?, ?, ?)")
            .bind(&contact.id)
            .bind(&contact.owner_id)
            .bind(&contact.name)
            .bind(&contact.avatar)
            .execute(&mut *tx)
            .await
            .map_err(|e| ParleyError::Memory(format!("insert contact failed: {e}")))?;

        for (channel, handle) in &contact.handles {
            sqlx::query(
                "INSERT INTO contact_handles (owner_id, channel, handle, contact_id) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&contact.owner_id)
            .bind(channel.as_str())
            .bind(handle)
            .bind(&contact.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| ParleyError::Memory(format!("insert handle failed: {e}")))?;
        }

        for context_id in &contact.contexts {
            sqlx::query("INSERT INTO contact_contexts (contact_id, context_id) VALUES (?, ?)")
                .bind(&contact.id)
                .bind(context_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| ParleyError::Memory(format!("assign context failed: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| ParleyError::Memory(format!("commit failed: {e}")))?;

        Ok(())
    }

    /// Assign an AI context to a contact. Idempotent.
    pub async fn assign_context(&self, contact_id: &str, context_id: &str) -> Result<(), ParleyError> {
        sqlx::query("INSERT OR IGNORE INTO contact_contexts (contact_id, context_id) VALUES (?, ?)")
            .bind(contact_id)
            .bind(context_id)
            .execute(&self.pool)
            .await
            .map_err(|e| ParleyError::Memory(format!("assign context failed: {e}")))?;
        Ok(())
    }

    /// Look a contact up by its handle on a channel.
    pub async fn find_contact_by_handle(
        &self,
        owner_id: &str,
        channel: ChannelKind,
        handle: &str,
    ) -> Result<Option<Contact>, ParleyError> {
        let id: Option<(String,)> = sqlx::query_as(
            "SELECT contact_id FROM contact_handles WHERE owner_id = ? AND channel = ? AND handle = ?",
        )
        .bind(owner_id)
        .bind(channel.as_str())
        .bind(handle)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ParleyError::Memory(format!("query failed: {e}")))?;

        match id {
            Some((id,)) => self.get_contact(&id).await,
            None => Ok(None),
        }
    }

    /// Load a contact with its handles and contexts.
    pub async fn get_contact(&self, id: &str) -> Result<Option<Contact>, ParleyError> {
        let row: Option<(String, String, String, String)> =
            sqlx::query_as("SELECT id, owner_id, name, avatar FROM contacts WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| ParleyError::Memory(format!("query failed: {e}")))?;

        let Some((id, owner_id, name, avatar)) = row else {
            return Ok(None);
        };

        let handles: Vec<(String, String)> =
            sqlx::query_as("SELECT channel, handle FROM contact_handles WHERE contact_id = ?")
                .bind(&id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| ParleyError::Memory(format!("query failed: {e}")))?;

        let contexts: Vec<(String,)> = sqlx::query_as(
            "SELECT context_id FROM contact_contexts WHERE contact_id = ? ORDER BY rowid",
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ParleyError::Memory(format!("query failed: {e}")))?;

        let handles: HashMap<ChannelKind, String> = handles
            .into_iter()
            .filter_map(|(channel, handle)| ChannelKind::parse(&channel).map(|c| (c, handle)))
            .collect();

        Ok(Some(Contact {
            id,
            owner_id,
            name,
            avatar,
            handles,
            contexts: contexts.into_iter().map(|(c,)| c).collect(),
        }))
    }

    /// All contacts of an owner, oldest first.
    pub async fn list_contacts(&self, owner_id: &str) -> Result<Vec<Contact>, ParleyError> {
        let ids: Vec<(String,)> = sqlx::query_as(
            "SELECT id FROM contacts WHERE owner_id = ? ORDER BY created_at, rowid",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ParleyError::Memory(format!("query failed: {e}")))?;

        let mut contacts = Vec::with_capacity(ids.len());
        for (id,) in ids {
            if let Some(contact) = self.get_contact(&id).await? {
                contacts.push(contact);
            }
        }
        Ok(contacts)
    }
}
