//! Router-facing lookups.

use super::Store;
use async_trait::async_trait;
use parley_core::{
    error::ParleyError,
    message::ChannelKind,
    model::{AiContext, Bot, Contact, ModelConfig},
    traits::Directory,
};

#[async_trait]
impl Directory for Store {
    async fn find_bot(
        &self,
        owner_id: &str,
        channel: ChannelKind,
    ) -> Result<Option<Bot>, ParleyError> {
        self.get_bot(owner_id, channel).await
    }

    async fn find_contact(
        &self,
        owner_id: &str,
        channel: ChannelKind,
        handle: &str,
    ) -> Result<Option<Contact>, ParleyError> {
        self.find_contact_by_handle(owner_id, channel, handle).await
    }

    async fn create_contact(&self, contact: &Contact) -> Result<(), ParleyError> {
        Store::create_contact(self, contact).await
    }

    async fn contexts_for_channel(
        &self,
        owner_id: &str,
        channel: ChannelKind,
    ) -> Result<Vec<AiContext>, ParleyError> {
        self.enabled_contexts_for_channel(owner_id, channel).await
    }

    async fn model_config(&self, owner_id: &str) -> Result<Option<ModelConfig>, ParleyError> {
        self.get_model_config(owner_id).await
    }
}
