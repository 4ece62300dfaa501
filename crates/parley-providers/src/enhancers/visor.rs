use async_trait::async_trait;
use parley_core::{error::ParleyError, message::Attachment, traits::Visor};
use tracing::debug;

use super::upload_for_text;

/// Image captioning over HTTP.
pub struct HttpVisor {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpVisor {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Visor for HttpVisor {
    async fn describe(&self, image: &Attachment) -> Result<String, ParleyError> {
        debug!("[visor] {} bytes of {}", image.data.len(), image.mime);
        upload_for_text(&self.client, &self.endpoint, image, "vision").await
    }
}
