use async_trait::async_trait;
use parley_core::{error::ParleyError, message::Attachment, traits::Transcriber};
use tracing::debug;

use super::upload_for_text;

/// Speech-to-text over HTTP.
pub struct HttpTranscriber {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTranscriber {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, audio: &Attachment) -> Result<String, ParleyError> {
        debug!("[transcriber] {} bytes of {}", audio.data.len(), audio.mime);
        upload_for_text(&self.client, &self.endpoint, audio, "transcription").await
    }
}
