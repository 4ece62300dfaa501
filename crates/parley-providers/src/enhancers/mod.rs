//! HTTP enhancers: audio transcription, image captioning, image generation.
//!
//! Transcription and captioning share one wire format: a multipart upload
//! with a single `file` part answered by `{"text": "..."}`.

mod diffuser;
mod transcriber;
mod visor;

pub use diffuser::HttpImageGenerator;
pub use transcriber::HttpTranscriber;
pub use visor::HttpVisor;

use parley_core::{error::ParleyError, message::Attachment};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
struct TextResponse {
    text: String,
}

/// Upload `attachment` as `file` and return the trimmed `text` field.
async fn upload_for_text(
    client: &reqwest::Client,
    endpoint: &str,
    attachment: &Attachment,
    what: &str,
) -> Result<String, ParleyError> {
    let file_name = format!("{}.{}", Uuid::new_v4(), attachment.extension());
    let part = reqwest::multipart::Part::bytes(attachment.data.clone())
        .file_name(file_name)
        .mime_str(&attachment.mime)
        .map_err(|e| ParleyError::Enhancer(format!("{what}: bad mime {}: {e}", attachment.mime)))?;

    let form = reqwest::multipart::Form::new().part("file", part);

    let resp = client
        .post(endpoint)
        .multipart(form)
        .send()
        .await
        .map_err(|e| ParleyError::Enhancer(format!("{what} request failed: {e}")))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(ParleyError::Enhancer(format!(
            "{what} returned {status}: {body}"
        )));
    }

    let result: TextResponse = resp
        .json()
        .await
        .map_err(|e| ParleyError::Enhancer(format!("{what} response parse failed: {e}")))?;

    Ok(result.text.trim().to_string())
}
