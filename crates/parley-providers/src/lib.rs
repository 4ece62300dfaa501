//! # parley-providers
//!
//! LLM backends, attachment enhancers and avatar generation for Parley.

pub mod avatar;
pub mod enhancers;
pub mod ollama;
pub mod openai;
pub mod selector;
pub mod tools;

pub use avatar::DiceBearAvatars;
pub use enhancers::{HttpImageGenerator, HttpTranscriber, HttpVisor};
pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;
pub use selector::ProviderSelector;

use parley_core::{context::ChatRequest, error::ParleyError};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Checks shared by every backend before any network traffic.
pub(crate) fn precheck(request: &ChatRequest, cancel: &CancellationToken) -> Result<(), ParleyError> {
    if cancel.is_cancelled() {
        return Err(ParleyError::Cancelled);
    }
    if request.contexts.is_empty() {
        return Err(ParleyError::Config("no contexts provided".into()));
    }
    Ok(())
}

/// Race `fut` against `cancel`; the request is dropped on cancellation.
pub(crate) async fn until_cancelled<T, F>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<T, ParleyError>
where
    F: Future<Output = Result<T, ParleyError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ParleyError::Cancelled),
        res = fut => res,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::context::{HistoryEntry, SamplingParams};
    use std::time::Duration;

    fn request(contexts: Vec<String>) -> ChatRequest {
        ChatRequest {
            history: vec![HistoryEntry::user("hi")],
            contexts,
            model: "llama3.1".into(),
            params: SamplingParams::default(),
        }
    }

    #[test]
    fn test_precheck_cancelled_first() {
        let token = CancellationToken::new();
        token.cancel();
        let err = precheck(&request(vec![]), &token).unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_precheck_rejects_empty_contexts() {
        let err = precheck(&request(vec![]), &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, ParleyError::Config(_)));
        assert!(precheck(&request(vec!["ctx".into()]), &CancellationToken::new()).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_until_cancelled_aborts_pending_future() {
        let token = CancellationToken::new();
        let child = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            child.cancel();
        });
        let res: Result<(), _> = until_cancelled(&token, async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        })
        .await;
        assert!(res.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_until_cancelled_passes_result_through() {
        let token = CancellationToken::new();
        let res = until_cancelled(&token, async { Ok::<_, ParleyError>(7) }).await;
        assert_eq!(res.unwrap(), 7);
    }
}
