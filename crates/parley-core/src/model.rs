//! Entities owned by the persistence layer and read by the router.

use crate::context::SamplingParams;
use crate::message::ChannelKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-owner, per-channel bot settings. At most one per (owner, channel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bot {
    pub id: String,
    pub owner_id: String,
    pub channel: ChannelKind,
    pub enabled: bool,
    /// External contact ids allowed to get answers. Empty = everyone.
    #[serde(default)]
    pub whitelist: Vec<String>,
    /// External contact ids never answered.
    #[serde(default)]
    pub blacklist: Vec<String>,
}

impl Bot {
    /// Access-list check for an external contact id.
    pub fn allows(&self, contact_id: &str) -> bool {
        let whitelisted = self.whitelist.is_empty() || self.whitelist.iter().any(|id| id == contact_id);
        let blacklisted = self.blacklist.iter().any(|id| id == contact_id);
        whitelisted && !blacklisted
    }
}

/// A reusable system prompt fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiContext {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub content: String,
    /// Channels this context applies to.
    pub channels: Vec<ChannelKind>,
    /// Only applies to contacts explicitly assigned this context.
    pub exclusive: bool,
    pub enabled: bool,
}

/// A person the owner talks to, possibly on several channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub avatar: String,
    /// Platform id per channel.
    pub handles: HashMap<ChannelKind, String>,
    /// Ids of the AI contexts assigned to this contact.
    pub contexts: Vec<String>,
}

/// The owner's chosen model and its sampling parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    pub owner_id: String,
    pub model: String,
    #[serde(default)]
    pub params: SamplingParams,
}

/// Input to an image generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffusionParams {
    pub prompt: String,
    /// Skip the LLM prompt rewrite.
    pub use_raw_prompt: bool,
    pub seed: u64,
}

/// Result of an image generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffusionOutput {
    /// PNG bytes.
    pub image: Vec<u8>,
    pub seed: u64,
    /// The prompt actually sent to the generator.
    pub prompt: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bot(whitelist: &[&str], blacklist: &[&str]) -> Bot {
        Bot {
            id: "b1".into(),
            owner_id: "o1".into(),
            channel: ChannelKind::Telegram,
            enabled: true,
            whitelist: whitelist.iter().map(|s| s.to_string()).collect(),
            blacklist: blacklist.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_whitelist_only_admits_listed() {
        let b = bot(&["u1"], &[]);
        assert!(b.allows("u1"));
        assert!(!b.allows("u2"));
    }

    #[test]
    fn test_blacklist_excludes_listed() {
        let b = bot(&[], &["u3"]);
        assert!(!b.allows("u3"));
        assert!(b.allows("u1"));
        assert!(b.allows("u2"));
    }

    #[test]
    fn test_blacklist_wins_over_whitelist() {
        let b = bot(&["u1"], &["u1"]);
        assert!(!b.allows("u1"));
    }
}
