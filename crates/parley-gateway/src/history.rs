//! Bounded per-chat conversation memory.

use parley_core::context::{HistoryEntry, Role};
use std::collections::VecDeque;

/// Rolling history whose approximate token count stays under a ceiling.
///
/// Tokens are estimated as `ceil(chars / 4)` over all entries. Oldest entries
/// are evicted first; the newest entry always stays.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    entries: VecDeque<HistoryEntry>,
    max_tokens: usize,
    chars: usize,
}

impl HistoryBuffer {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_tokens,
            chars: 0,
        }
    }

    /// Append an entry, then evict from the front until under the ceiling.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.chars += entry.content.chars().count();
        self.entries.push_back(entry);

        while self.tokens() > self.max_tokens && self.entries.len() > 1 {
            if let Some(evicted) = self.entries.pop_front() {
                self.chars -= evicted.content.chars().count();
            }
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(HistoryEntry::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(HistoryEntry::assistant(content));
    }

    /// Approximate token count of the whole buffer.
    pub fn tokens(&self) -> usize {
        self.chars.div_ceil(4)
    }

    /// Copy of the entries, oldest first.
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Whether the assistant already said exactly `text`.
    pub fn has_assistant_turn(&self, text: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.role == Role::Assistant && e.content == text)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.chars = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_estimate_rounds_up() {
        let mut h = HistoryBuffer::new(100);
        h.push_user("abcde");
        assert_eq!(h.tokens(), 2);
        h.push_assistant("abc");
        assert_eq!(h.tokens(), 2);
    }

    #[test]
    fn test_evicts_oldest_until_under_ceiling() {
        let mut h = HistoryBuffer::new(10);
        h.push_user("a".repeat(16));
        h.push_assistant("b".repeat(16));
        assert_eq!(h.len(), 2);
        assert_eq!(h.tokens(), 8);

        // 16 + 16 + 12 chars = 11 tokens; the oldest goes.
        h.push_user("c".repeat(12));
        assert!(h.tokens() <= 10);
        let snap = h.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].content, "b".repeat(16));
        assert_eq!(snap[1].content, "c".repeat(12));
    }

    #[test]
    fn test_newest_entry_survives_even_when_oversized() {
        let mut h = HistoryBuffer::new(10);
        h.push_user("short");
        h.push_assistant("x".repeat(80));
        let snap = h.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].content.len(), 80);
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        let mut h = HistoryBuffer::new(1);
        h.push_user("ñañ");
        assert_eq!(h.tokens(), 1);
    }

    #[test]
    fn test_clear_and_assistant_lookup() {
        let mut h = HistoryBuffer::new(100);
        h.push_user("hi");
        h.push_assistant("hello there");
        assert!(h.has_assistant_turn("hello there"));
        assert!(!h.has_assistant_turn("hi"));

        h.clear();
        assert!(h.is_empty());
        assert_eq!(h.tokens(), 0);
        assert!(!h.has_assistant_turn("hello there"));
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut h = HistoryBuffer::new(100);
        h.push_user("one");
        let snap = h.snapshot();
        h.push_user("two");
        assert_eq!(snap.len(), 1);
        assert_eq!(h.len(), 2);
    }
}
