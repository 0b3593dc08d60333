//! Thread-safe tokenization.
//!
//! A [`Tokenizer`] whose rule set is frozen is already safe to share behind
//! an `Arc`: the scan loop only reads the table. [`SharedTokenizer`] covers
//! the remaining case - adding rules while other threads tokenize:
//!
//! - rule mutations are serialized through a `parking_lot::Mutex` and
//!   applied copy-on-write, so a failed `add_rule` changes nothing
//! - every successful mutation publishes an immutable snapshot through
//!   `arc_swap::ArcSwap`
//! - `tokenize` loads the current snapshot without locking; a scan that is
//!   already running keeps its snapshot alive and never observes a
//!   half-built rule

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::tokenizer::{Token, Tokenizer};
use crate::LexError;

/// Concurrent tokenizer with lock-free reads.
pub struct SharedTokenizer {
    live: Mutex<Tokenizer>,
    frozen: ArcSwap<Tokenizer>,
}

impl Default for SharedTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedTokenizer {
    pub fn new() -> Self {
        Self {
            live: Mutex::new(Tokenizer::new()),
            frozen: ArcSwap::from_pointee(Tokenizer::new()),
        }
    }

    /// Compile `pattern` under `token_type` and publish a new snapshot.
    ///
    /// On failure the previous snapshot stays published and the rule set is
    /// unchanged.
    pub fn add_rule(&self, pattern: &str, token_type: i32) -> Result<(), LexError> {
        self.mutate(|t| t.add_rule(pattern, token_type))
    }

    /// Like [`add_rule`](SharedTokenizer::add_rule), but tokens of this
    /// type are dropped from the output.
    pub fn add_ignored_rule(&self, pattern: &str, token_type: i32) -> Result<(), LexError> {
        self.mutate(|t| t.add_ignored_rule(pattern, token_type))
    }

    /// Drop tokens of `token_type` from the output of later calls.
    pub fn ignore_type(&self, token_type: i32) {
        let mut live = self.live.lock();
        let mut next = live.clone();
        next.ignore_type(token_type);
        *live = next.clone();
        self.frozen.store(Arc::new(next));
    }

    /// Tokenize `input` against the current snapshot. Returns true if any
    /// error token was produced; counts are per call, never shared.
    pub fn tokenize(&self, input: &str, tokens: &mut Vec<Token>) -> bool {
        self.frozen.load().scan(input.as_bytes(), tokens) > 0
    }

    /// The current snapshot, e.g. to persist its machine or to hand a
    /// worker thread its own tokenizer.
    pub fn snapshot(&self) -> Arc<Tokenizer> {
        self.frozen.load_full()
    }

    fn mutate(
        &self,
        apply: impl FnOnce(&mut Tokenizer) -> Result<(), LexError>,
    ) -> Result<(), LexError> {
        let mut live = self.live.lock();
        let mut next = live.clone();
        apply(&mut next)?;
        *live = next.clone();
        self.frozen.store(Arc::new(next));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORD: i32 = 0;
    const NUMBER: i32 = 1;
    const SPACE: i32 = 2;

    fn shared() -> SharedTokenizer {
        let t = SharedTokenizer::new();
        t.add_rule(Tokenizer::WORD_RULE, WORD).unwrap();
        t.add_rule(Tokenizer::DECIMAL_RULE, NUMBER).unwrap();
        t.add_ignored_rule(Tokenizer::WHITESPACE_RULE, SPACE).unwrap();
        t
    }

    #[test]
    fn tokenizes_like_the_plain_tokenizer() {
        let t = shared();
        let mut tokens = Vec::new();
        assert!(!t.tokenize("alpha 42 beta", &mut tokens));
        let types: Vec<i32> = tokens.iter().map(|t| t.token_type).collect();
        assert_eq!(types, vec![WORD, NUMBER, WORD]);
    }

    #[test]
    fn rules_become_visible_after_publication() {
        let t = SharedTokenizer::new();
        let mut tokens = Vec::new();

        assert!(t.tokenize("a", &mut tokens));
        assert_eq!(tokens[0].token_type, Tokenizer::INVALID);

        t.add_rule("a", 9).unwrap();
        tokens.clear();
        assert!(!t.tokenize("a", &mut tokens));
        assert_eq!(tokens[0].token_type, 9);
    }

    #[test]
    fn failed_rule_leaves_the_snapshot_untouched() {
        let t = SharedTokenizer::new();
        t.add_rule("foo", 1).unwrap();

        assert!(matches!(
            t.add_rule("foo", 2),
            Err(LexError::AcceptConflict { .. })
        ));

        let mut tokens = Vec::new();
        assert!(!t.tokenize("foo", &mut tokens));
        assert_eq!(tokens[0].token_type, 1);

        // The rule set is still extendable after a failure.
        t.add_rule("bar", 3).unwrap();
        tokens.clear();
        assert!(!t.tokenize("bar", &mut tokens));
        assert_eq!(tokens[0].token_type, 3);
    }

    #[test]
    fn concurrent_readers_share_one_snapshot() {
        let t = shared();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..100 {
                        let mut tokens = Vec::new();
                        assert!(!t.tokenize("loop 17 end", &mut tokens));
                        assert_eq!(tokens.len(), 3);
                        assert_eq!(tokens[1].token_type, NUMBER);
                    }
                });
            }
        });
    }

    #[test]
    fn readers_survive_concurrent_rule_additions() {
        // No word rule here: keyword rules would land on its tagged states.
        let t = SharedTokenizer::new();
        t.add_rule(Tokenizer::DECIMAL_RULE, NUMBER).unwrap();
        t.add_ignored_rule(Tokenizer::WHITESPACE_RULE, SPACE).unwrap();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for i in 0..50 {
                    t.add_rule(&format!("kw{}x", i), 100 + i).unwrap();
                }
            });
            for _ in 0..2 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        let mut tokens = Vec::new();
                        assert!(!t.tokenize("1234 7", &mut tokens));
                        assert_eq!(tokens.len(), 2);
                        assert_eq!(tokens[0].token_type, NUMBER);
                        assert_eq!(tokens[1].token_type, NUMBER);
                    }
                });
            }
        });
    }

    #[test]
    fn snapshot_hands_out_an_independent_tokenizer() {
        let t = shared();
        let snapshot = t.snapshot();
        t.add_rule("@", 50).unwrap();

        // The old snapshot does not know the new rule.
        let mut tokens = Vec::new();
        assert!(snapshot.scan(b"@", &mut tokens) > 0);
        assert_eq!(tokens[0].token_type, Tokenizer::INVALID);
    }
}
