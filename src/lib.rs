//! Rule-driven lexical analysis over a compiled DFA.
//!
//! Token rules are simplified regular expressions paired with integer type
//! tags. [`Tokenizer::add_rule`] compiles each rule directly into one shared
//! deterministic table (there is no NFA intermediate and no subset
//! construction); [`Tokenizer::tokenize`] then drives that table over the
//! input and emits the longest prefix the table accepts, over and over,
//! until the input is consumed:
//!
//! ```
//! use lexdfa::Tokenizer;
//!
//! const WORD: i32 = 0;
//! const NUMBER: i32 = 1;
//! const SPACE: i32 = 2;
//!
//! let mut tokenizer = Tokenizer::new();
//! tokenizer.add_rule(Tokenizer::WORD_RULE, WORD).unwrap();
//! tokenizer.add_rule(Tokenizer::DECIMAL_RULE, NUMBER).unwrap();
//! tokenizer.add_ignored_rule(Tokenizer::WHITESPACE_RULE, SPACE).unwrap();
//!
//! let mut tokens = Vec::new();
//! let had_errors = tokenizer.tokenize("answer 42", &mut tokens);
//! assert!(!had_errors);
//! assert_eq!(tokens.len(), 2);
//! assert_eq!((tokens[0].text.as_str(), tokens[0].token_type), ("answer", WORD));
//! assert_eq!((tokens[1].text.as_str(), tokens[1].token_type), ("42", NUMBER));
//! ```
//!
//! The compiled machine can also be driven byte by byte ([`Dfa`],
//! [`Cursor`]), persisted and reloaded ([`Dfa::save`] / [`Dfa::load`]), and
//! shared across threads ([`SharedTokenizer`]). Negative type tags are the
//! conventional way to recognize *malformed* lexemes: the tokenizer consumes
//! them like any other token but counts them as errors.

mod dfa;
mod thread_safe;
mod tokenizer;

pub use dfa::{Cursor, Dfa, StateId, DEAD, START};
pub use thread_safe::SharedTokenizer;
pub use tokenizer::{Token, Tokenizer};

use std::fmt;
use std::io;

/// Errors surfaced while compiling rules or reloading a saved machine.
///
/// Tokenization itself never fails: input no rule accepts becomes
/// [`Tokenizer::INVALID`] tokens and bumps the error counter instead.
#[derive(Debug)]
pub enum LexError {
    /// `add_rule` was given an empty pattern.
    EmptyPattern,
    /// A `(` or `[` in the pattern was never closed.
    UnbalancedBrackets(String),
    /// The pattern ends with a bare `\`.
    TrailingEscape(String),
    /// A quantifier with no atom to its left.
    LeadingQuantifier(String),
    /// A `|` with no alternative on its right.
    DanglingAlternation(String),
    /// A bracket expression that matches no characters.
    EmptyClass(String),
    /// A group that matches nothing cannot be continued.
    EmptyGroup(String),
    /// Re-compiling a `*`/`+` body changed the machine: the repetition
    /// failed to close onto its own end states.
    QuantifierClosure(String),
    /// The (state, byte) pair already routes to a different state.
    /// Transitions are write-once.
    TransitionConflict {
        state: StateId,
        byte: u8,
        existing: StateId,
        requested: StateId,
    },
    /// The rule's final state already carries a different accept tag; the
    /// earlier rule wins and the later `add_rule` fails.
    AcceptConflict {
        state: StateId,
        existing: i32,
        requested: i32,
    },
    /// A dumped machine referenced a state it never defined.
    StateOutOfBounds(StateId),
    /// A dumped machine failed validation while loading.
    CorruptDump(String),
    Io(io::Error),
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::EmptyPattern => write!(f, "pattern is empty"),
            LexError::UnbalancedBrackets(p) => write!(f, "unbalanced brackets in {:?}", p),
            LexError::TrailingEscape(p) => write!(f, "no character after escape in {:?}", p),
            LexError::LeadingQuantifier(p) => {
                write!(f, "group starts with a quantifier in {:?}", p)
            }
            LexError::DanglingAlternation(p) => {
                write!(f, "no group on the right side of '|' in {:?}", p)
            }
            LexError::EmptyClass(c) => write!(f, "character class [{}] matches nothing", c),
            LexError::EmptyGroup(p) => write!(f, "group in {:?} matches nothing", p),
            LexError::QuantifierClosure(g) => {
                write!(f, "repetition of {:?} does not close onto its end states", g)
            }
            LexError::TransitionConflict {
                state,
                byte,
                existing,
                requested,
            } => write!(
                f,
                "state {} already steps to {} on {:?}, cannot step to {}",
                state, existing, *byte as char, requested
            ),
            LexError::AcceptConflict {
                state,
                existing,
                requested,
            } => write!(
                f,
                "state {} already accepts type {}, cannot accept type {}",
                state, existing, requested
            ),
            LexError::StateOutOfBounds(s) => write!(f, "state {} is out of bounds", s),
            LexError::CorruptDump(msg) => write!(f, "corrupt machine dump: {}", msg),
            LexError::Io(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for LexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LexError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for LexError {
    fn from(e: io::Error) -> Self {
        LexError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_names_the_offending_pieces() {
        let err = LexError::TransitionConflict {
            state: 4,
            byte: b'x',
            existing: 7,
            requested: 9,
        };
        let msg = err.to_string();
        assert!(msg.contains("state 4"), "got: {}", msg);
        assert!(msg.contains("'x'"), "got: {}", msg);

        let err = LexError::AcceptConflict {
            state: 3,
            existing: 2,
            requested: 5,
        };
        let msg = err.to_string();
        assert!(
            msg.contains("type 2") && msg.contains("type 5"),
            "got: {}",
            msg
        );
    }

    #[test]
    fn io_errors_convert_and_chain() {
        let err: LexError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, LexError::Io(_)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn machine_survives_a_trip_through_the_tokenizer() {
        let mut tokenizer = Tokenizer::new();
        tokenizer.add_rule(Tokenizer::WORD_RULE, 1).unwrap();
        tokenizer.add_rule(Tokenizer::DECIMAL_RULE, 2).unwrap();

        let mut dump = Vec::new();
        tokenizer.machine().save(&mut dump).unwrap();
        let reloaded = Dfa::load(&dump[..]).unwrap();

        let mut copy = Tokenizer::from_machine(reloaded);
        let mut tokens = Vec::new();
        assert!(!copy.tokenize("sp1", &mut tokens));
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].token_type, 1);
    }
}
