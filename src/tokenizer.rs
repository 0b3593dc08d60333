//! Longest-match tokenization over a compiled machine.
//!
//! The tokenizer owns one [`Dfa`] holding the union of every rule. Each
//! token is produced by running a fresh cursor from the start state: bytes
//! are peeked, stepped, and consumed until the machine dead-ends, and the
//! token takes the *last* accept tag seen along the walk. The byte that
//! killed the walk is never consumed, so the next token starts exactly
//! where the previous one ended.

use std::io::Read;

use crate::dfa::Dfa;
use crate::LexError;

/// One lexeme: the raw text, its rule tag, and the 1-based row/column of
/// its first byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub token_type: i32,
    pub text: String,
    pub row: u32,
    pub column: u32,
}

/// Rule-driven tokenizer.
///
/// Rules are added with [`add_rule`](Tokenizer::add_rule), which takes a
/// simplified regex and an integer type tag. Negative tags conventionally
/// mark rules for *malformed* lexemes, so the tokenizer consumes the whole
/// bad token and counts an error instead of stopping. Types registered via
/// [`ignore_type`](Tokenizer::ignore_type) are dropped from the output.
#[derive(Clone, Default)]
pub struct Tokenizer {
    machine: Dfa,
    ignore_types: Vec<i32>,
    num_errors: u32,
}

impl Tokenizer {
    /// Tag given to text no rule accepts.
    pub const INVALID: i32 = -1;

    /// Runs of blanks, tabs, and line breaks.
    pub const WHITESPACE_RULE: &'static str = r"\s+";
    /// A letter or underscore followed by word characters.
    pub const WORD_RULE: &'static str = r"[\l\u_][\w]*";
    /// Decimal integer with no leading zero, optionally negated.
    pub const DECIMAL_RULE: &'static str = r"-?[1-9][\d]*";
    /// Decimal digits running into word characters.
    pub const MALFORMED_DECIMAL_RULE: &'static str = r"(-[0\l\u_])|(-?[1-9][\d]*[\l\u_])[\w]*";
    /// Hex digits prefixed by `$` or `0x`.
    pub const HEX_RULE: &'static str = r"$|(0x)[\h]+";
    /// A hex prefix followed by something that is not a hex number.
    pub const MALFORMED_HEX_RULE: &'static str = r"$|(0x)([\h]*[g-zG-Z_][\w]*)?";
    /// Octal integer: a leading zero then octal digits.
    pub const OCTAL_RULE: &'static str = "0[0-7]*";
    /// Octal digits running into anything that is not an octal number.
    pub const MALFORMED_OCTAL_RULE: &'static str = r"0[0-7]*[89ac-wyz\u_][\w]*";
    /// Binary integer: `0b` then binary digits.
    pub const BINARY_RULE: &'static str = "0b[01]+";
    /// A binary prefix running into non-binary word characters.
    pub const MALFORMED_BINARY_RULE: &'static str = r"0b[01]*[2-9\l\u_][\w]*";
    /// Double-quoted string; `\` escapes the next byte, newlines included.
    pub const DQ_STRING_RULE: &'static str = r#""((\\.)|[^"\\])*""#;
    /// Single-quoted string; `\` escapes the next byte.
    pub const SQ_STRING_RULE: &'static str = r"'((\\.)|[^'\\])*'";
    /// Exactly one plain or escaped character in single quotes.
    pub const CHARACTER_RULE: &'static str = r"'(\\.)|[^'\\]'";
    /// More than one character in single quotes.
    pub const MALFORMED_CHARACTER_RULE: &'static str = r"'(\\.)|[^'\\]((\\.)|[^'\\])+'";

    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an already compiled (for example, reloaded) machine.
    pub fn from_machine(machine: Dfa) -> Self {
        Self {
            machine,
            ignore_types: Vec::new(),
            num_errors: 0,
        }
    }

    /// Borrow the compiled machine, e.g. to persist it.
    pub fn machine(&self) -> &Dfa {
        &self.machine
    }

    /// Compile `pattern` into the shared machine under `token_type`.
    pub fn add_rule(&mut self, pattern: &str, token_type: i32) -> Result<(), LexError> {
        self.machine.add_rule(pattern, token_type)
    }

    /// Like [`add_rule`](Tokenizer::add_rule), but tokens of this type are
    /// dropped from the output.
    pub fn add_ignored_rule(&mut self, pattern: &str, token_type: i32) -> Result<(), LexError> {
        self.add_rule(pattern, token_type)?;
        self.ignore_type(token_type);
        Ok(())
    }

    /// Drop tokens of `token_type` from the output. They are still matched
    /// and still advance the row/column bookkeeping.
    pub fn ignore_type(&mut self, token_type: i32) {
        if !self.ignore_types.contains(&token_type) {
            self.ignore_types.push(token_type);
        }
    }

    /// Split `input` into tokens appended to `tokens`. Returns true if any
    /// error token (negative or [`INVALID`](Tokenizer::INVALID) type) was
    /// recorded.
    pub fn tokenize(&mut self, input: &str, tokens: &mut Vec<Token>) -> bool {
        self.num_errors = self.scan(input.as_bytes(), tokens);
        self.num_errors > 0
    }

    /// Read `reader` to end-of-input and tokenize its bytes.
    pub fn tokenize_reader<R: Read>(
        &mut self,
        mut reader: R,
        tokens: &mut Vec<Token>,
    ) -> Result<bool, LexError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        self.num_errors = self.scan(&bytes, tokens);
        Ok(self.num_errors > 0)
    }

    /// Errors recorded by the most recent tokenize call.
    pub fn errors(&self) -> u32 {
        self.num_errors
    }

    /// The scan loop proper. Reads the machine, never writes it.
    pub(crate) fn scan(&self, bytes: &[u8], tokens: &mut Vec<Token>) -> u32 {
        let mut errors = 0u32;
        let mut pos = 0usize;
        let mut row = 1u32;
        let mut column = 1u32;

        while pos < bytes.len() {
            let token_row = row;
            let token_column = column;
            let start = pos;

            let mut cursor = self.machine.cursor();
            while pos < bytes.len() {
                cursor.step(bytes[pos]);
                if cursor.at_end() {
                    // The killing byte stays unconsumed; it starts the next
                    // token.
                    break;
                }
                advance(bytes[pos], &mut row, &mut column);
                pos += 1;
            }

            let token_type = if pos == start {
                // Nothing moves off the start state on this byte. Swallow
                // it as a one-byte invalid token so the scan always makes
                // progress.
                advance(bytes[pos], &mut row, &mut column);
                pos += 1;
                Self::INVALID
            } else {
                cursor.token_type().unwrap_or(Self::INVALID)
            };

            if !self.ignore_types.contains(&token_type) {
                if token_type < 0 {
                    errors += 1;
                }
                tokens.push(Token {
                    token_type,
                    text: String::from_utf8_lossy(&bytes[start..pos]).into_owned(),
                    row: token_row,
                    column: token_column,
                });
            }
        }
        errors
    }
}

#[inline]
fn advance(byte: u8, row: &mut u32, column: &mut u32) {
    if byte == b'\n' {
        *row += 1;
        *column = 1;
    } else {
        *column += 1;
    }
}
