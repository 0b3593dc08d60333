//! Text persistence for compiled machines.
//!
//! The dump is a single whitespace-separated stream: the number of non-dead
//! states, then for each state from 1 upward its accept tag (`-1` for
//! none), its transition count, and the transitions as raw-key-byte /
//! target pairs. Every field is followed by exactly one space.
//!
//! The writer sorts transitions by key byte, which makes the dump canonical:
//! loading a dump and saving it again reproduces it byte for byte. The
//! loader parses integers with ordinary whitespace skipping but reads each
//! transition key as the one raw byte after the single separator space, so
//! keys that are themselves whitespace (space, tab, newline - any machine
//! with a whitespace rule has them) survive the round trip.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use super::table::{Dfa, DfaState, StateId, START};
use crate::LexError;

impl Dfa {
    /// Serialize the machine to `writer` in the canonical text format.
    pub fn save<W: Write>(&self, mut writer: W) -> io::Result<()> {
        write!(writer, "{} ", self.states.len() - 1)?;
        for state in &self.states[1..] {
            write!(
                writer,
                "{} {} ",
                state.accept.unwrap_or(-1),
                state.transitions.len()
            )?;
            let mut transitions: Vec<(u8, StateId)> =
                state.transitions.iter().map(|(&b, &t)| (b, t)).collect();
            transitions.sort_unstable_by_key(|&(byte, _)| byte);
            for (byte, target) in transitions {
                writer.write_all(&[byte])?;
                write!(writer, " {} ", target)?;
            }
        }
        Ok(())
    }

    /// Serialize the machine to a file at `path`.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), LexError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.save(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Reconstruct a machine from a dump produced by [`save`](Dfa::save).
    ///
    /// The dump is validated: transition targets must name defined states
    /// and may not point at the dead or start state, and the start state
    /// must be untagged.
    pub fn load<R: Read>(mut reader: R) -> Result<Self, LexError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let mut parser = DumpParser {
            bytes: &bytes,
            pos: 0,
        };

        let rows = parser.read_uint()? as usize;
        if rows == 0 {
            return Err(LexError::CorruptDump("missing start state".into()));
        }

        let mut dfa = Dfa::new();
        dfa.states.resize_with(rows + 1, DfaState::default);

        for row in 1..=rows {
            let tag = parser.read_int()?;
            if tag < i64::from(i32::MIN) || tag > i64::from(i32::MAX) {
                return Err(LexError::CorruptDump(format!("accept tag {} out of range", tag)));
            }
            if row == START as usize && tag != -1 {
                return Err(LexError::CorruptDump("start state carries an accept tag".into()));
            }
            dfa.states[row].accept = if tag == -1 { None } else { Some(tag as i32) };

            let count = parser.read_uint()?;
            for _ in 0..count {
                let key = parser.read_key()?;
                let target = parser.read_uint()?;
                if target as usize > rows {
                    return Err(LexError::StateOutOfBounds(target as StateId));
                }
                if target <= u64::from(START) {
                    return Err(LexError::CorruptDump(format!(
                        "transition into reserved state {}",
                        target
                    )));
                }
                dfa.states[row].transitions.insert(key, target as StateId);
            }
        }
        Ok(dfa)
    }

    /// Reconstruct a machine from the file at `path`.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, LexError> {
        Self::load(BufReader::new(File::open(path)?))
    }
}

struct DumpParser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> DumpParser<'a> {
    fn read_int(&mut self) -> Result<i64, LexError> {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        let start = self.pos;
        let negative = self.pos < self.bytes.len() && self.bytes[self.pos] == b'-';
        if negative {
            self.pos += 1;
        }
        let digits = self.pos;
        let mut value: i64 = 0;
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(i64::from(self.bytes[self.pos] - b'0')))
                .ok_or_else(|| {
                    LexError::CorruptDump(format!("integer overflow at byte {}", start))
                })?;
            self.pos += 1;
        }
        if self.pos == digits {
            return Err(LexError::CorruptDump(format!(
                "expected integer at byte {}",
                start
            )));
        }
        Ok(if negative { -value } else { value })
    }

    fn read_uint(&mut self) -> Result<u64, LexError> {
        let start = self.pos;
        let value = self.read_int()?;
        if value < 0 {
            return Err(LexError::CorruptDump(format!(
                "expected unsigned integer at byte {}",
                start
            )));
        }
        Ok(value as u64)
    }

    /// The key byte sits immediately after the single space terminating the
    /// previous field; take it raw so whitespace keys are preserved.
    fn read_key(&mut self) -> Result<u8, LexError> {
        if self.pos >= self.bytes.len() || self.bytes[self.pos] != b' ' {
            return Err(LexError::CorruptDump(format!(
                "expected separator before transition key at byte {}",
                self.pos
            )));
        }
        self.pos += 1;
        let key = self
            .bytes
            .get(self.pos)
            .copied()
            .ok_or_else(|| LexError::CorruptDump("truncated transition key".into()))?;
        self.pos += 1;
        Ok(key)
    }
}
