//! Pattern compilation.
//!
//! Rules are folded directly into the shared table. Compilation threads an
//! ordered *state-set* through the pattern: the set of states a prefix of
//! the pattern may leave the machine in. The first element is canonical -
//! when a fragment needs a successor for a byte, the canonical state's
//! existing transition decides whether to reuse a state or allocate a fresh
//! one, and the chosen successor is then registered on *every* state in the
//! set. That single choice is what keeps the table deterministic without
//! subset construction.
//!
//! Alternation compiles each branch from the same start-set and
//! concatenates the branch end-sets in order. Quantifiers compile their
//! body twice: the second pass starts from the end-set plus the canonical
//! start, which wires the body's transitions onto its own tail; because
//! transition writes are monotonic, the second pass must reproduce the
//! first pass's end-set exactly, and a mismatch is rejected.

use smallvec::{smallvec, SmallVec};

use super::table::{Dfa, StateId, START};
use crate::LexError;

/// Ordered fragment end-set. May hold duplicates; element 0 is canonical.
pub(crate) type StateSet = SmallVec<[StateId; 8]>;

// Named character classes. Order matters: the first byte keys successor
// selection, so expansions must be stable.
const DIGITS: &[u8] = b"0123456789";
const WORD: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ_";
const WHITESPACE: &[u8] = b" \t\r\x0c\n\x0b";
const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const HEXDIGITS: &[u8] = b"0123456789abcdefABCDEF";

fn class_for(c: u8) -> Option<&'static [u8]> {
    match c {
        b'd' => Some(DIGITS),
        b'w' => Some(WORD),
        b's' => Some(WHITESPACE),
        b'l' => Some(LOWERCASE),
        b'u' => Some(UPPERCASE),
        b'h' => Some(HEXDIGITS),
        _ => None,
    }
}

/// Decode `\a \b \f \n \r \t \v`; every other escaped byte is itself.
fn escaped_char(c: u8) -> u8 {
    match c {
        b'a' => 0x07,
        b'b' => 0x08,
        b'f' => 0x0c,
        b'n' => b'\n',
        b'r' => b'\r',
        b't' => b'\t',
        b'v' => 0x0b,
        other => other,
    }
}

fn is_quantifier(c: u8) -> bool {
    matches!(c, b'?' | b'+' | b'*')
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

impl Dfa {
    /// Extend the machine so that exactly the strings matching `pattern`
    /// reach a state tagged `tag`.
    ///
    /// Extension is strictly additive: existing transitions and tags are
    /// never rewritten, so rules sharing prefixes merge onto shared states.
    /// A second rule whose final state already carries a *different* tag
    /// fails with [`LexError::AcceptConflict`]; re-adding an identical rule
    /// is a no-op. On any error the partially written transitions remain
    /// and the machine should be discarded.
    pub fn add_rule(&mut self, pattern: &str, tag: i32) -> Result<(), LexError> {
        if pattern.is_empty() {
            return Err(LexError::EmptyPattern);
        }
        let start: StateSet = smallvec![START];
        let ends = self.compile_sequence(&start, pattern.as_bytes())?;
        for &state in &ends {
            // A nullable pattern (for example `a?`) leaves the start state
            // in its end-set; the start state stays untagged because no
            // match attempt can end where it began.
            if state != START {
                self.set_accept(state, tag)?;
            }
        }
        Ok(())
    }

    /// Compile `pattern` position by position. Each position is one group
    /// or a `|`-joined run of groups; the end-set of one position is the
    /// start-set of the next.
    fn compile_sequence(
        &mut self,
        start: &StateSet,
        pattern: &[u8],
    ) -> Result<StateSet, LexError> {
        let mut start = start.clone();
        let mut ends = StateSet::new();
        let mut index = 0;

        while index < pattern.len() {
            if start.is_empty() {
                return Err(LexError::EmptyGroup(lossy(pattern)));
            }
            ends.clear();

            // Gather this position's alternatives: group ('|' group)*
            let mut branches: Vec<&[u8]> = Vec::new();
            loop {
                let group = parse_group(pattern, &mut index)?;
                if group.is_empty() {
                    break;
                }
                branches.push(group);
                if index < pattern.len() && pattern[index] == b'|' {
                    index += 1;
                    if index >= pattern.len() {
                        return Err(LexError::DanglingAlternation(lossy(pattern)));
                    }
                } else {
                    break;
                }
            }

            for &branch in &branches {
                let branch_ends = self.compile_group(&start, branch)?;
                ends.extend_from_slice(&branch_ends);
            }

            start = ends.clone();
        }
        Ok(ends)
    }

    /// Compile a single parsed group: a quantified atom, a bracket
    /// expression, a parenthesized sub-sequence, or one (possibly escaped)
    /// literal.
    fn compile_group(&mut self, start: &StateSet, group: &[u8]) -> Result<StateSet, LexError> {
        debug_assert!(!group.is_empty());
        let first = group[0];
        let last = group[group.len() - 1];

        if is_quantifier(last) && group.len() > 1 && group[group.len() - 2] != b'\\' {
            self.compile_quantifier(start, group)
        } else if first == b'[' {
            self.compile_bracket(start, &group[1..group.len() - 1])
        } else if first == b'(' {
            self.compile_sequence(start, &group[1..group.len() - 1])
        } else if first == b'.' {
            let any: Vec<u8> = (1u8..=0x7f).collect();
            self.emit_class(start, &any)
        } else if first == b'\\' {
            if group.len() != 2 {
                return Err(LexError::TrailingEscape(lossy(group)));
            }
            let c = group[1];
            match class_for(c) {
                Some(class) => self.emit_class(start, class),
                None => self.emit_byte(start, escaped_char(c)),
            }
        } else {
            self.emit_byte(start, first)
        }
    }

    /// Quantified atom. `?` takes the union with the start-set; `*` and `+`
    /// additionally re-compile the body from the end-set to close the loop.
    fn compile_quantifier(
        &mut self,
        start: &StateSet,
        group: &[u8],
    ) -> Result<StateSet, LexError> {
        let quantifier = group[group.len() - 1];
        debug_assert!(is_quantifier(quantifier));
        let body = &group[..group.len() - 1];

        let at_least_one = quantifier == b'+';
        let unbounded = quantifier != b'?';

        let mut ends = self.compile_group(start, body)?;
        if unbounded {
            // Second pass: the end states gain the body's transitions, with
            // the canonical start still steering successor reuse. Monotonic
            // writes mean this must land on the same end-set; anything else
            // would have forked the loop boundary.
            let mut second: StateSet = smallvec![start[0]];
            second.extend_from_slice(&ends);
            let again = self.compile_group(&second, body)?;
            if again != ends {
                return Err(LexError::QuantifierClosure(lossy(group)));
            }
        }
        if !at_least_one {
            ends.extend_from_slice(start);
        }
        Ok(ends)
    }

    /// Bracket expression body (between `[` and `]`): collect the byte
    /// group, expanding spans and `\`-classes, complement on a leading `^`,
    /// then fan every byte onto one shared successor.
    fn compile_bracket(&mut self, start: &StateSet, body: &[u8]) -> Result<StateSet, LexError> {
        if body.is_empty() {
            return Err(LexError::EmptyClass(String::new()));
        }

        let mut group: Vec<u8> = Vec::new();
        let mut negated = false;
        let mut spanning = false;
        let mut escaped = false;

        for (i, &raw) in body.iter().enumerate() {
            if raw == b'\\' && !escaped {
                escaped = true;
                continue;
            }
            let mut c = raw;
            let mut class = None;
            if escaped {
                class = class_for(c);
                if class.is_none() {
                    c = escaped_char(c);
                }
                escaped = false;
            }

            if let Some(class) = class {
                group.extend_from_slice(class);
            } else if i == 0 && c == b'^' {
                negated = true;
            } else if i > negated as usize && i + 1 < body.len() && c == b'-' {
                spanning = true;
            } else if spanning {
                let from = match group.last() {
                    Some(&low) => low + 1,
                    None => return Err(LexError::EmptyClass(lossy(body))),
                };
                for b in from..=c {
                    group.push(b);
                }
                spanning = false;
            } else {
                group.push(c);
            }
        }

        let group = if negated { complement(&group) } else { group };
        if group.is_empty() {
            return Err(LexError::EmptyClass(lossy(body)));
        }
        self.emit_class(start, &group)
    }

    /// Atom emission for a single byte: pick the successor off the
    /// canonical state, register the transition on every state in the set.
    fn emit_byte(&mut self, start: &StateSet, byte: u8) -> Result<StateSet, LexError> {
        let next = self.choose_state(start[0], byte);
        for &state in start {
            self.set_transition(state, byte, next)?;
        }
        Ok(smallvec![next])
    }

    /// Atom emission for a byte group: one successor, keyed on the group's
    /// first byte, shared by every byte from every state in the set.
    fn emit_class(&mut self, start: &StateSet, bytes: &[u8]) -> Result<StateSet, LexError> {
        let next = self.choose_state(start[0], bytes[0]);
        for &state in start {
            for &byte in bytes {
                self.set_transition(state, byte, next)?;
            }
        }
        Ok(smallvec![next])
    }
}

/// Complement over the ASCII alphabet `1..=127`, in ascending order.
fn complement(excluded: &[u8]) -> Vec<u8> {
    let mut keep = [true; 128];
    for &byte in excluded {
        if (byte as usize) < 128 {
            keep[byte as usize] = false;
        }
    }
    (1u8..128).filter(|&b| keep[b as usize]).collect()
}

/// Consume one group starting at `index` and return it as a subslice:
/// a bracketed run (`(...)` or `[...]`), an escape pair, or a single byte,
/// plus any trailing quantifier characters. Returns an empty slice at
/// end-of-pattern.
fn parse_group<'a>(pattern: &'a [u8], index: &mut usize) -> Result<&'a [u8], LexError> {
    let start = *index;
    if *index < pattern.len() {
        let c = pattern[*index];
        *index += 1;
        if is_quantifier(c) {
            return Err(LexError::LeadingQuantifier(lossy(pattern)));
        }

        if c == b'(' || c == b'[' {
            *index -= 1;
            parse_matching_brackets(pattern, index)?;
        } else if c == b'\\' {
            if *index >= pattern.len() {
                return Err(LexError::TrailingEscape(lossy(pattern)));
            }
            *index += 1;
        }

        while *index < pattern.len() && is_quantifier(pattern[*index]) {
            *index += 1;
        }
    }
    Ok(&pattern[start..*index])
}

/// Advance `index` past a balanced bracketed run, honoring escapes.
fn parse_matching_brackets(pattern: &[u8], index: &mut usize) -> Result<(), LexError> {
    let open = pattern[*index];
    let close = if open == b'(' { b')' } else { b']' };

    let mut depth = 1usize;
    let mut escaped = false;
    *index += 1;
    while *index < pattern.len() && depth > 0 {
        let c = pattern[*index];
        *index += 1;
        if escaped {
            escaped = false;
        } else if c == b'\\' {
            escaped = true;
        } else if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
        }
    }
    if depth != 0 {
        return Err(LexError::UnbalancedBrackets(lossy(pattern)));
    }
    Ok(())
}
