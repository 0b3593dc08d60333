//! Core data structures for the machine.
//!
//! The table is a flat `Vec` of states indexed by `StateId`. Two indices are
//! reserved: state 0 is the dead state (no transitions out, entering it ends
//! a match attempt) and state 1 is the start state (every match attempt
//! begins there, nothing transitions back into it). Each state holds a
//! sparse byte-to-successor map and an optional accept tag.
//!
//! Writes are monotonic: a (state, byte) pair routes to exactly one
//! successor forever, and an accept tag is set at most once. Rule
//! compilation leans on this to merge patterns into shared prefixes without
//! clobbering each other.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::LexError;

/// A state identifier - an index into the table.
pub type StateId = u32;

/// The dead state: no transitions out; entering it ends a match attempt.
pub const DEAD: StateId = 0;

/// The start state: every match attempt begins here.
pub const START: StateId = 1;

/// One row of the table.
#[derive(Clone, Default)]
pub(crate) struct DfaState {
    /// Sparse successor map; absent bytes step to the dead state.
    pub(crate) transitions: FxHashMap<u8, StateId>,
    /// Accept tag, or `None` for a non-accepting state.
    pub(crate) accept: Option<i32>,
}

/// A deterministic finite automaton over bytes `1..=127`.
///
/// Created empty (dead and start states only), extended by
/// [`add_rule`](Dfa::add_rule), and read at match time through [`Cursor`].
/// A machine that is no longer being extended is freely shareable between
/// threads; matching never writes to the table.
#[derive(Clone)]
pub struct Dfa {
    pub(crate) states: Vec<DfaState>,
}

impl Default for Dfa {
    fn default() -> Self {
        Self::new()
    }
}

impl Dfa {
    /// Create an empty machine holding only the dead and start states.
    pub fn new() -> Self {
        Self {
            states: vec![DfaState::default(), DfaState::default()],
        }
    }

    /// Number of states, counting the implicit dead state.
    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// Successor of `state` on `byte`; unset pairs step to [`DEAD`].
    #[inline]
    pub fn next_state(&self, state: StateId, byte: u8) -> StateId {
        match self.states.get(state as usize) {
            Some(s) => s.transitions.get(&byte).copied().unwrap_or(DEAD),
            None => DEAD,
        }
    }

    /// Accept tag of `state`, or `None` if it is non-accepting.
    #[inline]
    pub fn accept(&self, state: StateId) -> Option<i32> {
        self.states.get(state as usize).and_then(|s| s.accept)
    }

    /// Begin a match attempt at the start state.
    pub fn cursor(&self) -> Cursor<'_> {
        Cursor {
            dfa: self,
            state: START,
            tag: None,
        }
    }

    /// The index the next allocated state would take.
    pub(crate) fn fresh_state(&self) -> StateId {
        self.states.len() as StateId
    }

    /// Successor for `byte` seen from the canonical state: reuse its
    /// existing transition, or hand out a fresh index.
    pub(crate) fn choose_state(&self, canonical: StateId, byte: u8) -> StateId {
        let existing = self.next_state(canonical, byte);
        if existing == DEAD {
            self.fresh_state()
        } else {
            existing
        }
    }

    pub(crate) fn ensure_state(&mut self, state: StateId) {
        let needed = state as usize + 1;
        if self.states.len() < needed {
            self.states.resize_with(needed, DfaState::default);
        }
    }

    /// Record `from --byte--> to`. Re-recording the same successor is a
    /// no-op; a different successor is a conflict.
    pub(crate) fn set_transition(
        &mut self,
        from: StateId,
        byte: u8,
        to: StateId,
    ) -> Result<(), LexError> {
        // Compilation never writes from the dead state or into the start
        // state: the dead state is in no state-set and fresh indices start
        // past the reserved pair.
        debug_assert_ne!(from, DEAD);
        debug_assert_ne!(to, START);

        self.ensure_state(from.max(to));
        let existing = self.states[from as usize].transitions.get(&byte).copied();
        match existing {
            Some(existing) if existing != to => Err(LexError::TransitionConflict {
                state: from,
                byte,
                existing,
                requested: to,
            }),
            Some(_) => Ok(()),
            None => {
                self.states[from as usize].transitions.insert(byte, to);
                Ok(())
            }
        }
    }

    /// Tag `state` as accepting. Re-tagging with the same value is a no-op;
    /// a different value is a conflict.
    pub(crate) fn set_accept(&mut self, state: StateId, tag: i32) -> Result<(), LexError> {
        self.ensure_state(state);
        let slot = &mut self.states[state as usize].accept;
        match *slot {
            None => {
                *slot = Some(tag);
                Ok(())
            }
            Some(existing) if existing == tag => Ok(()),
            Some(existing) => Err(LexError::AcceptConflict {
                state,
                existing,
                requested: tag,
            }),
        }
    }
}

impl fmt::Debug for Dfa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "state | type | transitions")?;
        for (index, state) in self.states.iter().enumerate() {
            write!(f, "{:5} | {:4} | ", index, state.accept.unwrap_or(-1))?;
            let mut transitions: Vec<(u8, StateId)> =
                state.transitions.iter().map(|(&b, &t)| (b, t)).collect();
            transitions.sort_unstable_by_key(|&(byte, _)| byte);
            for (byte, target) in transitions {
                write!(f, "{:?}: {} ", byte as char, target)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// A match attempt: walks the table one byte at a time and remembers the
/// most recent accept tag it passed.
///
/// The tokenizer peeks a byte, steps, and checks [`at_end`](Cursor::at_end);
/// stepping into the dead state keeps the remembered tag, so the caller can
/// still read the longest accepted prefix's type after the walk dies.
pub struct Cursor<'a> {
    dfa: &'a Dfa,
    state: StateId,
    tag: Option<i32>,
}

impl<'a> Cursor<'a> {
    /// Advance on `byte`.
    #[inline]
    pub fn step(&mut self, byte: u8) {
        self.state = self.dfa.next_state(self.state, byte);
        if let Some(tag) = self.dfa.accept(self.state) {
            self.tag = Some(tag);
        }
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> StateId {
        self.state
    }

    /// Last accept tag seen along the walk, if any.
    #[inline]
    pub fn token_type(&self) -> Option<i32> {
        self.tag
    }

    /// True once the walk has dead-ended.
    #[inline]
    pub fn at_end(&self) -> bool {
        self.state == DEAD
    }
}
