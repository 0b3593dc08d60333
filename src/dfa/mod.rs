//! DFA construction and matching.
//!
//! One machine holds the union of every compiled rule. The key components:
//!
//! - `Dfa`: the growing state table with write-once transitions and accept
//!   tags
//! - `Cursor`: a match attempt walking the table one byte at a time
//! - the pattern compiler: folds simplified regexes into the table by
//!   threading ordered state-sets, with no NFA intermediate
//! - text persistence: a canonical whitespace-separated dump format
//!
//! # Module Organization
//!
//! - `table`: core data structures (`Dfa`, `Cursor`) and the invariant
//!   enforcing primitive reads/writes
//! - `compile`: `Dfa::add_rule` and the recursive-descent pattern compiler
//! - `io`: `Dfa::save` / `Dfa::load` and the file conveniences

mod compile;
mod io;
mod table;

pub use table::{Cursor, Dfa, StateId, DEAD, START};
