//! Silence matching engine: evaluates a silence's matchers against an
//! alert's labels, AND-combined, with a compiled-regex cache shared across
//! every matcher in the process.

mod matcher;

pub use matcher::{MatchesAnyOutcome, SilenceMatcher};
