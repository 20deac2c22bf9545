//! Stable exit codes for ragloop CLI commands.

/// Command succeeded, or the conversation completed or produced an answer.
pub const OK: i32 = 0;
/// Command failed due to invalid input, config, script, or a fatal model error.
pub const INVALID: i32 = 1;
/// The conversation stopped at the round limit or its deadline.
pub const LIMIT: i32 = 2;
