//! Process exit codes

/// Every resource reached a successful terminal outcome
pub const SUCCESS: i32 = 0;

/// Any unrecovered error
pub const ERROR: i32 = 1;
