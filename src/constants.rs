/// Number of data-memory words the driver allocates by default.
pub const DATA_MEMORY_WORDS: usize = 1000;

/// Default cap on executed instructions before the driver gives up on a
/// run that does not reach `HALT`.
pub const DEFAULT_INSTR_LIMIT: u64 = 1500;
