//! CLI Exit Code Registry
//!
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Description                                  |
//! |------|----------------------------------------------|
//! | 0    | Success                                      |
//! | 1    | General error (save failed, watcher failed)  |
//! | 2    | Usage error (bad key or value)               |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - settings could not be saved or watched.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - unknown value for a settings key.
pub const EXIT_USAGE: u8 = 2;
