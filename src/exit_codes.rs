//! Exit code constants for the session-lock CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config)
//! - 3: Filesystem or signal setup failure
//! - 4: Lock acquisition failure (contention timeout)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments or an invalid configuration file.
pub const USER_ERROR: i32 = 1;

/// I/O failure: lock directory, lock file, or signal listener could not be set up.
pub const IO_FAILURE: i32 = 3;

/// Lock acquisition failure: the session file stayed locked until the timeout.
pub const LOCK_FAILURE: i32 = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [SUCCESS, USER_ERROR, IO_FAILURE, LOCK_FAILURE];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }

    #[test]
    fn lock_failure_keeps_its_value() {
        assert_eq!(SUCCESS, 0);
        assert_eq!(LOCK_FAILURE, 4);
    }
}
