//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Comparison ran, no differences                       |
//! | 1    | Comparison ran, differences found                    |
//! | 2    | Usage error (bad args, unreadable descriptor)        |
//! | 3    | Descriptor does not parse or fails validation        |
//! | 4    | Runtime failure (serializing or writing output)      |
//!
//! Unreadable candidate files and stores are not errors. They show up as
//! warnings and as one-sided differences.

/// Success - no differences.
pub const EXIT_SUCCESS: u8 = 0;

/// Differences found. Like `diff(1)`, exit 1 means "inputs differ."
pub const EXIT_DIFFS: u8 = 1;

/// Usage error - bad arguments, descriptor file cannot be read.
/// clap exits with the same code for argument errors.
pub const EXIT_USAGE: u8 = 2;

/// Descriptor parse or validation error.
pub const EXIT_INVALID_DESCRIPTOR: u8 = 3;

/// Output could not be serialized or written.
pub const EXIT_RUNTIME: u8 = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct_except_success() {
        let codes = [EXIT_DIFFS, EXIT_USAGE, EXIT_INVALID_DESCRIPTOR, EXIT_RUNTIME];
        for (i, a) in codes.iter().enumerate() {
            assert_ne!(*a, EXIT_SUCCESS);
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
