//! Migration name sanitization.
//!
//! Names given to `migrate create` end up inside filenames, so they are
//! reduced to lowercase ASCII letters, digits and single hyphens.

/// Maximum filename length for most filesystems.
const MAX_FILENAME_LENGTH: usize = 255;

/// Errors from filename validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilenameError {
    #[error("Filename too long ({length} chars, max {max})")]
    TooLong { length: usize, max: usize },
}

/// Sanitize a migration name.
///
/// Applies the following transformations in order:
/// 1. Lowercase
/// 2. Whitespace runs → a single hyphen
/// 3. Characters outside `[a-z0-9-]` removed
/// 4. Multiple hyphens collapsed to one
/// 5. Leading/trailing hyphens trimmed
///
/// May return an empty string; callers decide how to treat that.
pub fn sanitize(input: &str) -> String {
    let lowered = input.trim().to_lowercase();

    let mut result = String::with_capacity(lowered.len());
    let mut last_was_hyphen = false;

    for c in lowered.chars() {
        if c.is_whitespace() || c == '-' {
            if !last_was_hyphen {
                result.push('-');
                last_was_hyphen = true;
            }
        } else if c.is_ascii_lowercase() || c.is_ascii_digit() {
            result.push(c);
            last_was_hyphen = false;
        }
    }

    result.trim_matches('-').to_string()
}

/// Validates that a final filename doesn't exceed filesystem limits.
pub fn validate_length(filename: &str) -> Result<(), FilenameError> {
    if filename.len() > MAX_FILENAME_LENGTH {
        Err(FilenameError::TooLong {
            length: filename.len(),
            max: MAX_FILENAME_LENGTH,
        })
    } else {
        Ok(())
    }
}
