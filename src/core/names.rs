//! Build name validation
//!
//! Build names become artifact file names, so anything that could escape the
//! artifact directory is rejected before any filesystem or registry access.

use regex::Regex;
use std::sync::OnceLock;

use crate::config::defaults::MAX_BUILD_NAME_LEN;
use crate::error::BuildError;

fn allowed_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_-]+$").expect("Invalid build name pattern")
    })
}

/// Check a build name against the allow-list
///
/// Accepts ASCII letters, digits, `_` and `-`, up to
/// [`MAX_BUILD_NAME_LEN`] characters. Path separators, dots and therefore
/// traversal sequences are never accepted.
pub fn validate_build_name(name: &str) -> Result<(), BuildError> {
    let reject = |reason: &str| {
        Err(BuildError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    if name.is_empty() {
        return reject("name must not be empty");
    }
    if name.len() > MAX_BUILD_NAME_LEN {
        return reject("name is too long");
    }
    if !allowed_pattern().is_match(name) {
        return reject("only letters, digits, '_' and '-' are allowed");
    }
    Ok(())
}
