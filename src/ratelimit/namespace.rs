//! Namespace validation.

use crate::error::{Result, ThrottleError};

/// Check that a namespace is usable as a throttling key.
///
/// Any non-blank string without control characters is accepted; the content
/// is otherwise opaque to the limiter.
pub fn validate_namespace(namespace: &str) -> Result<()> {
    if namespace.trim().is_empty() {
        return Err(ThrottleError::InvalidArgument(
            "namespace must not be empty".to_string(),
        ));
    }
    if namespace.chars().any(char::is_control) {
        return Err(ThrottleError::InvalidArgument(format!(
            "namespace {:?} contains control characters",
            namespace
        )));
    }
    Ok(())
}
