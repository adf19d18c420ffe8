//! Result type alias for Karst

use super::errors::KarstError;

/// Result type alias for Karst operations
///
/// # Examples
///
/// ```
/// use karst::domain::result::Result;
/// use karst::domain::errors::KarstError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(KarstError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, KarstError>;
