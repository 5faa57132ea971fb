//! # Utility Functions Module
//!
//! Small helpers for assembling optimizer command lines.

/// Builds a `Vec<String>` of command-line arguments from mixed expressions.
///
/// # Example
/// ```rust,ignore
/// use asset_optimizer::args;
///
/// let quality = 85;
/// let args = args![format!("--max={}", quality), "--all-progressive"];
/// assert_eq!(args, vec!["--max=85", "--all-progressive"]);
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        vec![$(($item).to_string()),*]
    };
}
