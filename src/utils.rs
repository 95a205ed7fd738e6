//! # Utility Functions Module
//!
//! Helpers for building argument lists for external tools.

use std::ffi::{OsStr, OsString};

/// Collects anything path- or string-like into owned `OsString` arguments.
///
/// Paths are passed through untouched, so file names that are not valid
/// UTF-8 still reach the external tool intact.
///
/// # Example
/// ```ignore
/// let args = to_os_args([input.as_os_str(), OsStr::new("-resize"), output.as_os_str()]);
/// ```
pub fn to_os_args<T, I>(items: I) -> Vec<OsString>
where
    T: AsRef<OsStr>,
    I: IntoIterator<Item = T>,
{
    items.into_iter().map(|item| item.as_ref().to_os_string()).collect()
}

/// Builds an argument vector from mixed `&str`, `String`, `&Path` and `PathBuf` items.
///
/// # Example
/// ```ignore
/// let args = tool_args![&input, "-quality", quality.to_string(), &output];
/// ```
#[macro_export]
macro_rules! tool_args {
    [$($item:expr),* $(,)?] => {
        vec![$(::std::ffi::OsString::from(::std::convert::AsRef::<::std::ffi::OsStr>::as_ref(&$item))),*]
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_to_os_args_keeps_paths() {
        let input = Path::new("/photos/a b.jpg");
        let result = to_os_args([input.as_os_str(), OsStr::new("-strip")]);
        assert_eq!(result, vec![OsString::from("/photos/a b.jpg"), OsString::from("-strip")]);
    }

    #[test]
    fn test_to_os_args_empty() {
        let result = to_os_args(Vec::<&str>::new());
        assert!(result.is_empty());
    }

    #[test]
    fn test_tool_args_macro_mixes_types() {
        let quality = 75;
        let output = Path::new("/tmp/out.webp").to_path_buf();
        let result = tool_args!["-quality", quality.to_string(), output];
        assert_eq!(
            result,
            vec![
                OsString::from("-quality"),
                OsString::from("75"),
                OsString::from("/tmp/out.webp"),
            ]
        );
    }
}
