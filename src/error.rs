use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading the native converter or processing an image.
///
/// The library-level variants ([`LibraryNotFound`](Self::LibraryNotFound),
/// [`LibraryLoad`](Self::LibraryLoad), [`MissingSymbol`](Self::MissingSymbol))
/// are fatal: nothing can be converted without the library. Everything else
/// concerns a single file and the batch moves on to the next one.
#[derive(Error, Debug)]
pub enum ConverterError {
    #[error("Native library not found at {}", .0.display())]
    LibraryNotFound(PathBuf),

    #[error("Failed to load native library {}: {source}", path.display())]
    LibraryLoad {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("Native library is missing symbol `{symbol}`: {source}")]
    MissingSymbol {
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },

    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Path cannot be passed to the native library (not UTF-8 or contains NUL): {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("Conversion failed for {} (status {code})", path.display())]
    ConversionFailed { path: PathBuf, code: i32 },

    #[error("Metadata unavailable for {} (status {code})", path.display())]
    MetadataUnavailable { path: PathBuf, code: i32 },

    #[error("Metadata for {} is empty (null document)", .0.display())]
    MetadataEmpty(PathBuf),

    #[error("Metadata for {} does not fit in {capacity} bytes", path.display())]
    MetadataTooLarge { path: PathBuf, capacity: usize },

    #[error("Metadata for {} is not valid JSON: {source}", path.display())]
    MetadataInvalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConverterError {
    /// Whether the error aborts the whole run rather than a single file.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::LibraryNotFound(_) | Self::LibraryLoad { .. } | Self::MissingSymbol { .. }
        )
    }
}

/// Result type for converter operations.
pub type Result<T> = std::result::Result<T, ConverterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_errors_are_fatal() {
        assert!(ConverterError::LibraryNotFound(PathBuf::from("libs/x.dll")).is_fatal());
    }

    #[test]
    fn per_file_errors_are_recoverable() {
        let errors = [
            ConverterError::InputNotFound(PathBuf::from("a.jpg")),
            ConverterError::ConversionFailed { path: PathBuf::from("a.jpg"), code: -2 },
            ConverterError::MetadataUnavailable { path: PathBuf::from("a.jpg"), code: -1 },
            ConverterError::MetadataTooLarge { path: PathBuf::from("a.jpg"), capacity: 64 },
            ConverterError::MetadataEmpty(PathBuf::from("a.jpg")),
        ];
        for err in &errors {
            assert!(!err.is_fatal(), "{err} should not be fatal");
        }
    }

    #[test]
    fn conversion_failure_reports_code() {
        let err = ConverterError::ConversionFailed { path: PathBuf::from("IRX_1.JPG"), code: -3 };
        assert_eq!(err.to_string(), "Conversion failed for IRX_1.JPG (status -3)");
    }
}
