//! The boundary to the native converter.
//!
//! The rest of the crate only sees [`NativeBackend`], a two-function contract
//! mirroring the C exports of the converter library:
//!
//! ```c
//! int ConvertToTiff(const char* inputPath, const char* outputPath);
//! int GetMetadataJSON(const char* inputPath, char* buffer, int bufferLen);
//! ```
//!
//! [`NativeLibrary`] binds those exports at runtime. Anything else that honors
//! the same contract (a statically linked build, a test double) can stand in.

mod library;

pub use library::{CONVERT_SYMBOL, METADATA_SYMBOL, NativeLibrary};

use std::ffi::CStr;

/// Status code the native library returns on success.
pub const STATUS_OK: i32 = 0;

/// A converter exposing the `ConvertToTiff` / `GetMetadataJSON` contract.
///
/// Status codes are passed through untouched: `0` is success and every other
/// value is implementation-defined.
pub trait NativeBackend: Send + Sync {
    /// A display name for logs (usually the library path).
    fn name(&self) -> &str;

    /// Convert `input` to a TIFF written at `output`.
    fn convert_to_tiff(&self, input: &CStr, output: &CStr) -> i32;

    /// Write the metadata of `input` into `buffer` as a NUL-terminated JSON
    /// string. `buffer.len()` is the capacity handed to the library.
    fn metadata_json(&self, input: &CStr, buffer: &mut [u8]) -> i32;
}
