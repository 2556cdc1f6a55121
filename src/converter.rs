use std::ffi::CString;
use std::path::{Path, PathBuf};

use crate::config::{Config, MetadataConfig};
use crate::error::{ConverterError, Result};
use crate::native::{NativeBackend, NativeLibrary, STATUS_OK};

/// Metadata for one image as returned by the native library.
///
/// The schema belongs to the library (the bundled one emits a `stats` object
/// with `min`/`max`/`avg` temperatures and a `metadata` object of vendor
/// tags), so it is carried through untouched.
pub type MetadataDocument = serde_json::Value;

/// One input image and the TIFF it should become.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl ConversionRequest {
    /// Build a request writing `<output_dir>/<input stem>.<tiff_extension>`.
    ///
    /// ```rust
    /// use ir2tif::converter::ConversionRequest;
    /// use std::path::Path;
    ///
    /// let req = ConversionRequest::new(Path::new("in/IRX_0001.JPG"), Path::new("out"), "tif");
    /// assert_eq!(req.output, Path::new("out/IRX_0001.tif"));
    /// ```
    pub fn new(input: &Path, output_dir: &Path, tiff_extension: &str) -> Self {
        let stem = input.file_stem().unwrap_or(input.as_os_str());
        let mut file_name = stem.to_os_string();
        file_name.push(".");
        file_name.push(tiff_extension);
        Self {
            input: input.to_path_buf(),
            output: output_dir.join(file_name),
        }
    }
}

/// Typed front for a [`NativeBackend`].
///
/// Validates inputs, marshals paths to C strings, maps status codes to
/// [`ConverterError`]s and manages the metadata buffer.
pub struct ThermalConverter {
    backend: Box<dyn NativeBackend>,
    metadata: MetadataConfig,
}

impl ThermalConverter {
    pub fn new(backend: Box<dyn NativeBackend>, metadata: MetadataConfig) -> Self {
        Self { backend, metadata }
    }

    /// Load the native library named by `config` and wrap it.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let path = config.library_path()?;
        let library = NativeLibrary::load(&path, config.library.search_library_dir)?;
        Ok(Self::new(Box::new(library), config.metadata.clone()))
    }

    /// Name of the underlying backend.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Convert one image. The TIFF itself is written by the native library;
    /// on success the path it was asked to write is returned.
    pub fn convert_image(&self, request: &ConversionRequest) -> Result<PathBuf> {
        let input = input_cstring(&request.input)?;
        let output = path_cstring(&request.output)?;

        let code = self.backend.convert_to_tiff(&input, &output);
        log::debug!(
            "{} returned {code} for {}",
            crate::native::CONVERT_SYMBOL,
            request.input.display()
        );
        if code != STATUS_OK {
            return Err(ConverterError::ConversionFailed {
                path: request.input.clone(),
                code,
            });
        }
        Ok(request.output.clone())
    }

    /// Extract the metadata document of one image.
    ///
    /// A JSON `null` counts as no metadata and yields
    /// [`ConverterError::MetadataEmpty`].
    ///
    /// The buffer grows (doubling, up to `max_capacity`) when the library
    /// reports the insufficient-capacity status or returns success without a
    /// NUL terminator inside the buffer.
    pub fn get_metadata(&self, input_path: &Path) -> Result<MetadataDocument> {
        let input = input_cstring(input_path)?;
        let mut capacity = self.metadata.initial_capacity.max(1);

        loop {
            let mut buffer = vec![0u8; capacity];
            let code = self.backend.metadata_json(&input, &mut buffer);
            log::debug!(
                "{} returned {code} for {} (capacity {capacity})",
                crate::native::METADATA_SYMBOL,
                input_path.display()
            );

            let payload = match code {
                STATUS_OK => buffer.iter().position(|&b| b == 0).map(|end| &buffer[..end]),
                code if Some(code) == self.metadata.insufficient_capacity_code => None,
                code => {
                    return Err(ConverterError::MetadataUnavailable {
                        path: input_path.to_path_buf(),
                        code,
                    });
                }
            };

            if let Some(json) = payload {
                let doc: MetadataDocument = serde_json::from_slice(json).map_err(|source| {
                    ConverterError::MetadataInvalid {
                        path: input_path.to_path_buf(),
                        source,
                    }
                })?;
                if doc.is_null() {
                    return Err(ConverterError::MetadataEmpty(input_path.to_path_buf()));
                }
                return Ok(doc);
            }

            if capacity >= self.metadata.max_capacity {
                return Err(ConverterError::MetadataTooLarge {
                    path: input_path.to_path_buf(),
                    capacity,
                });
            }
            capacity = capacity.saturating_mul(2).min(self.metadata.max_capacity);
            log::debug!("Metadata buffer too small, retrying with {capacity} bytes");
        }
    }
}

/// Validate that `path` exists and convert it for the C ABI.
fn input_cstring(path: &Path) -> Result<CString> {
    if !path.exists() {
        return Err(ConverterError::InputNotFound(path.to_path_buf()));
    }
    path_cstring(path)
}

/// UTF-8 encode a path as a NUL-terminated string.
fn path_cstring(path: &Path) -> Result<CString> {
    path.to_str()
        .and_then(|s| CString::new(s).ok())
        .ok_or_else(|| ConverterError::InvalidPath(path.to_path_buf()))
}
