use std::ffi::{CStr, c_char, c_int};
use std::path::Path;

use libloading::Library;

use super::NativeBackend;
use crate::error::{ConverterError, Result};

/// Exported name of the conversion entry point.
pub const CONVERT_SYMBOL: &str = "ConvertToTiff";

/// Exported name of the metadata entry point.
pub const METADATA_SYMBOL: &str = "GetMetadataJSON";

type ConvertFn = unsafe extern "C" fn(*const c_char, *const c_char) -> c_int;
type MetadataFn = unsafe extern "C" fn(*const c_char, *mut c_char, c_int) -> c_int;

/// The converter library loaded with `libloading`.
///
/// Both entry points are resolved once at load time. The function pointers
/// stay valid for as long as `_library` is alive, which is the lifetime of
/// this value.
pub struct NativeLibrary {
    name: String,
    convert: ConvertFn,
    metadata: MetadataFn,
    _library: Library,
}

impl NativeLibrary {
    /// Load the library at `path` and bind its two exports.
    ///
    /// With `search_library_dir` set, the library's own dependencies (vendor
    /// SDK, image codecs) are looked up in the directory that holds it. On
    /// Windows this is done with load flags scoped to this one load call, so
    /// no process-wide search path is modified. On Unix the dynamic loader
    /// already honors the library's rpath and the flag has no effect.
    pub fn load(path: &Path, search_library_dir: bool) -> Result<Self> {
        if !path.is_file() {
            return Err(ConverterError::LibraryNotFound(path.to_path_buf()));
        }
        let path = std::path::absolute(path)?;

        log::debug!("Loading native library {}", path.display());
        let library = open(&path, search_library_dir).map_err(|source| {
            ConverterError::LibraryLoad {
                path: path.clone(),
                source,
            }
        })?;

        // SAFETY: the signatures match the exported C functions
        // `int ConvertToTiff(const char*, const char*)` and
        // `int GetMetadataJSON(const char*, char*, int)`.
        let convert = unsafe { library.get::<ConvertFn>(CONVERT_SYMBOL.as_bytes()) }
            .map(|symbol| *symbol)
            .map_err(|source| ConverterError::MissingSymbol {
                symbol: CONVERT_SYMBOL,
                source,
            })?;
        let metadata = unsafe { library.get::<MetadataFn>(METADATA_SYMBOL.as_bytes()) }
            .map(|symbol| *symbol)
            .map_err(|source| ConverterError::MissingSymbol {
                symbol: METADATA_SYMBOL,
                source,
            })?;

        log::info!("Loaded native converter: {}", path.display());
        Ok(Self {
            name: path.display().to_string(),
            convert,
            metadata,
            _library: library,
        })
    }
}

impl NativeBackend for NativeLibrary {
    fn name(&self) -> &str {
        &self.name
    }

    fn convert_to_tiff(&self, input: &CStr, output: &CStr) -> i32 {
        // SAFETY: both pointers come from live `CStr`s, NUL-terminated and
        // valid for the duration of the call.
        unsafe { (self.convert)(input.as_ptr(), output.as_ptr()) }
    }

    fn metadata_json(&self, input: &CStr, buffer: &mut [u8]) -> i32 {
        let capacity = c_int::try_from(buffer.len()).unwrap_or(c_int::MAX);
        // SAFETY: `buffer` is writable for `capacity` bytes and outlives the
        // call; the library never writes past the capacity it is given.
        unsafe {
            (self.metadata)(
                input.as_ptr(),
                buffer.as_mut_ptr().cast::<c_char>(),
                capacity,
            )
        }
    }
}

#[cfg(windows)]
fn open(path: &Path, search_library_dir: bool) -> std::result::Result<Library, libloading::Error> {
    use libloading::os::windows::{
        LOAD_LIBRARY_SEARCH_DEFAULT_DIRS, LOAD_LIBRARY_SEARCH_DLL_LOAD_DIR,
        Library as WindowsLibrary,
    };

    let flags = if search_library_dir {
        LOAD_LIBRARY_SEARCH_DLL_LOAD_DIR | LOAD_LIBRARY_SEARCH_DEFAULT_DIRS
    } else {
        0
    };
    // SAFETY: loading runs the library's initializers; the converter library
    // has no initialization side effects beyond its own globals.
    unsafe { WindowsLibrary::load_with_flags(path, flags) }.map(Library::from)
}

#[cfg(unix)]
fn open(path: &Path, _search_library_dir: bool) -> std::result::Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_LOCAL, RTLD_NOW};

    // RTLD_NOW surfaces unresolved dependencies here instead of at first call.
    // SAFETY: see the Windows variant.
    unsafe { UnixLibrary::open(Some(path), RTLD_NOW | RTLD_LOCAL) }.map(Library::from)
}
