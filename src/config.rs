use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for ir2tif.
///
/// Controls where the native converter library lives, how much buffer space
/// metadata extraction may use, which input files are picked up, and how
/// outputs are named.
///
/// # Loading
///
/// ```rust,no_run
/// use ir2tif::config::Config;
///
/// // From a JSON file (missing sections fall back to defaults)
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.library.path = Some("/opt/autel/libir_converter.so".into());
/// config.metadata.initial_capacity = 10 * 1024;
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Native converter library location and loading behavior.
    pub library: LibraryConfig,
    /// Metadata buffer sizing.
    pub metadata: MetadataConfig,
    /// Input file selection for directory mode.
    pub input: InputConfig,
    /// Output naming and formatting.
    pub output: OutputConfig,
}

/// Where to find the native converter library.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Explicit path to the library file. Overrides `dir` + `name`.
    pub path: Option<PathBuf>,
    /// Base name of the library; the platform prefix/suffix is added
    /// (`ir_converter` → `ir_converter.dll`, `libir_converter.so`, ...).
    pub name: String,
    /// Directory holding the library, relative to the executable's directory.
    pub dir: String,
    /// Resolve the library's own dependencies from its directory.
    pub search_library_dir: bool,
}

/// Buffer sizing for `GetMetadataJSON`.
///
/// The buffer starts at `initial_capacity` and doubles up to `max_capacity`
/// whenever the library reports it is too small.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub initial_capacity: usize,
    pub max_capacity: usize,
    /// Status code meaning "buffer too small". `None` treats every non-zero
    /// status as an opaque failure.
    pub insufficient_capacity_code: Option<i32>,
}

/// Which files directory mode picks up.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Extensions without the dot, matched case-insensitively.
    pub extensions: Vec<String>,
}

/// Output naming and JSON formatting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub tiff_extension: String,
    /// Appended to the input stem for the single-file metadata sidecar.
    pub sidecar_suffix: String,
    /// File name of the combined metadata written in directory mode.
    pub aggregate_file_name: String,
    /// Spaces per indentation level in written JSON.
    pub indent: usize,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            path: None,
            name: "ir_converter".to_string(),
            dir: "libs".to_string(),
            search_library_dir: true,
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 20 * 1024,
            max_capacity: 1024 * 1024,
            insufficient_capacity_code: Some(-2),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["jpg".to_string(), "jpeg".to_string()],
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            tiff_extension: "tif".to_string(),
            sidecar_suffix: "_meta.json".to_string(),
            aggregate_file_name: "dataset_metadata.json".to_string(),
            indent: 4,
        }
    }
}

impl Config {
    /// Resolve the config file path — same directory as the executable.
    pub fn config_path() -> Result<PathBuf> {
        Ok(exe_dir()?.join("config.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Reject settings the converter cannot work with.
    pub fn validate(&self) -> Result<()> {
        let meta = &self.metadata;
        if meta.initial_capacity == 0 {
            anyhow::bail!("metadata.initial_capacity must be greater than zero");
        }
        if meta.max_capacity < meta.initial_capacity {
            anyhow::bail!(
                "metadata.max_capacity ({}) is smaller than metadata.initial_capacity ({})",
                meta.max_capacity,
                meta.initial_capacity
            );
        }
        if meta.max_capacity > i32::MAX as usize {
            anyhow::bail!("metadata.max_capacity cannot exceed {} bytes", i32::MAX);
        }
        if self.input.extensions.iter().all(|e| e.trim().is_empty()) {
            anyhow::bail!("input.extensions must list at least one extension");
        }
        if self.output.tiff_extension.is_empty() {
            anyhow::bail!("output.tiff_extension must not be empty");
        }
        Ok(())
    }

    /// Path of the native library: `library.path` if set, otherwise
    /// `<executable dir>/<library.dir>/<platform file name>`.
    pub fn library_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.library.path {
            return Ok(path.clone());
        }
        Ok(self.library_path_in(&exe_dir()?))
    }

    /// Library path relative to an explicit base directory.
    pub fn library_path_in(&self, base: &Path) -> PathBuf {
        base.join(&self.library.dir)
            .join(libloading::library_filename(&self.library.name))
    }
}

fn exe_dir() -> Result<PathBuf> {
    let exe_path = std::env::current_exe().context("Failed to get executable path")?;
    let exe_dir = exe_path
        .parent()
        .context("Failed to get executable directory")?;
    Ok(exe_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_bundled_library() {
        let config = Config::default();
        assert_eq!(config.metadata.initial_capacity, 20480);
        assert_eq!(config.metadata.insufficient_capacity_code, Some(-2));
        assert_eq!(config.input.extensions, vec!["jpg", "jpeg"]);
        assert_eq!(config.output.aggregate_file_name, "dataset_metadata.json");
        assert_eq!(config.output.indent, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.json"))).unwrap();
        assert_eq!(config.library.name, "ir_converter");
    }

    #[test]
    fn load_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "metadata": { "initial_capacity": 4096 } }"#).unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.metadata.initial_capacity, 4096);
        assert_eq!(config.metadata.max_capacity, 1024 * 1024);
        assert_eq!(config.output.tiff_extension, "tif");
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let mut config = Config::default();
        config.library.path = Some("/opt/ir/libir_converter.so".into());
        config.save(Some(&path)).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(
            loaded.library.path.as_deref(),
            Some(Path::new("/opt/ir/libir_converter.so"))
        );
    }

    #[test]
    fn load_rejects_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn validate_rejects_inverted_capacities() {
        let mut config = Config::default();
        config.metadata.max_capacity = 1024;
        assert!(config.validate().is_err());

        config.metadata.initial_capacity = 0;
        config.metadata.max_capacity = 1024;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_extensions() {
        let mut config = Config::default();
        config.input.extensions.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn library_path_prefers_explicit_path() {
        let mut config = Config::default();
        config.library.path = Some("custom/conv.dll".into());
        assert_eq!(config.library_path().unwrap(), PathBuf::from("custom/conv.dll"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn library_path_keeps_non_utf8_bytes() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let raw = OsStr::from_bytes(b"/opt/ir/lib\xffconv.so");
        let mut config = Config::default();
        config.library.path = Some(PathBuf::from(raw));
        assert_eq!(config.library_path().unwrap().as_os_str(), raw);
    }

    #[test]
    fn library_path_in_uses_platform_file_name() {
        let config = Config::default();
        let path = config.library_path_in(Path::new("/app"));
        assert_eq!(
            path,
            Path::new("/app/libs").join(libloading::library_filename("ir_converter"))
        );
    }
}
