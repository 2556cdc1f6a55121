use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::converter::{ConversionRequest, MetadataDocument, ThermalConverter};
use crate::error::Result;

/// Metadata of every image in a directory run, keyed by source file name.
///
/// A `BTreeMap` keeps the written JSON in a stable order, so repeated runs
/// over the same inputs produce identical files.
pub type AggregateMetadata = BTreeMap<String, MetadataDocument>;

/// How an input path is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// A single image; metadata goes to a `<stem>_meta.json` sidecar.
    File,
    /// A directory of images; metadata goes to one aggregate file.
    Directory,
    /// Neither a file nor a directory. Nothing is written.
    Invalid,
}

impl InputMode {
    /// Classify `path` by what it points to on disk.
    pub fn of(path: &Path) -> Self {
        if path.is_file() {
            Self::File
        } else if path.is_dir() {
            Self::Directory
        } else {
            Self::Invalid
        }
    }
}

/// What happened to one input image.
#[derive(Debug)]
pub struct FileOutcome {
    pub source: PathBuf,
    /// The TIFF written by the native library, if conversion succeeded.
    pub tiff: Option<PathBuf>,
    pub metadata: Option<MetadataDocument>,
    /// Why conversion failed.
    pub error: Option<String>,
    /// Why metadata extraction failed (conversion may still have succeeded).
    pub metadata_error: Option<String>,
}

impl FileOutcome {
    pub fn converted(&self) -> bool {
        self.tiff.is_some()
    }

    /// The file name used as the aggregate key.
    pub fn file_name(&self) -> String {
        self.source
            .file_name()
            .unwrap_or(self.source.as_os_str())
            .to_string_lossy()
            .into_owned()
    }
}

/// The result of one batch run.
#[derive(Debug)]
pub struct BatchReport {
    pub mode: InputMode,
    pub outcomes: Vec<FileOutcome>,
    /// Metadata sidecar written in single-file mode.
    pub sidecar: Option<PathBuf>,
    /// Aggregate metadata file written in directory mode.
    pub aggregate: Option<PathBuf>,
}

impl BatchReport {
    fn empty(mode: InputMode) -> Self {
        Self {
            mode,
            outcomes: Vec::new(),
            sidecar: None,
            aggregate: None,
        }
    }

    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn converted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.converted()).count()
    }

    pub fn with_metadata(&self) -> usize {
        self.outcomes.iter().filter(|o| o.metadata.is_some()).count()
    }
}

/// Run a batch over `input` (a file or a directory), writing into `output_dir`.
///
/// Per-file failures are logged and recorded in the report; the batch keeps
/// going. Only failures to create `output_dir` or write the metadata JSON are
/// returned as errors. An input that is neither a file nor a directory is
/// reported and leaves the filesystem untouched.
///
/// # Example
///
/// ```rust,no_run
/// use ir2tif::config::Config;
/// use ir2tif::converter::ThermalConverter;
/// use ir2tif::pipeline::run_batch;
/// use std::path::Path;
///
/// # fn main() -> anyhow::Result<()> {
/// let config = Config::load(None)?;
/// let converter = ThermalConverter::from_config(&config)?;
/// let report = run_batch(&converter, Path::new("flight_01"), Path::new("tiffs"), &config)?;
/// println!("{} of {} converted", report.converted(), report.processed());
/// # Ok(())
/// # }
/// ```
pub fn run_batch(
    converter: &ThermalConverter,
    input: &Path,
    output_dir: &Path,
    config: &Config,
) -> Result<BatchReport> {
    let mode = InputMode::of(input);
    let mut report = BatchReport::empty(mode);

    match mode {
        InputMode::Invalid => {
            log::error!("Invalid input path: {}", input.display());
            return Ok(report);
        }
        InputMode::File => {
            std::fs::create_dir_all(output_dir)?;
            log::info!("Processing single file: {}", input.display());

            let outcome = process_image(converter, input, output_dir, config);
            if let Some(ref meta) = outcome.metadata {
                let path = sidecar_path(input, output_dir, &config.output.sidecar_suffix);
                write_json(&path, meta, config.output.indent)?;
                log::info!("Saved metadata: {}", path.display());
                report.sidecar = Some(path);
            }
            report.outcomes.push(outcome);
        }
        InputMode::Directory => {
            std::fs::create_dir_all(output_dir)?;
            log::info!("Processing folder: {}", input.display());

            let images = collect_images(input, &config.input.extensions);
            let total = images.len();
            let mut aggregate = AggregateMetadata::new();

            for (i, image_path) in images.iter().enumerate() {
                log::info!("[{}/{}] Processing: {}", i + 1, total, image_path.display());
                let outcome = process_image(converter, image_path, output_dir, config);
                if let Some(ref meta) = outcome.metadata {
                    aggregate.insert(outcome.file_name(), meta.clone());
                }
                report.outcomes.push(outcome);
            }

            if !aggregate.is_empty() {
                let path = output_dir.join(&config.output.aggregate_file_name);
                write_json(&path, &aggregate, config.output.indent)?;
                log::info!("Saved aggregated metadata to: {}", path.display());
                report.aggregate = Some(path);
            }
        }
    }

    log::info!(
        "Done: processed {} images, {} converted, {} with metadata",
        report.processed(),
        report.converted(),
        report.with_metadata()
    );
    Ok(report)
}

/// Convert one image into `output_dir` and, if that succeeded, fetch its
/// metadata.
pub fn process_image(
    converter: &ThermalConverter,
    path: &Path,
    output_dir: &Path,
    config: &Config,
) -> FileOutcome {
    let mut outcome = FileOutcome {
        source: path.to_path_buf(),
        tiff: None,
        metadata: None,
        error: None,
        metadata_error: None,
    };

    let request = ConversionRequest::new(path, output_dir, &config.output.tiff_extension);
    match converter.convert_image(&request) {
        Ok(tiff) => {
            log::info!("  Converted: {}", tiff.display());
            outcome.tiff = Some(tiff);
        }
        Err(e) => {
            log::warn!("  Failed: {e}");
            outcome.error = Some(e.to_string());
            return outcome;
        }
    }

    match converter.get_metadata(path) {
        Ok(meta) => outcome.metadata = Some(meta),
        Err(e) => {
            log::warn!("  No metadata: {e}");
            outcome.metadata_error = Some(e.to_string());
        }
    }

    outcome
}

/// Collect the images directly inside `dir` whose extension is in
/// `extensions` (case-insensitive), sorted and without duplicates.
///
/// Subdirectories are not descended into.
pub fn collect_images(dir: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut images: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_supported_image(p, extensions))
        .collect();

    images.sort();
    images.dedup();
    images
}

/// Check if a file has one of the given extensions.
fn is_supported_image(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// `<output_dir>/<input stem><suffix>`.
fn sidecar_path(input: &Path, output_dir: &Path, suffix: &str) -> PathBuf {
    let mut name = input.file_stem().unwrap_or(input.as_os_str()).to_os_string();
    name.push(suffix);
    output_dir.join(name)
}

/// Write `value` as pretty-printed JSON with `indent` spaces per level,
/// replacing any existing file.
fn write_json<T: Serialize>(path: &Path, value: &T, indent: usize) -> Result<()> {
    let indent = " ".repeat(indent);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut ser)
        .map_err(std::io::Error::from)?;
    std::fs::write(path, buf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn jpg_extensions() -> Vec<String> {
        vec!["jpg".to_string(), "jpeg".to_string()]
    }

    // ── InputMode ────────────────────────────────────────────────────

    #[test]
    fn input_mode_classifies_paths() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.jpg");
        fs::write(&file, b"x").unwrap();

        assert_eq!(InputMode::of(&file), InputMode::File);
        assert_eq!(InputMode::of(dir.path()), InputMode::Directory);
        assert_eq!(InputMode::of(&dir.path().join("missing")), InputMode::Invalid);
    }

    // ── is_supported_image ───────────────────────────────────────────

    #[test]
    fn supported_extensions_any_case() {
        let exts = jpg_extensions();
        assert!(is_supported_image(Path::new("a.jpg"), &exts));
        assert!(is_supported_image(Path::new("A.JPG"), &exts));
        assert!(is_supported_image(Path::new("b.JpEg"), &exts));
    }

    #[test]
    fn unsupported_extensions() {
        let exts = jpg_extensions();
        assert!(!is_supported_image(Path::new("a.tif"), &exts));
        assert!(!is_supported_image(Path::new("a.png"), &exts));
        assert!(!is_supported_image(Path::new("jpg"), &exts));
        assert!(!is_supported_image(Path::new("noext"), &exts));
    }

    // ── collect_images ───────────────────────────────────────────────

    #[test]
    fn collect_images_keeps_case_variants_distinct() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        fs::write(dir.path().join("b.JPEG"), b"x").unwrap();
        fs::write(dir.path().join("c.txt"), b"x").unwrap();
        fs::write(dir.path().join("d.Jpg"), b"x").unwrap();

        let names: Vec<String> = collect_images(dir.path(), &jpg_extensions())
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.JPEG", "d.Jpg"]);
    }

    #[test]
    fn collect_images_is_not_recursive() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(dir.path().join("top.jpg"), b"x").unwrap();
        fs::write(sub.join("deep.jpg"), b"x").unwrap();

        let images = collect_images(dir.path(), &jpg_extensions());
        assert_eq!(images, vec![dir.path().join("top.jpg")]);
    }

    #[test]
    fn collect_images_skips_directories_named_like_images() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("folder.jpg")).unwrap();
        assert!(collect_images(dir.path(), &jpg_extensions()).is_empty());
    }

    #[test]
    fn collect_images_empty_dir() {
        let dir = TempDir::new().unwrap();
        assert!(collect_images(dir.path(), &jpg_extensions()).is_empty());
    }

    // ── output naming ────────────────────────────────────────────────

    #[test]
    fn sidecar_uses_stem_and_suffix() {
        assert_eq!(
            sidecar_path(Path::new("in/IRX_4552.JPG"), Path::new("out"), "_meta.json"),
            PathBuf::from("out/IRX_4552_meta.json")
        );
    }

    #[test]
    fn write_json_uses_requested_indent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.json");
        let value = serde_json::json!({ "stats": { "min": 1 } });

        write_json(&path, &value, 4).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\n    \"stats\": {\n        \"min\": 1\n    }\n}");
    }

    #[test]
    fn write_json_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.json");
        fs::write(&path, "old contents that are longer than the new ones").unwrap();

        write_json(&path, &serde_json::json!([]), 4).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
    }
}
