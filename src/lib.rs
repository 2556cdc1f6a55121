//! # ir2tif
//!
//! Batch conversion of radiometric thermal JPGs to TIFF through a native
//! converter library. The library does the thermal decoding and TIFF encoding;
//! this crate loads it, feeds it files, and collects the metadata it reports
//! into JSON.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ir2tif::config::Config;
//! use ir2tif::converter::ThermalConverter;
//! use ir2tif::pipeline::run_batch;
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     // Load config (library location, buffer sizes, output names)
//!     let config = Config::load(Some("config.json".as_ref()))?;
//!
//!     // Load the native library; failing here is fatal
//!     let converter = ThermalConverter::from_config(&config)?;
//!
//!     // Convert a single file or every JPG in a directory
//!     let report = run_batch(&converter, Path::new("./flight"), Path::new("./out"), &config)?;
//!     println!("{}/{} converted", report.converted(), report.processed());
//!     if let Some(ref path) = report.aggregate {
//!         println!("Metadata: {}", path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Lower-Level Usage
//!
//! ```rust,no_run
//! use ir2tif::config::Config;
//! use ir2tif::converter::{ConversionRequest, ThermalConverter};
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let converter = ThermalConverter::from_config(&Config::default())?;
//! let input = Path::new("IRX_0001.JPG");
//!
//! let tiff = converter.convert_image(&ConversionRequest::new(input, Path::new("out"), "tif"))?;
//! let meta = converter.get_metadata(input)?;
//! println!("{} max temp: {}", tiff.display(), meta["stats"]["max"]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Outputs
//!
//! | Mode | Files |
//! |------|-------|
//! | Single file | `<stem>.tif`, `<stem>_meta.json` |
//! | Directory | `<stem>.tif` per image, `dataset_metadata.json` |
//!
//! ## Modules
//!
//! - [`config`] — Configuration types and loading/saving
//! - [`converter`] — Typed conversion and metadata operations
//! - [`error`] — Error taxonomy
//! - [`native`] — Native library contract and loader
//! - [`pipeline`] — Batch driver, input collection, JSON output

pub mod config;
pub mod converter;
pub mod error;
pub mod native;
pub mod pipeline;

pub use error::{ConverterError, Result};
