//! # Libroteca Extract
//!
//! PDF handling for the enrichment pipeline: streaming downloads into the
//! scratch directory, structural inspection and text extraction with lopdf,
//! first-page rasterization through poppler, and the orchestration that
//! turns a stored record plus a download URL into a full detail row.

pub mod download;
pub mod pdf;
pub mod pipeline;
pub mod raster;

pub use download::Downloader;
pub use pdf::PdfSummary;
pub use pipeline::{normalize_description, DetailExtractor};
pub use raster::PdftoppmRasterizer;
