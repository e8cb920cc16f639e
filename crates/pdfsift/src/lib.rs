//! pdfsift: text reconstruction and pattern location for PDF pages.
//!
//! This is the public API facade. It re-exports the types from
//! pdfsift-core and drives the pdfsift-parse interpreter.
//!
//! # Architecture
//!
//! - **pdfsift-core**: geometry, graphics state, text runs, assembly, search
//! - **pdfsift-parse**: lopdf access, tokenizer, fonts, operators, interpreter
//! - **pdfsift** (this crate): [`Pdf`], page text and multi-page search
//!
//! ```ignore
//! use pdfsift::{Pdf, SearchOptions};
//!
//! let pdf = Pdf::open(&bytes, None)?;
//! let text = pdf.extract_text(1)?;
//! let report = pdf.search_file("invoice", &SearchOptions::default())?;
//! ```

mod pdf;
mod report;

pub use pdf::Pdf;
pub use report::{PageFailure, SearchReport};

pub use pdfsift_core;
pub use pdfsift_core::{
    BBox, ExtractOptions, MatchedPattern, PdfError, RestorePolicy, SearchOptions,
};
pub use pdfsift_parse;
