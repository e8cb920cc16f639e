//! pdfsift-parse: lopdf-backed content stream interpretation.
//!
//! Tokenizes page content streams, loads fonts and ToUnicode maps, and runs
//! the [`ContentStreamProcessor`] over them with one of two handlers:
//! [`TextExtractor`] to reconstruct text per marked-content context, or
//! [`TextLocator`] to box pattern matches. Depends on pdfsift-core for the
//! shared data types.

pub mod cmap;
pub mod error;
pub mod font;
pub mod handler;
pub mod lopdf_backend;
pub mod operators;
pub mod processor;
pub mod standard_fonts;
pub mod tokenizer;

pub use cmap::ToUnicodeCMap;
pub use error::{BackendError, ContentStreamError};
pub use font::{DocumentFont, load_font};
pub use handler::{ContentHandler, MarkedContentStack, TextExtractor, TextLocator};
pub use lopdf_backend::{LopdfBackend, LopdfDocument, PAGE_CONTEXT};
pub use operators::{ContentOperator, FnOperator, OperatorFn, OperatorTable};
pub use pdfsift_core;
pub use processor::{ContentStreamProcessor, TextObject};
pub use tokenizer::{Operand, Operator, tokenize};
