//! pdfsift-core: backend-independent types for content-stream text work.
//!
//! Provides the geometry ([`Matrix`], [`Vector`], [`BBox`]), the graphics
//! state stack, the font abstraction, the text-run model ([`ParsedText`],
//! [`Word`], [`FinalText`], [`TextFragment`]), text assembly and pattern
//! location. Nothing here knows about PDF object syntax.

pub mod assembler;
pub mod error;
pub mod font;
pub mod geometry;
pub mod search;
pub mod state;
pub mod text;

pub use assembler::{MarkedUpTextAssembler, TextAssembler};
pub use error::{ExtractOptions, PdfError, RestorePolicy};
pub use font::{IDENTITY_H, PdfFont};
pub use geometry::{BBox, Matrix, Vector};
pub use search::{MatchLine, MatchedPattern, SearchOptions, SearchPattern, locate_matches};
pub use state::{GraphicsState, GraphicsStateStack, TextRenderMode};
pub use text::{FinalText, ParsedText, TextFragment, Word};
