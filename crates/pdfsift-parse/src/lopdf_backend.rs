//! lopdf-based document access and page drivers.
//!
//! [`LopdfBackend`] opens a document with [lopdf](https://crates.io/crates/lopdf),
//! locates each page's content and inherited resources, and runs a
//! [`ContentStreamProcessor`] over them in extraction or locator mode.

use std::sync::LazyLock;

use lopdf::{Dictionary, Document, Object, ObjectId};
use pdfsift_core::{
    ExtractOptions, MarkedUpTextAssembler, MatchedPattern, PdfError, SearchPattern,
    TextAssembler,
};
use tracing::debug;

use crate::error::BackendError;
use crate::handler::{TextExtractor, TextLocator};
use crate::processor::ContentStreamProcessor;

/// Root context wrapped around every extracted page.
pub const PAGE_CONTEXT: &str = "div class='t-extracted-page'";

/// A parsed PDF document backed by lopdf.
pub struct LopdfDocument {
    inner: Document,
    /// Page object ids in document order.
    page_ids: Vec<ObjectId>,
}

impl LopdfDocument {
    /// Access the underlying lopdf document.
    pub fn inner(&self) -> &Document {
        &self.inner
    }

    pub fn page_count(&self) -> u32 {
        u32::try_from(self.page_ids.len()).unwrap_or(u32::MAX)
    }

    /// Object id of a 1-based page number.
    ///
    /// # Errors
    ///
    /// [`PdfError::PageOutOfRange`] outside `1..=page_count`.
    pub fn page_id(&self, page: u32) -> Result<ObjectId, BackendError> {
        page.checked_sub(1)
            .and_then(|index| self.page_ids.get(index as usize))
            .copied()
            .ok_or_else(|| {
                BackendError::Core(PdfError::PageOutOfRange {
                    page,
                    page_count: self.page_count(),
                })
            })
    }

    /// Decoded content of a page; multiple `/Contents` streams are joined
    /// with a space.
    pub fn page_content(&self, page: u32) -> Result<Vec<u8>, BackendError> {
        let page_id = self.page_id(page)?;
        let dict = self
            .inner
            .get_object(page_id)
            .and_then(|o| o.as_dict())
            .map_err(|e| BackendError::Parse(format!("failed to get page dictionary: {e}")))?;
        page_content_bytes(&self.inner, dict)
    }

    /// The page's `/Resources`, inherited through the page tree. A page
    /// without resources gets an empty dictionary.
    pub fn page_resources(&self, page: u32) -> Result<&Dictionary, BackendError> {
        let page_id = self.page_id(page)?;
        match resolve_inherited(&self.inner, page_id, b"Resources")? {
            Some(obj) => resolve(&self.inner, obj)
                .as_dict()
                .map_err(|_| BackendError::Parse("/Resources is not a dictionary".to_string())),
            None => {
                static EMPTY_DICT: LazyLock<Dictionary> = LazyLock::new(Dictionary::new);
                Ok(&EMPTY_DICT)
            }
        }
    }
}

impl std::fmt::Debug for LopdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LopdfDocument")
            .field("page_count", &self.page_ids.len())
            .finish_non_exhaustive()
    }
}

/// The lopdf-based backend.
///
/// # Example
///
/// ```ignore
/// use pdfsift_core::ExtractOptions;
/// use pdfsift_parse::LopdfBackend;
///
/// let options = ExtractOptions::default();
/// let doc = LopdfBackend::open(pdf_bytes, &options)?;
/// let text = LopdfBackend::extract_page_text(&doc, 1, &options)?;
/// ```
pub struct LopdfBackend;

impl LopdfBackend {
    /// Parse a document from bytes.
    ///
    /// # Errors
    ///
    /// [`PdfError::ResourceLimitExceeded`] when the input is larger than
    /// `max_input_bytes`; [`BackendError::Parse`] for unreadable or
    /// encrypted documents.
    pub fn open(bytes: &[u8], options: &ExtractOptions) -> Result<LopdfDocument, BackendError> {
        if let Some(limit) = options.max_input_bytes {
            if bytes.len() > limit {
                return Err(BackendError::Core(PdfError::ResourceLimitExceeded {
                    limit_name: "max_input_bytes".to_string(),
                    limit_value: limit,
                    actual_value: bytes.len(),
                }));
            }
        }

        let inner = Document::load_mem(bytes)
            .map_err(|e| BackendError::Parse(format!("failed to parse PDF: {e}")))?;
        if inner.is_encrypted() {
            return Err(BackendError::Parse(
                "encrypted documents are not supported".to_string(),
            ));
        }

        // get_pages is keyed by 1-based page number.
        let page_ids: Vec<ObjectId> = inner.get_pages().values().copied().collect();
        debug!(pages = page_ids.len(), "opened document");
        Ok(LopdfDocument { inner, page_ids })
    }

    /// Reconstruct the text of one page (1-based).
    ///
    /// The page is interpreted inside a root [`PAGE_CONTEXT`] context;
    /// only text inside named marked-content contexts is kept.
    pub fn extract_page_text(
        doc: &LopdfDocument,
        page: u32,
        options: &ExtractOptions,
    ) -> Result<String, BackendError> {
        let content = doc.page_content(page)?;
        let resources = doc.page_resources(page)?;

        let mut assembler = MarkedUpTextAssembler::new(options.use_markup);
        assembler.set_page(page);
        let extractor = TextExtractor::new(assembler, options.max_marked_content_depth);
        let mut processor = ContentStreamProcessor::new(&doc.inner, extractor, options.clone());

        debug!(page, bytes = content.len(), "extracting page text");
        processor.push_context(Some(PAGE_CONTEXT.to_string()))?;
        processor.process_content(&content, resources)?;
        processor.pop_context()?;
        Ok(processor.handler().resultant_text()?)
    }

    /// Every match of `pattern` on one page (1-based), in content order.
    pub fn search_page(
        doc: &LopdfDocument,
        page: u32,
        pattern: &SearchPattern,
        options: &ExtractOptions,
    ) -> Result<Vec<MatchedPattern>, BackendError> {
        let content = doc.page_content(page)?;
        let resources = doc.page_resources(page)?;

        let locator = TextLocator::new(pattern.clone(), page, options.max_marked_content_depth);
        let mut processor = ContentStreamProcessor::new(&doc.inner, locator, options.clone());

        debug!(page, pattern = pattern.as_str(), "searching page");
        processor.process_content(&content, resources)?;
        Ok(processor.into_handler().into_matches())
    }
}

/// Follow an indirect reference one level.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Integer or real value as `f64`.
pub(crate) fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(*f as f64),
        _ => None,
    }
}

/// Look up a key on the page, walking up `/Parent` links when absent.
fn resolve_inherited<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Result<Option<&'a Object>, BackendError> {
    let mut current_id = page_id;
    loop {
        let dict = doc
            .get_object(current_id)
            .and_then(|o| o.as_dict())
            .map_err(|e| BackendError::Parse(format!("failed to get page dictionary: {e}")))?;

        if let Ok(value) = dict.get(key) {
            return Ok(Some(value));
        }
        match dict.get(b"Parent") {
            Ok(parent) => {
                current_id = parent
                    .as_reference()
                    .map_err(|e| BackendError::Parse(format!("invalid /Parent reference: {e}")))?;
            }
            Err(_) => return Ok(None),
        }
    }
}

fn page_content_bytes(doc: &Document, page_dict: &Dictionary) -> Result<Vec<u8>, BackendError> {
    let Ok(contents) = page_dict.get(b"Contents") else {
        return Ok(Vec::new());
    };

    match resolve(doc, contents) {
        Object::Stream(stream) => decode_content_stream(stream),
        Object::Array(items) => {
            let mut content = Vec::new();
            for item in items {
                let stream = resolve(doc, item).as_stream().map_err(|e| {
                    BackendError::Parse(format!("/Contents array item is not a stream: {e}"))
                })?;
                let bytes = decode_content_stream(stream)?;
                if !content.is_empty() {
                    content.push(b' ');
                }
                content.extend_from_slice(&bytes);
            }
            Ok(content)
        }
        _ => Err(BackendError::Parse(
            "/Contents is not a stream or array".to_string(),
        )),
    }
}

fn decode_content_stream(stream: &lopdf::Stream) -> Result<Vec<u8>, BackendError> {
    if stream.dict.has(b"Filter") {
        stream
            .decompressed_content()
            .map_err(|e| BackendError::Parse(format!("failed to decompress content stream: {e}")))
    } else {
        Ok(stream.content.clone())
    }
}

/// Build a PDF whose pages share one Helvetica `/F1` resource, inherited
/// from the page tree root.
#[cfg(test)]
pub(crate) fn create_test_pdf(contents: &[&[u8]]) -> Vec<u8> {
    use lopdf::{Stream, dictionary};

    let mut doc = Document::with_version("1.5");
    let pages_id: ObjectId = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut page_ids: Vec<Object> = Vec::new();
    for content in contents {
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
        });
        page_ids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids,
            "Count" => contents.len() as i64,
            "Resources" => Object::Dictionary(dictionary! {
                "Font" => Object::Dictionary(dictionary! { "F1" => font_id }),
            }),
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("failed to save test PDF");
    buf
}
