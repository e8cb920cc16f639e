//! Content stream interpreter.
//!
//! [`ContentStreamProcessor`] tokenizes a content stream, dispatches each
//! operator through its [`OperatorTable`], and maintains the graphics state
//! stack and the text object. Shown strings and marked-content boundaries
//! go to the [`ContentHandler`]. Form XObjects are interpreted recursively.

use std::collections::HashMap;
use std::sync::Arc;

use lopdf::{Dictionary, Document, Object, ObjectId};
use pdfsift_core::{
    ExtractOptions, GraphicsState, GraphicsStateStack, Matrix, ParsedText, PdfFont,
    RestorePolicy,
};
use tracing::{debug, trace, warn};

use crate::error::{BackendError, ContentStreamError};
use crate::font::{DocumentFont, load_font};
use crate::handler::ContentHandler;
use crate::lopdf_backend::{number, resolve};
use crate::operators::{ContentOperator, OperatorTable};
use crate::tokenizer::{Operator, tokenize};

/// State of the current `BT`/`ET` text object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextObject {
    Closed,
    Open {
        text_matrix: Matrix,
        line_matrix: Matrix,
    },
}

/// Interpreter for the content streams of one document.
pub struct ContentStreamProcessor<'a, H: ContentHandler> {
    doc: &'a Document,
    options: ExtractOptions,
    states: GraphicsStateStack,
    text: TextObject,
    operators: OperatorTable<H>,
    fonts: HashMap<ObjectId, Arc<dyn PdfFont>>,
    fallback_font: Option<Arc<dyn PdfFont>>,
    handler: H,
    depth: usize,
    /// Stack depth `Q` may not pop below: the base state, or the state
    /// saved for the form being interpreted.
    restore_floor: usize,
}

impl<'a, H: ContentHandler + 'static> ContentStreamProcessor<'a, H> {
    /// Interpreter with the default operators registered.
    pub fn new(doc: &'a Document, handler: H, options: ExtractOptions) -> Self {
        Self {
            doc,
            options,
            states: GraphicsStateStack::default(),
            text: TextObject::Closed,
            operators: OperatorTable::with_defaults(),
            fonts: HashMap::new(),
            fallback_font: None,
            handler,
            depth: 0,
            restore_floor: 1,
        }
    }
}

impl<'a, H: ContentHandler> ContentStreamProcessor<'a, H> {
    /// Register an additional operator.
    ///
    /// # Errors
    ///
    /// [`BackendError::DuplicateOperator`] if an operator with that name is
    /// already registered.
    pub fn register_content_operator(
        &mut self,
        operator: Arc<dyn ContentOperator<H>>,
    ) -> Result<(), BackendError> {
        self.operators.register(operator)
    }

    pub fn lookup_operator(&self, name: &str) -> Option<Arc<dyn ContentOperator<H>>> {
        self.operators.get(name)
    }

    /// Apply one operator. Unknown operators are skipped.
    pub fn invoke_operator(
        &mut self,
        operator: &Operator,
        resources: &Dictionary,
    ) -> Result<(), BackendError> {
        match self.lookup_operator(&operator.name) {
            Some(op) => op.invoke(self, &operator.operands, resources),
            None => {
                trace!(operator = %operator.name, "skipping unsupported operator");
                Ok(())
            }
        }
    }

    /// Interpret a decoded content stream.
    ///
    /// # Errors
    ///
    /// Tokenizer failures surface as [`BackendError::Parse`]; an operator
    /// failure as [`BackendError::ContentStream`] naming the operator and
    /// its position in the stream.
    pub fn process_content(
        &mut self,
        content: &[u8],
        resources: &Dictionary,
    ) -> Result<(), BackendError> {
        let operators = tokenize(content)?;
        debug!(
            operators = operators.len(),
            depth = self.depth,
            "interpreting content stream"
        );
        for (index, operator) in operators.iter().enumerate() {
            self.invoke_operator(operator, resources)
                .map_err(|err| match err {
                    BackendError::Malformed(source) => BackendError::ContentStream {
                        operator: operator.name.clone(),
                        index,
                        source,
                    },
                    other => other,
                })?;
        }
        Ok(())
    }

    pub fn document(&self) -> &'a Document {
        self.doc
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    // --- marked content ---

    pub fn push_context(&mut self, name: Option<String>) -> Result<(), ContentStreamError> {
        self.handler.push_context(name)
    }

    pub fn pop_context(&mut self) -> Result<(), ContentStreamError> {
        self.handler.pop_context()
    }

    // --- graphics state ---

    pub fn graphics_state(&self) -> &GraphicsState {
        self.states.current()
    }

    pub fn graphics_state_mut(&mut self) -> &mut GraphicsState {
        self.states.current_mut()
    }

    pub fn save_graphics_state(&mut self) {
        self.states.push();
    }

    /// Pop the graphics state (`Q`).
    ///
    /// # Errors
    ///
    /// [`ContentStreamError::StateStackUnderflow`] when nothing above the
    /// base state (or, inside a form, above the state saved for the form)
    /// is left and the policy is [`RestorePolicy::Error`].
    pub fn restore_graphics_state(&mut self) -> Result<(), ContentStreamError> {
        if self.states.depth() > self.restore_floor && self.states.pop().is_some() {
            return Ok(());
        }
        match self.options.unbalanced_restore {
            RestorePolicy::Ignore => {
                warn!(
                    depth = self.depth,
                    "Q without matching q, keeping current graphics state"
                );
                Ok(())
            }
            RestorePolicy::Error => Err(ContentStreamError::StateStackUnderflow),
        }
    }

    /// Pre-multiply the current transformation matrix (`cm`).
    pub fn concat_ctm(&mut self, matrix: &Matrix) {
        let state = self.states.current_mut();
        state.ctm = matrix.multiply(&state.ctm);
    }

    /// Select a font from the `/Font` resources (`Tf`).
    ///
    /// A missing or unreadable resource falls back to Helvetica metrics.
    pub fn select_font(&mut self, name: &str, size: f64, resources: &Dictionary) {
        let doc = self.doc;
        let entry = resources
            .get(b"Font")
            .ok()
            .and_then(|obj| resolve(doc, obj).as_dict().ok())
            .and_then(|fonts| fonts.get(name.as_bytes()).ok());
        let font = match entry {
            Some(obj) => self.font_for(name, obj),
            None => {
                warn!(font = name, "font resource not found, using Helvetica metrics");
                self.fallback_font()
            }
        };
        self.states.current_mut().set_font(font, size);
    }

    fn font_for(&mut self, name: &str, obj: &Object) -> Arc<dyn PdfFont> {
        let id = obj.as_reference().ok();
        if let Some(font) = id.and_then(|id| self.fonts.get(&id)) {
            return Arc::clone(font);
        }
        match load_font(self.doc, name, obj) {
            Ok(font) => {
                let font: Arc<dyn PdfFont> = Arc::new(font);
                if let Some(id) = id {
                    self.fonts.insert(id, Arc::clone(&font));
                }
                font
            }
            Err(e) => {
                warn!(font = name, error = %e, "unreadable font, using Helvetica metrics");
                self.fallback_font()
            }
        }
    }

    fn fallback_font(&mut self) -> Arc<dyn PdfFont> {
        Arc::clone(
            self.fallback_font
                .get_or_insert_with(|| Arc::new(DocumentFont::helvetica())),
        )
    }

    /// Apply a named `/ExtGState` (`gs`). Only its `/Font` entry affects
    /// text.
    pub fn apply_ext_gstate(
        &mut self,
        name: &str,
        resources: &Dictionary,
    ) -> Result<(), ContentStreamError> {
        let doc = self.doc;
        let ext = resources
            .get(b"ExtGState")
            .ok()
            .and_then(|obj| resolve(doc, obj).as_dict().ok())
            .and_then(|states| states.get(name.as_bytes()).ok())
            .and_then(|obj| resolve(doc, obj).as_dict().ok())
            .ok_or_else(|| ContentStreamError::MissingResource {
                kind: "ExtGState",
                name: name.to_string(),
            })?;

        let font_entry = ext
            .get(b"Font")
            .ok()
            .and_then(|obj| resolve(doc, obj).as_array().ok());
        if let Some([font_obj, size]) = font_entry.map(Vec::as_slice) {
            if let Some(size) = number(resolve(doc, size)) {
                let font = self.font_for(name, font_obj);
                self.states.current_mut().set_font(font, size);
            }
        }
        Ok(())
    }

    // --- text object ---

    pub fn text_object(&self) -> TextObject {
        self.text
    }

    pub fn text_matrix(&self) -> Option<Matrix> {
        match self.text {
            TextObject::Open { text_matrix, .. } => Some(text_matrix),
            TextObject::Closed => None,
        }
    }

    pub fn line_matrix(&self) -> Option<Matrix> {
        match self.text {
            TextObject::Open { line_matrix, .. } => Some(line_matrix),
            TextObject::Closed => None,
        }
    }

    /// Open a text object (`BT`) with identity matrices.
    pub fn begin_text(&mut self) -> Result<(), ContentStreamError> {
        if let TextObject::Open { .. } = self.text {
            return Err(ContentStreamError::NestedTextObject);
        }
        self.text = TextObject::Open {
            text_matrix: Matrix::identity(),
            line_matrix: Matrix::identity(),
        };
        Ok(())
    }

    pub fn end_text(&mut self) -> Result<(), ContentStreamError> {
        self.open_text("ET")?;
        self.text = TextObject::Closed;
        Ok(())
    }

    fn open_text(&mut self, operator: &str) -> Result<(&mut Matrix, &mut Matrix), ContentStreamError> {
        match &mut self.text {
            TextObject::Open {
                text_matrix,
                line_matrix,
            } => Ok((text_matrix, line_matrix)),
            TextObject::Closed => Err(ContentStreamError::TextObjectNotOpen {
                operator: operator.to_string(),
            }),
        }
    }

    /// Set both text matrices (`Tm`).
    pub fn set_text_matrix(&mut self, operator: &str, matrix: Matrix) -> Result<(), ContentStreamError> {
        let (text_matrix, line_matrix) = self.open_text(operator)?;
        *text_matrix = matrix;
        *line_matrix = matrix;
        Ok(())
    }

    /// Start a new line offset from the current line start (`Td`).
    pub fn move_text_position(
        &mut self,
        operator: &str,
        tx: f64,
        ty: f64,
    ) -> Result<(), ContentStreamError> {
        let (text_matrix, line_matrix) = self.open_text(operator)?;
        *line_matrix = Matrix::identity_like(tx, ty).multiply(line_matrix);
        *text_matrix = *line_matrix;
        Ok(())
    }

    /// Move down by the leading (`T*`).
    pub fn next_line(&mut self, operator: &str) -> Result<(), ContentStreamError> {
        let leading = self.states.current().leading;
        self.move_text_position(operator, 0.0, -leading)
    }

    /// Shift the text matrix by a `TJ` adjustment in thousandths of a unit.
    pub fn apply_text_adjust(&mut self, tj: f64) -> Result<(), ContentStreamError> {
        let state = self.states.current();
        let adjust_by = -tj / 1000.0 * state.font_size() * state.horizontal_scaling;
        let (text_matrix, _) = self.open_text("TJ")?;
        *text_matrix = Matrix::identity_like(adjust_by, 0.0).multiply(text_matrix);
        Ok(())
    }

    /// Show a string: report it to the handler, then advance the text
    /// matrix by its width.
    pub fn display_pdf_string(&mut self, operator: &str, bytes: &[u8]) -> Result<(), ContentStreamError> {
        let text_matrix = *self.open_text(operator)?.0;
        let state = self.states.current();
        let parsed = ParsedText::new(bytes, state, &text_matrix).ok_or_else(|| {
            ContentStreamError::NoFontSelected {
                operator: operator.to_string(),
            }
        })?;
        let width = parsed.unscaled_text_width(state);
        self.handler.display_text(&parsed)?;

        let (text_matrix, _) = self.open_text(operator)?;
        *text_matrix = Matrix::identity_like(width, 0.0).multiply(text_matrix);
        Ok(())
    }

    // --- external objects ---

    /// Paint a named XObject (`Do`). Form XObjects are interpreted inside
    /// a saved graphics state; other subtypes are ignored.
    pub fn invoke_xobject(&mut self, name: &str, resources: &Dictionary) -> Result<(), BackendError> {
        let doc = self.doc;
        let Some(xobjects) = resources
            .get(b"XObject")
            .ok()
            .and_then(|obj| resolve(doc, obj).as_dict().ok())
        else {
            debug!(xobject = name, "no XObject resources, ignoring Do");
            return Ok(());
        };
        let stream = match xobjects.get(name.as_bytes()).map(|obj| resolve(doc, obj)) {
            Ok(Object::Stream(stream)) => stream,
            _ => {
                return Err(ContentStreamError::MissingResource {
                    kind: "XObject",
                    name: name.to_string(),
                }
                .into());
            }
        };
        let is_form = matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(subtype)) if subtype == b"Form");
        if !is_form {
            trace!(xobject = name, "ignoring non-form XObject");
            return Ok(());
        }
        if self.depth >= self.options.max_recursion_depth {
            return Err(ContentStreamError::NestingTooDeep {
                limit: self.options.max_recursion_depth,
            }
            .into());
        }

        let form_resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|obj| resolve(doc, obj).as_dict().ok())
            .unwrap_or(resources);
        let content = if stream.dict.has(b"Filter") {
            stream
                .decompressed_content()
                .map_err(|e| ContentStreamError::Stream(format!("form /{name}: {e}")))?
        } else {
            stream.content.clone()
        };
        let form_matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|obj| resolve(doc, obj).as_array().ok())
            .and_then(|items| {
                let values: Option<Vec<f64>> =
                    items.iter().map(|v| number(resolve(doc, v))).collect();
                match values?.as_slice() {
                    [a, b, c, d, e, f] => Some(Matrix::new(*a, *b, *c, *d, *e, *f)),
                    _ => None,
                }
            });

        self.save_graphics_state();
        let floor = self.states.depth();
        let parent_floor = std::mem::replace(&mut self.restore_floor, floor);
        if let Some(matrix) = form_matrix {
            self.concat_ctm(&matrix);
        }
        self.depth += 1;
        let result = self.process_content(&content, form_resources);
        self.depth -= 1;
        self.restore_floor = parent_floor;
        // Drop whatever the form left saved, then the state pushed above.
        while self.states.depth() >= floor && self.states.pop().is_some() {}
        result
    }
}
