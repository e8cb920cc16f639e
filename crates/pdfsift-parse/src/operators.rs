//! Content stream operators and the dispatch table.
//!
//! Each operator is a [`ContentOperator`] registered by name in an
//! [`OperatorTable`]. The defaults cover graphics state (`q Q cm gs`), text
//! state (`Tc Tw Tz TL Tf Tr Ts`), text objects and positioning
//! (`BT ET Td TD Tm T*`), text showing (`Tj ' " TJ`), marked content
//! (`BMC BDC EMC`) and form XObjects (`Do`). Anything else is skipped by
//! the interpreter.

use std::collections::HashMap;
use std::sync::Arc;

use encoding_rs::WINDOWS_1252;
use lopdf::{Dictionary, Object};
use pdfsift_core::{FinalText, Matrix, TextRenderMode};
use tracing::debug;

use crate::error::{BackendError, ContentStreamError};
use crate::handler::ContentHandler;
use crate::lopdf_backend::resolve;
use crate::processor::ContentStreamProcessor;
use crate::tokenizer::Operand;

/// One content stream operator.
pub trait ContentOperator<H: ContentHandler> {
    /// Operator keyword, e.g. `Tj`.
    fn name(&self) -> &str;

    /// Apply the operator.
    ///
    /// `resources` is the resource dictionary of the stream being
    /// interpreted (the page's, or a form's).
    fn invoke(
        &self,
        processor: &mut ContentStreamProcessor<'_, H>,
        operands: &[Operand],
        resources: &Dictionary,
    ) -> Result<(), BackendError>;
}

/// Signature of an operator implemented as a plain function.
pub type OperatorFn<H> =
    fn(&mut ContentStreamProcessor<'_, H>, &[Operand], &Dictionary) -> Result<(), BackendError>;

/// A [`ContentOperator`] backed by a function.
pub struct FnOperator<H: ContentHandler> {
    name: &'static str,
    func: OperatorFn<H>,
}

impl<H: ContentHandler> FnOperator<H> {
    pub fn new(name: &'static str, func: OperatorFn<H>) -> Self {
        Self { name, func }
    }
}

impl<H: ContentHandler> ContentOperator<H> for FnOperator<H> {
    fn name(&self) -> &str {
        self.name
    }

    fn invoke(
        &self,
        processor: &mut ContentStreamProcessor<'_, H>,
        operands: &[Operand],
        resources: &Dictionary,
    ) -> Result<(), BackendError> {
        (self.func)(processor, operands, resources)
    }
}

/// Operators by keyword. Lookup is case-sensitive.
pub struct OperatorTable<H: ContentHandler> {
    operators: HashMap<String, Arc<dyn ContentOperator<H>>>,
}

impl<H: ContentHandler> Default for OperatorTable<H> {
    fn default() -> Self {
        Self {
            operators: HashMap::new(),
        }
    }
}

impl<H: ContentHandler + 'static> OperatorTable<H> {
    /// Table holding every default operator.
    pub fn with_defaults() -> Self {
        let mut table = Self::default();
        let defaults: [(&'static str, OperatorFn<H>); 26] = [
            ("q", save_state),
            ("Q", restore_state),
            ("cm", concat_matrix),
            ("gs", graphics_state_resource),
            ("Tc", set_char_spacing),
            ("Tw", set_word_spacing),
            ("Tz", set_horizontal_scaling),
            ("TL", set_leading),
            ("Tf", set_font),
            ("Tr", set_render_mode),
            ("Ts", set_rise),
            ("BT", begin_text),
            ("ET", end_text),
            ("Td", move_start_next_line),
            ("TD", move_start_next_line_with_leading),
            ("Tm", set_text_matrix),
            ("T*", move_next_line),
            ("Tj", show_text),
            ("'", move_next_line_and_show),
            ("\"", move_next_line_and_show_with_spacing),
            ("TJ", show_text_array),
            ("BMC", begin_marked),
            ("BDC", begin_marked_dict),
            ("EMC", end_marked),
            ("Do", paint_xobject),
            ("BI", inline_image),
        ];
        for (name, func) in defaults {
            table
                .operators
                .insert(name.to_string(), Arc::new(FnOperator::new(name, func)));
        }
        table
    }
}

impl<H: ContentHandler> OperatorTable<H> {
    /// Add an operator.
    ///
    /// # Errors
    ///
    /// [`BackendError::DuplicateOperator`] if the name is taken; the
    /// existing operator stays registered.
    pub fn register(&mut self, operator: Arc<dyn ContentOperator<H>>) -> Result<(), BackendError> {
        let name = operator.name().to_string();
        if self.operators.contains_key(&name) {
            return Err(BackendError::DuplicateOperator(name));
        }
        self.operators.insert(name, operator);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ContentOperator<H>>> {
        self.operators.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

// --- operand access ---

fn operand<'o>(
    operator: &str,
    operands: &'o [Operand],
    index: usize,
) -> Result<&'o Operand, ContentStreamError> {
    operands
        .get(index)
        .ok_or_else(|| ContentStreamError::MissingOperand {
            operator: operator.to_string(),
            index,
        })
}

fn type_error(operator: &str, index: usize, expected: &'static str) -> ContentStreamError {
    ContentStreamError::OperandType {
        operator: operator.to_string(),
        index,
        expected,
    }
}

fn number(operator: &str, operands: &[Operand], index: usize) -> Result<f64, ContentStreamError> {
    operand(operator, operands, index)?
        .as_f64()
        .ok_or_else(|| type_error(operator, index, "number"))
}

fn name<'o>(
    operator: &str,
    operands: &'o [Operand],
    index: usize,
) -> Result<&'o str, ContentStreamError> {
    operand(operator, operands, index)?
        .as_name()
        .ok_or_else(|| type_error(operator, index, "name"))
}

fn string<'o>(
    operator: &str,
    operands: &'o [Operand],
    index: usize,
) -> Result<&'o [u8], ContentStreamError> {
    operand(operator, operands, index)?
        .as_string_bytes()
        .ok_or_else(|| type_error(operator, index, "string"))
}

fn matrix(operator: &str, operands: &[Operand]) -> Result<Matrix, ContentStreamError> {
    Ok(Matrix::new(
        number(operator, operands, 0)?,
        number(operator, operands, 1)?,
        number(operator, operands, 2)?,
        number(operator, operands, 3)?,
        number(operator, operands, 4)?,
        number(operator, operands, 5)?,
    ))
}

/// Decode a PDF text string: UTF-16BE with a byte order mark, otherwise
/// single-byte.
pub(crate) fn decode_text_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks(2)
                .map(|pair| match pair {
                    [hi, lo] => u16::from_be_bytes([*hi, *lo]),
                    [hi] => u16::from(*hi) << 8,
                    _ => 0,
                })
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => WINDOWS_1252.decode_without_bom_handling(bytes).0.into_owned(),
    }
}

// --- graphics state ---

fn save_state<H: ContentHandler>(
    p: &mut ContentStreamProcessor<'_, H>,
    _operands: &[Operand],
    _resources: &Dictionary,
) -> Result<(), BackendError> {
    p.save_graphics_state();
    Ok(())
}

fn restore_state<H: ContentHandler>(
    p: &mut ContentStreamProcessor<'_, H>,
    _operands: &[Operand],
    _resources: &Dictionary,
) -> Result<(), BackendError> {
    Ok(p.restore_graphics_state()?)
}

fn concat_matrix<H: ContentHandler>(
    p: &mut ContentStreamProcessor<'_, H>,
    operands: &[Operand],
    _resources: &Dictionary,
) -> Result<(), BackendError> {
    let m = matrix("cm", operands)?;
    p.concat_ctm(&m);
    Ok(())
}

fn graphics_state_resource<H: ContentHandler>(
    p: &mut ContentStreamProcessor<'_, H>,
    operands: &[Operand],
    resources: &Dictionary,
) -> Result<(), BackendError> {
    let resource = name("gs", operands, 0)?;
    Ok(p.apply_ext_gstate(resource, resources)?)
}

// --- text state ---

fn set_char_spacing<H: ContentHandler>(
    p: &mut ContentStreamProcessor<'_, H>,
    operands: &[Operand],
    _resources: &Dictionary,
) -> Result<(), BackendError> {
    p.graphics_state_mut().char_spacing = number("Tc", operands, 0)?;
    Ok(())
}

fn set_word_spacing<H: ContentHandler>(
    p: &mut ContentStreamProcessor<'_, H>,
    operands: &[Operand],
    _resources: &Dictionary,
) -> Result<(), BackendError> {
    p.graphics_state_mut().word_spacing = number("Tw", operands, 0)?;
    Ok(())
}

fn set_horizontal_scaling<H: ContentHandler>(
    p: &mut ContentStreamProcessor<'_, H>,
    operands: &[Operand],
    _resources: &Dictionary,
) -> Result<(), BackendError> {
    p.graphics_state_mut().horizontal_scaling = number("Tz", operands, 0)? / 100.0;
    Ok(())
}

fn set_leading<H: ContentHandler>(
    p: &mut ContentStreamProcessor<'_, H>,
    operands: &[Operand],
    _resources: &Dictionary,
) -> Result<(), BackendError> {
    p.graphics_state_mut().leading = number("TL", operands, 0)?;
    Ok(())
}

fn set_font<H: ContentHandler>(
    p: &mut ContentStreamProcessor<'_, H>,
    operands: &[Operand],
    resources: &Dictionary,
) -> Result<(), BackendError> {
    let resource = name("Tf", operands, 0)?;
    let size = number("Tf", operands, 1)?;
    p.select_font(resource, size, resources);
    Ok(())
}

fn set_render_mode<H: ContentHandler>(
    p: &mut ContentStreamProcessor<'_, H>,
    operands: &[Operand],
    _resources: &Dictionary,
) -> Result<(), BackendError> {
    let value = number("Tr", operands, 0)?;
    let mode = TextRenderMode::from_i64(value as i64)
        .ok_or_else(|| type_error("Tr", 0, "render mode 0-7"))?;
    p.graphics_state_mut().render_mode = mode;
    Ok(())
}

fn set_rise<H: ContentHandler>(
    p: &mut ContentStreamProcessor<'_, H>,
    operands: &[Operand],
    _resources: &Dictionary,
) -> Result<(), BackendError> {
    p.graphics_state_mut().rise = number("Ts", operands, 0)?;
    Ok(())
}

// --- text objects and positioning ---

fn begin_text<H: ContentHandler>(
    p: &mut ContentStreamProcessor<'_, H>,
    _operands: &[Operand],
    _resources: &Dictionary,
) -> Result<(), BackendError> {
    Ok(p.begin_text()?)
}

fn end_text<H: ContentHandler>(
    p: &mut ContentStreamProcessor<'_, H>,
    _operands: &[Operand],
    _resources: &Dictionary,
) -> Result<(), BackendError> {
    Ok(p.end_text()?)
}

fn move_start_next_line<H: ContentHandler>(
    p: &mut ContentStreamProcessor<'_, H>,
    operands: &[Operand],
    _resources: &Dictionary,
) -> Result<(), BackendError> {
    let tx = number("Td", operands, 0)?;
    let ty = number("Td", operands, 1)?;
    Ok(p.move_text_position("Td", tx, ty)?)
}

fn move_start_next_line_with_leading<H: ContentHandler>(
    p: &mut ContentStreamProcessor<'_, H>,
    operands: &[Operand],
    _resources: &Dictionary,
) -> Result<(), BackendError> {
    let tx = number("TD", operands, 0)?;
    let ty = number("TD", operands, 1)?;
    p.move_text_position("TD", tx, ty)?;
    p.graphics_state_mut().leading = -ty;
    Ok(())
}

fn set_text_matrix<H: ContentHandler>(
    p: &mut ContentStreamProcessor<'_, H>,
    operands: &[Operand],
    _resources: &Dictionary,
) -> Result<(), BackendError> {
    let m = matrix("Tm", operands)?;
    Ok(p.set_text_matrix("Tm", m)?)
}

fn move_next_line<H: ContentHandler>(
    p: &mut ContentStreamProcessor<'_, H>,
    _operands: &[Operand],
    _resources: &Dictionary,
) -> Result<(), BackendError> {
    Ok(p.next_line("T*")?)
}

// --- text showing ---

fn show_text<H: ContentHandler>(
    p: &mut ContentStreamProcessor<'_, H>,
    operands: &[Operand],
    _resources: &Dictionary,
) -> Result<(), BackendError> {
    let bytes = string("Tj", operands, 0)?;
    Ok(p.display_pdf_string("Tj", bytes)?)
}

fn move_next_line_and_show<H: ContentHandler>(
    p: &mut ContentStreamProcessor<'_, H>,
    operands: &[Operand],
    _resources: &Dictionary,
) -> Result<(), BackendError> {
    let bytes = string("'", operands, 0)?;
    p.next_line("'")?;
    Ok(p.display_pdf_string("'", bytes)?)
}

fn move_next_line_and_show_with_spacing<H: ContentHandler>(
    p: &mut ContentStreamProcessor<'_, H>,
    operands: &[Operand],
    _resources: &Dictionary,
) -> Result<(), BackendError> {
    let word_spacing = number("\"", operands, 0)?;
    let char_spacing = number("\"", operands, 1)?;
    let bytes = string("\"", operands, 2)?;
    let state = p.graphics_state_mut();
    state.word_spacing = word_spacing;
    state.char_spacing = char_spacing;
    p.next_line("\"")?;
    Ok(p.display_pdf_string("\"", bytes)?)
}

fn show_text_array<H: ContentHandler>(
    p: &mut ContentStreamProcessor<'_, H>,
    operands: &[Operand],
    _resources: &Dictionary,
) -> Result<(), BackendError> {
    let Operand::Array(items) = operand("TJ", operands, 0)? else {
        return Err(type_error("TJ", 0, "array").into());
    };
    let strict = p.options().strict_text_arrays;
    // Kind of the previous element: true for a string.
    let mut previous: Option<bool> = None;
    for item in items {
        if let Some(bytes) = item.as_string_bytes() {
            if strict && previous == Some(true) {
                return Err(ContentStreamError::MalformedTextArray {
                    reason: "two consecutive strings".to_string(),
                }
                .into());
            }
            p.display_pdf_string("TJ", bytes)?;
            previous = Some(true);
        } else if let Some(adjustment) = item.as_f64() {
            if strict && previous == Some(false) {
                return Err(ContentStreamError::MalformedTextArray {
                    reason: "two consecutive numbers".to_string(),
                }
                .into());
            }
            p.apply_text_adjust(adjustment)?;
            previous = Some(false);
        } else {
            return Err(ContentStreamError::MalformedTextArray {
                reason: format!("unexpected element {item:?}"),
            }
            .into());
        }
    }
    Ok(())
}

// --- marked content ---

fn marked_tag(operator: &str, operands: &[Operand]) -> Result<String, ContentStreamError> {
    Ok(name(operator, operands, 0)?.to_lowercase())
}

fn is_suppressed_tag(tag: &str) -> bool {
    tag == "artifact" || tag == "placedpdf"
}

fn begin_marked<H: ContentHandler>(
    p: &mut ContentStreamProcessor<'_, H>,
    operands: &[Operand],
    _resources: &Dictionary,
) -> Result<(), BackendError> {
    let tag = marked_tag("BMC", operands)?;
    let context = (!is_suppressed_tag(&tag)).then_some(tag);
    Ok(p.push_context(context)?)
}

/// The entries of a BDC property list that affect extraction.
#[derive(Debug, Default)]
struct MarkedProperties {
    alternate_text: Option<String>,
    has_type: bool,
}

impl MarkedProperties {
    fn from_operand(entries: &[(String, Operand)]) -> Self {
        let lookup = |key: &str| entries.iter().find(|(k, _)| k == key).map(|(_, v)| v);
        Self {
            alternate_text: lookup("E")
                .and_then(Operand::as_string_bytes)
                .map(decode_text_string),
            has_type: lookup("Type").is_some(),
        }
    }

    fn from_dictionary(dict: &Dictionary) -> Self {
        let alternate_text = match dict.get(b"E") {
            Ok(Object::String(bytes, _)) => Some(decode_text_string(bytes)),
            _ => None,
        };
        Self {
            alternate_text,
            has_type: dict.has(b"Type"),
        }
    }
}

fn marked_properties<H: ContentHandler>(
    p: &ContentStreamProcessor<'_, H>,
    operand: Option<&Operand>,
    resources: &Dictionary,
) -> Option<MarkedProperties> {
    match operand? {
        Operand::Dictionary(entries) => Some(MarkedProperties::from_operand(entries)),
        Operand::Name(key) => {
            let doc = p.document();
            let properties = resources
                .get(b"Properties")
                .ok()
                .and_then(|obj| resolve(doc, obj).as_dict().ok());
            let dict = properties
                .and_then(|props| props.get(key.as_bytes()).ok())
                .and_then(|obj| resolve(doc, obj).as_dict().ok());
            if dict.is_none() {
                debug!(properties = %key, "BDC property list not found in resources");
            }
            dict.map(MarkedProperties::from_dictionary)
        }
        _ => None,
    }
}

fn begin_marked_dict<H: ContentHandler>(
    p: &mut ContentStreamProcessor<'_, H>,
    operands: &[Operand],
    resources: &Dictionary,
) -> Result<(), BackendError> {
    let tag = marked_tag("BDC", operands)?;
    let parent_suppressed = matches!(p.handler().current_context(), Some(None));
    let mut context = if is_suppressed_tag(&tag) || parent_suppressed {
        None
    } else if tag == "l" {
        Some("ul".to_string())
    } else {
        Some(tag)
    };

    if context.is_some() {
        if let Some(props) = marked_properties(p, operands.get(1), resources) {
            if let Some(text) = props.alternate_text {
                // The expansion replaces the marked content.
                p.push_context(context)?;
                p.handler_mut().add_final_text(FinalText::new(text));
                p.pop_context()?;
                return Ok(p.push_context(None)?);
            }
            if props.has_type {
                context = Some(String::new());
            }
        }
    }
    Ok(p.push_context(context)?)
}

fn end_marked<H: ContentHandler>(
    p: &mut ContentStreamProcessor<'_, H>,
    _operands: &[Operand],
    _resources: &Dictionary,
) -> Result<(), BackendError> {
    Ok(p.pop_context()?)
}

// --- external objects ---

fn paint_xobject<H: ContentHandler>(
    p: &mut ContentStreamProcessor<'_, H>,
    operands: &[Operand],
    resources: &Dictionary,
) -> Result<(), BackendError> {
    let resource = name("Do", operands, 0)?;
    p.invoke_xobject(resource, resources)
}

fn inline_image<H: ContentHandler>(
    _p: &mut ContentStreamProcessor<'_, H>,
    _operands: &[Operand],
    _resources: &Dictionary,
) -> Result<(), BackendError> {
    // Image data carries no text.
    Ok(())
}
