//! In-memory PDF builders shared by the integration tests.

#![allow(dead_code)]

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

/// Builds a document page by page. Every page gets a Helvetica `/F1`
/// unless its resources say otherwise.
pub struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    helvetica: ObjectId,
    kids: Vec<Object>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let helvetica = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        Self {
            doc,
            pages_id,
            helvetica,
            kids: Vec::new(),
        }
    }

    pub fn doc_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// Resources holding only `/F1`.
    pub fn default_resources(&self) -> Dictionary {
        dictionary! {
            "Font" => Object::Dictionary(dictionary! { "F1" => self.helvetica }),
        }
    }

    pub fn page(self, content: &[u8]) -> Self {
        let resources = self.default_resources();
        self.page_with_resources(content, resources)
    }

    pub fn page_with_resources(mut self, content: &[u8], resources: Dictionary) -> Self {
        let content_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, content.to_vec()));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => Object::Dictionary(resources),
        });
        self.kids.push(Object::Reference(page_id));
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        self.doc.save_to(&mut buf).expect("failed to save test PDF");
        buf
    }
}

/// Single-page PDF with the default resources.
pub fn pdf_with_content(content: &[u8]) -> Vec<u8> {
    PdfBuilder::new().page(content).build()
}

pub fn assert_approx(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}
