//! PDF rendering for delivery notes.
//!
//! Two documents are produced:
//!
//! - the *delivery note* (`render_delivery_note`): a LETTER page with the
//!   note header and numbered line items, plus a trailing signature page
//!   when a signature image is supplied;
//! - the *signing sheet* (`render_signing_sheet`): the compact document that
//!   is uploaded when a note is signed, with the signature placed inline.
//!
//! Output is deterministic: no timestamps, no document ids and a fixed
//! object layout, so identical inputs yield identical bytes. Text uses the
//! standard Helvetica font with WinAnsi encoding; characters outside that
//! encoding are printed as `?`.

use chrono::{DateTime, Datelike, Utc};
use image::imageops::FilterType;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;

use crate::error::AppError;
use crate::models::{format_quantity, DeliveryNote, DeliveryNoteDetail, LineItem};

const PAGE_WIDTH: i64 = 612;
const PAGE_HEIGHT: i64 = 792;
const MARGIN: i64 = 50;
const CONTENT_WIDTH: i64 = PAGE_WIDTH - 2 * MARGIN;

/// Embedded images are downsampled to at most this many pixels per side.
const MAX_IMAGE_PIXELS: u32 = 600;

const FONT_NAME: &str = "F1";
const IMAGE_NAME: &str = "Im1";

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Invalid signature image: {0}")]
    InvalidImage(String),
    #[error("Failed to build PDF: {0}")]
    Pdf(String),
    #[error("Failed to write PDF: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RenderError> for AppError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::InvalidImage(_) => {
                AppError::Validation("Invalid signature image".to_string())
            }
            other => AppError::Upstream(other.to_string()),
        }
    }
}

/// A decoded signature, flattened onto a white background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureImage {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
}

impl SignatureImage {
    /// Decodes PNG or JPEG bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, RenderError> {
        let mut image =
            image::load_from_memory(bytes).map_err(|e| RenderError::InvalidImage(e.to_string()))?;

        if image.width() == 0 || image.height() == 0 {
            return Err(RenderError::InvalidImage("image has no pixels".to_string()));
        }
        if image.width() > MAX_IMAGE_PIXELS || image.height() > MAX_IMAGE_PIXELS {
            image = image.resize(MAX_IMAGE_PIXELS, MAX_IMAGE_PIXELS, FilterType::Triangle);
        }

        let rgba = image.to_rgba8();
        let mut rgb = Vec::with_capacity(rgba.width() as usize * rgba.height() as usize * 3);
        for pixel in rgba.pixels() {
            let [r, g, b, a] = pixel.0;
            let alpha = a as u32;
            for channel in [r, g, b] {
                // Composite over white
                let value = (channel as u32 * alpha + 255 * (255 - alpha) + 127) / 255;
                rgb.push(value as u8);
            }
        }

        Ok(Self {
            width: rgba.width(),
            height: rgba.height(),
            rgb,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Size of the image scaled to fit inside `box_w` x `box_h`, keeping its aspect ratio.
    fn fit(&self, box_w: i64, box_h: i64) -> (i64, i64) {
        let (w, h) = (self.width as i64, self.height as i64);
        if w * box_h >= h * box_w {
            (box_w, (h * box_w / w).max(1))
        } else {
            ((w * box_h / h).max(1), box_h)
        }
    }
}

/// Renders the delivery note document into `out`.
pub fn render_delivery_note<W: Write>(
    detail: &DeliveryNoteDetail,
    signature: Option<&SignatureImage>,
    out: &mut W,
) -> Result<(), RenderError> {
    let note = &detail.note;
    let mut layout = Layout::new();

    layout.text("Project Delivery Note", 20, Align::Center);
    layout.skip(20);

    layout.text(&format!("Date: {}", short_date(note.date)), 12, Align::Left);
    layout.text(
        &format!(
            "Project: {}",
            detail.project_name.as_deref().unwrap_or("Unknown project")
        ),
        12,
        Align::Left,
    );
    layout.text(
        &format!(
            "Client: {}",
            detail.client_name.as_deref().unwrap_or("Unknown client")
        ),
        12,
        Align::Left,
    );
    layout.text(
        &format!(
            "Created by: {}",
            detail.created_by_email.as_deref().unwrap_or("Unknown user")
        ),
        12,
        Align::Left,
    );
    layout.skip(12);

    layout.text("Details:", 14, Align::Left);
    layout.skip_half(14);

    for (index, item) in note.data.iter().enumerate() {
        layout.text(&format!("{}.", index + 1), 12, Align::Left);
        for line in detail_lines(item) {
            layout.text(&line, 12, Align::Left);
        }
        layout.skip_half(12);
    }

    if let Some(signature) = signature {
        layout.new_page();
        layout.text("DIGITAL SIGNATURE:", 16, Align::Center);
        let (w, h) = signature.fit(250, 250);
        layout.image(w, h, Align::Center);
    }

    write_document(layout, signature, out)
}

/// Renders the signing sheet for `note`, signed on `signed_on`, into `out`.
pub fn render_signing_sheet<W: Write>(
    note: &DeliveryNote,
    signed_on: DateTime<Utc>,
    signature: &SignatureImage,
    out: &mut W,
) -> Result<(), RenderError> {
    let mut layout = Layout::new();

    layout.text(&format!("Delivery Note #{}", note.id), 16, Align::Center);
    layout.text(&format!("Type: {}", note.note_type.as_str()), 16, Align::Left);
    layout.text(&format!("Date: {}", short_date(signed_on)), 16, Align::Left);
    layout.text("---", 16, Align::Left);
    layout.text("Data:", 16, Align::Left);
    for item in &note.data {
        layout.text(&summary_line(item), 16, Align::Left);
    }
    layout.skip(16);
    layout.text("Client signature:", 16, Align::Left);

    let (w, h) = signature.fit(150, 150);
    layout.image(w, h, Align::Left);

    write_document(layout, Some(signature), out)
}

fn short_date(date: DateTime<Utc>) -> String {
    format!("{}/{}/{}", date.month(), date.day(), date.year())
}

/// Indented sub-field lines of the delivery note document.
fn detail_lines(item: &LineItem) -> Vec<String> {
    let mut lines = Vec::new();
    match item {
        LineItem::HourBased { person, hours } => {
            if !person.is_empty() {
                lines.push(format!("   - Person: {}", person));
            }
            if let Some(hours) = hours.filter(|h| *h != 0.0) {
                lines.push(format!("   - Hours: {}", format_quantity(hours)));
            }
        }
        LineItem::MaterialBased { material, quantity } => {
            if !material.is_empty() {
                lines.push(format!("   - Material: {}", material));
            }
            if let Some(quantity) = quantity.filter(|q| *q != 0.0) {
                lines.push(format!("   - Quantity: {}", format_quantity(quantity)));
            }
        }
        LineItem::Simple { quantity, .. } => {
            if let Some(quantity) = quantity.filter(|q| *q != 0.0) {
                lines.push(format!("   - Quantity: {}", format_quantity(quantity)));
            }
        }
    }
    lines
}

/// One-line item summary of the signing sheet.
fn summary_line(item: &LineItem) -> String {
    let (label, amount) = match item {
        LineItem::HourBased { person, hours } => (person, hours),
        LineItem::MaterialBased { material, quantity } => (material, quantity),
        LineItem::Simple { name, quantity, .. } => (name, quantity),
    };
    match amount {
        Some(amount) => format!("- {}: {}", label, format_quantity(*amount)),
        None => format!("- {}:", label),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Center,
}

/// Top-down page composition with automatic page breaks.
struct Layout {
    pages: Vec<Vec<Operation>>,
    /// Distance of the next line's top edge from the page bottom.
    cursor: i64,
}

impl Layout {
    fn new() -> Self {
        Self {
            pages: vec![Vec::new()],
            cursor: PAGE_HEIGHT - MARGIN,
        }
    }

    fn new_page(&mut self) {
        self.pages.push(Vec::new());
        self.cursor = PAGE_HEIGHT - MARGIN;
    }

    fn reserve(&mut self, height: i64) {
        let page_is_blank = self.cursor == PAGE_HEIGHT - MARGIN;
        if self.cursor - height < MARGIN && !page_is_blank {
            self.new_page();
        }
    }

    fn ops(&mut self) -> &mut Vec<Operation> {
        if self.pages.is_empty() {
            self.pages.push(Vec::new());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn text(&mut self, text: &str, size: i64, align: Align) {
        let encoded = encode_win_ansi(text);
        for line in wrap(&encoded, size, CONTENT_WIDTH) {
            let leading = line_height(size);
            self.reserve(leading);
            self.cursor -= leading;

            let x = match align {
                Align::Left => MARGIN,
                Align::Center => MARGIN + ((CONTENT_WIDTH - text_width(&line, size)) / 2).max(0),
            };
            let baseline = self.cursor + (leading - size);

            let ops = self.ops();
            ops.push(Operation::new("BT", vec![]));
            ops.push(Operation::new(
                "Tf",
                vec![Object::Name(FONT_NAME.as_bytes().to_vec()), Object::Integer(size)],
            ));
            ops.push(Operation::new(
                "Td",
                vec![Object::Integer(x), Object::Integer(baseline)],
            ));
            ops.push(Operation::new("Tj", vec![Object::string_literal(line)]));
            ops.push(Operation::new("ET", vec![]));
        }
    }

    /// Blank line at the given font size.
    fn skip(&mut self, size: i64) {
        self.cursor -= line_height(size);
    }

    fn skip_half(&mut self, size: i64) {
        self.cursor -= line_height(size) / 2;
    }

    fn image(&mut self, width: i64, height: i64, align: Align) {
        self.reserve(height);
        self.cursor -= height;

        let x = match align {
            Align::Left => MARGIN,
            Align::Center => MARGIN + ((CONTENT_WIDTH - width) / 2).max(0),
        };
        let y = self.cursor;

        let ops = self.ops();
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new(
            "cm",
            vec![
                Object::Integer(width),
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(height),
                Object::Integer(x),
                Object::Integer(y),
            ],
        ));
        ops.push(Operation::new(
            "Do",
            vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())],
        ));
        ops.push(Operation::new("Q", vec![]));
    }
}

fn write_document<W: Write>(
    layout: Layout,
    image: Option<&SignatureImage>,
    out: &mut W,
) -> Result<(), RenderError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut resources = dictionary! {
        "Font" => dictionary! { FONT_NAME => font_id },
    };
    if let Some(image) = image {
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => Object::Integer(image.width as i64),
                "Height" => Object::Integer(image.height as i64),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => Object::Integer(8),
            },
            image.rgb.clone(),
        ));
        resources.set("XObject", dictionary! { IMAGE_NAME => image_id });
    }
    let resources_id = doc.add_object(resources);

    let mut kids: Vec<Object> = Vec::with_capacity(layout.pages.len());
    for operations in layout.pages {
        let content = Content { operations }
            .encode()
            .map_err(|e| RenderError::Pdf(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(page_count),
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH),
                Object::Integer(PAGE_HEIGHT),
            ],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc.save_to(out)
        .map_err(|e| RenderError::Pdf(e.to_string()))?;
    out.flush()?;
    Ok(())
}

fn line_height(size: i64) -> i64 {
    (size * 6 + 4) / 5
}

/// Maps text onto WinAnsi bytes.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c as u8,
            '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '€' => 0x80,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            _ => b'?',
        })
        .collect()
}

/// Greedy word wrap; single words wider than `max_width` overflow on their own line.
fn wrap(text: &[u8], size: i64, max_width: i64) -> Vec<Vec<u8>> {
    if text_width(text, size) <= max_width {
        return vec![text.to_vec()];
    }

    let mut lines: Vec<Vec<u8>> = Vec::new();
    let mut current: Vec<u8> = Vec::new();
    for word in text.split(|b| *b == b' ') {
        let mut candidate = current.clone();
        if !candidate.is_empty() {
            candidate.push(b' ');
        }
        candidate.extend_from_slice(word);

        if text_width(&candidate, size) <= max_width || current.is_empty() {
            current = candidate;
        } else {
            lines.push(std::mem::take(&mut current));
            current.extend_from_slice(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn text_width(text: &[u8], size: i64) -> i64 {
    let units: i64 = text.iter().map(|b| glyph_width(*b)).sum();
    units * size / 1000
}

/// Helvetica advance widths (1/1000 em) for printable ASCII.
const HELVETICA_WIDTHS: [i64; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

fn glyph_width(byte: u8) -> i64 {
    match byte {
        32..=126 => HELVETICA_WIDTHS[(byte - 32) as usize],
        _ => 556,
    }
}
