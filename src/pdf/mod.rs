pub mod metrics;

use std::io::BufWriter;
use std::path::Path;

use printpdf::image_crate::{self, DynamicImage};
use printpdf::path::PaintMode;
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfLayerReference, Rect, Rgb,
};

use crate::config::Settings;
use crate::error::{InvoiceError, Result};
use crate::model::{format_currency, InvoiceRecord, LineItem};
use metrics::{fit_text, text_width_pt, FontFace};

// US Letter, in points. All layout below is in points with a bottom-left origin.
const PAGE_W: f32 = 612.0;
const PAGE_H: f32 = 792.0;
const MARGIN_LEFT: f32 = 40.0;
const MARGIN_RIGHT: f32 = 50.0;

const TITLE: &str = "INVOICE";
const TITLE_SIZE: f32 = 18.0;

const LOGO_W: f32 = 100.0;
const LOGO_H: f32 = 35.0;
const LOGO_DPI: f32 = 300.0;

const TEXT_SIZE: f32 = 10.0;
const LABEL_SIZE: f32 = 9.0;
const TERMS_SIZE: f32 = 7.0;

const COL_DESC_W: f32 = 400.0;
const COL_TOTALS_W: f32 = 130.0;
const CELL_PAD_X: f32 = 6.0;
const ROW_H: f32 = 18.0;
const HEADER_ROW_H: f32 = 23.0;
const ROW_BASELINE: f32 = 5.0;
const HEADER_BASELINE: f32 = 10.0;
const GRID_THICKNESS: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RgbColor(pub f32, pub f32, pub f32);

impl RgbColor {
    pub const BLACK: RgbColor = RgbColor(0.0, 0.0, 0.0);
    pub const RED: RgbColor = RgbColor(1.0, 0.0, 0.0);
    pub const YELLOW: RgbColor = RgbColor(1.0, 1.0, 0.0);
    pub const GREEN: RgbColor = RgbColor(0.0, 0.502, 0.0);
    pub const CORNFLOWER: RgbColor = RgbColor(0.392, 0.584, 0.929);
    pub const GREY: RgbColor = RgbColor(0.502, 0.502, 0.502);
    pub const WHITESMOKE: RgbColor = RgbColor(0.961, 0.961, 0.961);
    pub const BEIGE: RgbColor = RgbColor(0.961, 0.961, 0.863);

    fn to_color(self) -> Color {
        Color::Rgb(Rgb::new(self.0, self.1, self.2, None))
    }
}

/// The four carbon-copy equivalents, in page order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyVariant {
    Client,
    Accounting,
    Office,
    Records,
}

impl CopyVariant {
    pub const ALL: [CopyVariant; 4] = [
        CopyVariant::Client,
        CopyVariant::Accounting,
        CopyVariant::Office,
        CopyVariant::Records,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CopyVariant::Client => "Client Copy",
            CopyVariant::Accounting => "Accounting Copy",
            CopyVariant::Office => "Office Copy",
            CopyVariant::Records => "Records Copy",
        }
    }

    pub fn tag_color(self) -> Option<RgbColor> {
        match self {
            CopyVariant::Client => None,
            CopyVariant::Accounting => Some(RgbColor::YELLOW),
            CopyVariant::Office => Some(RgbColor::GREEN),
            CopyVariant::Records => Some(RgbColor::CORNFLOWER),
        }
    }
}

/// Body of the two-column table: descriptions on the left, the four totals on the right.
/// Both columns always have the same length; the shorter one is padded with empty cells.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTable {
    pub descriptions: Vec<String>,
    pub totals: Vec<String>,
}

impl SummaryTable {
    pub fn build(record: &InvoiceRecord, items: &[LineItem]) -> SummaryTable {
        let mut descriptions: Vec<String> = items.iter().map(|it| it.description.clone()).collect();
        let tax_cell = |name: &str, amount: rust_decimal::Decimal| {
            if amount.is_zero() {
                format!("{name}: Exempt")
            } else {
                format!("{name}: {}", format_currency(amount))
            }
        };
        let mut totals = vec![
            format!("Subtotal: {}", format_currency(record.subtotal)),
            tax_cell("PST", record.pst),
            tax_cell("GST", record.gst),
            format!("Total: {}", format_currency(record.total)),
        ];

        let rows = descriptions.len().max(totals.len());
        descriptions.resize(rows, String::new());
        totals.resize(rows, String::new());

        SummaryTable { descriptions, totals }
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    pub fn rows(&self) -> impl Iterator<Item = (&str, &str)> {
        self.descriptions
            .iter()
            .map(String::as_str)
            .zip(self.totals.iter().map(String::as_str))
    }

    fn height(&self) -> f32 {
        HEADER_ROW_H + ROW_H * self.len() as f32
    }
}

/// `Label: value` lines of the details block; empty values produce no line at all.
pub fn detail_lines(record: &InvoiceRecord) -> Result<Vec<String>> {
    let address = record.client_address.as_deref().map(|a| {
        a.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    });
    let date = record.date_string()?;

    let details: [(&str, Option<&str>); 7] = [
        ("Client", Some(record.client.as_str())),
        ("Client Address", address.as_deref()),
        ("Date", Some(date.as_str())),
        ("Initials", record.initials.as_deref()),
        ("Quote Number", record.quote_number.as_deref()),
        ("Ship Via", Some(record.ship_via.as_str())),
        ("Invoice Type", Some(record.invoice_type.as_str())),
    ];

    Ok(details
        .into_iter()
        .filter_map(|(label, value)| {
            let value = value?.trim();
            (!value.is_empty()).then(|| format!("{label}: {value}"))
        })
        .collect())
}

/// Optional logo: absent file means no logo, an undecodable one is skipped with a warning.
fn load_logo(path: &Path) -> Option<DynamicImage> {
    if !path.is_file() {
        return None;
    }
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "logo unreadable, rendering without it");
            return None;
        }
    };
    match image_crate::load_from_memory(&bytes) {
        Ok(img) => Some(flatten_on_white(&img)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "logo undecodable, rendering without it");
            None
        }
    }
}

fn flatten_on_white(img: &DynamicImage) -> DynamicImage {
    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    let mut rgb = image_crate::RgbImage::new(w, h);
    for (x, y, px) in rgba.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        let a = a as u16;
        let blend = |c: u8| ((c as u16 * a + 255 * (255 - a)) / 255) as u8;
        rgb.put_pixel(x, y, image_crate::Rgb([blend(r), blend(g), blend(b)]));
    }
    DynamicImage::ImageRgb8(rgb)
}

fn pt(v: f32) -> Mm {
    Mm(v * 25.4 / 72.0)
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

impl Fonts {
    fn get(&self, face: FontFace) -> &IndirectFontRef {
        match face {
            FontFace::Regular => &self.regular,
            FontFace::Bold => &self.bold,
        }
    }
}

struct PageWriter<'a> {
    layer: PdfLayerReference,
    fonts: &'a Fonts,
}

impl PageWriter<'_> {
    fn text(&self, face: FontFace, text: &str, size: f32, x: f32, y: f32, color: RgbColor) {
        if text.is_empty() {
            return;
        }
        self.layer.set_fill_color(color.to_color());
        self.layer.use_text(text, size, pt(x), pt(y), self.fonts.get(face));
    }

    fn text_right(&self, face: FontFace, text: &str, size: f32, x_right: f32, y: f32, color: RgbColor) {
        let x = x_right - text_width_pt(face, text, size);
        self.text(face, text, size, x, y, color);
    }

    fn fill_rect(&self, x: f32, y: f32, w: f32, h: f32, color: RgbColor) {
        self.layer.set_fill_color(color.to_color());
        let rect = Rect::new(pt(x), pt(y), pt(x + w), pt(y + h)).with_mode(PaintMode::Fill);
        self.layer.add_rect(rect);
    }

    fn stroke_rect(&self, x: f32, y: f32, w: f32, h: f32) {
        self.layer.set_outline_color(RgbColor::BLACK.to_color());
        self.layer.set_outline_thickness(GRID_THICKNESS);
        let rect = Rect::new(pt(x), pt(y), pt(x + w), pt(y + h)).with_mode(PaintMode::Stroke);
        self.layer.add_rect(rect);
    }

    fn logo(&self, img: &DynamicImage, x: f32, y: f32) {
        let natural_w = img.width().max(1) as f32 / LOGO_DPI * 72.0;
        let natural_h = img.height().max(1) as f32 / LOGO_DPI * 72.0;
        Image::from_dynamic_image(img).add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(pt(x)),
                translate_y: Some(pt(y)),
                rotate: None,
                scale_x: Some(LOGO_W / natural_w),
                scale_y: Some(LOGO_H / natural_h),
                dpi: Some(LOGO_DPI),
            },
        );
    }
}

struct PageContent<'a> {
    record: &'a InvoiceRecord,
    details: &'a [String],
    table: &'a SummaryTable,
    logo: Option<&'a DynamicImage>,
    settings: &'a Settings,
}

fn draw_copy(page: &PageWriter<'_>, variant: CopyVariant, content: &PageContent<'_>) {
    let right_x = PAGE_W - MARGIN_RIGHT;

    // Title block, top right. The tag colour sits behind the title.
    let title_w = text_width_pt(FontFace::Bold, TITLE, TITLE_SIZE);
    let title_box_x = right_x - title_w;
    let title_box_y = PAGE_H - 50.0;
    if let Some(color) = variant.tag_color() {
        page.fill_rect(title_box_x - 5.0, title_box_y - 5.0, title_w + 10.0, 25.0, color);
    }
    page.text_right(FontFace::Bold, TITLE, TITLE_SIZE, right_x, title_box_y + 10.0, RgbColor::BLACK);
    page.text_right(FontFace::Regular, variant.label(), LABEL_SIZE, right_x, title_box_y - 5.0, RgbColor::BLACK);
    page.text_right(
        FontFace::Regular,
        &content.record.invoice_number,
        TEXT_SIZE,
        right_x,
        title_box_y - 20.0,
        RgbColor::RED,
    );

    // Letterhead, top left.
    let logo_y_top = PAGE_H - 80.0;
    if let Some(img) = content.logo {
        page.logo(img, MARGIN_LEFT, logo_y_top + 5.0);
    }
    let info_y = logo_y_top - 25.0;
    for (idx, line) in content.settings.company_lines().iter().enumerate() {
        page.text(FontFace::Regular, line, TEXT_SIZE, MARGIN_LEFT, info_y - 15.0 * idx as f32, RgbColor::BLACK);
    }

    let mut y = info_y - 50.0;
    for line in content.details {
        page.text(FontFace::Regular, line, TEXT_SIZE, MARGIN_LEFT, y, RgbColor::BLACK);
        y -= 15.0;
    }
    y -= 10.0;

    let table_bottom = draw_summary_table(page, content.table, MARGIN_LEFT, y);

    let mut y = table_bottom - 30.0;
    for line in &content.settings.terms {
        page.text(FontFace::Regular, line, TERMS_SIZE, MARGIN_LEFT, y, RgbColor::BLACK);
        y -= 10.0;
    }
}

/// Draws the table with its top edge at `top`; returns the y of its bottom edge.
fn draw_summary_table(page: &PageWriter<'_>, table: &SummaryTable, x: f32, top: f32) -> f32 {
    let table_w = COL_DESC_W + COL_TOTALS_W;
    let totals_x = x + COL_DESC_W;

    // Header row
    let header_bottom = top - HEADER_ROW_H;
    page.fill_rect(x, header_bottom, table_w, HEADER_ROW_H, RgbColor::GREY);
    page.text(
        FontFace::Bold,
        "Description",
        TEXT_SIZE,
        x + CELL_PAD_X,
        header_bottom + HEADER_BASELINE,
        RgbColor::WHITESMOKE,
    );
    page.stroke_rect(x, header_bottom, COL_DESC_W, HEADER_ROW_H);
    page.stroke_rect(totals_x, header_bottom, COL_TOTALS_W, HEADER_ROW_H);

    // Body rows
    let body_bottom = top - table.height();
    page.fill_rect(x, body_bottom, table_w, header_bottom - body_bottom, RgbColor::BEIGE);

    let last = table.len().saturating_sub(1);
    for (idx, (desc, total)) in table.rows().enumerate() {
        let row_bottom = header_bottom - ROW_H * (idx + 1) as f32;
        let baseline = row_bottom + ROW_BASELINE;

        let desc = fit_text(FontFace::Regular, desc, TEXT_SIZE, COL_DESC_W - 2.0 * CELL_PAD_X);
        page.text(FontFace::Regular, &desc, TEXT_SIZE, x + CELL_PAD_X, baseline, RgbColor::BLACK);

        let face = if idx == last { FontFace::Bold } else { FontFace::Regular };
        page.text_right(face, total, TEXT_SIZE, totals_x + COL_TOTALS_W - CELL_PAD_X, baseline, RgbColor::BLACK);

        page.stroke_rect(x, row_bottom, COL_DESC_W, ROW_H);
        page.stroke_rect(totals_x, row_bottom, COL_TOTALS_W, ROW_H);
    }

    body_bottom
}

/// Renders the four-copy invoice into PDF bytes.
pub fn render_invoice_pdf_bytes(record: &InvoiceRecord, items: &[LineItem], settings: &Settings) -> Result<Vec<u8>> {
    let details = detail_lines(record)?;
    let table = SummaryTable::build(record, items);
    let logo = load_logo(&settings.logo_path);
    let content = PageContent {
        record,
        details: &details,
        table: &table,
        logo: logo.as_ref(),
        settings,
    };

    let doc_title = format!("Invoice {}", record.invoice_number);
    let (doc, first_page, first_layer) = PdfDocument::new(&doc_title, pt(PAGE_W), pt(PAGE_H), "Layer 1");
    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| InvoiceError::Pdf(e.to_string()))?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| InvoiceError::Pdf(e.to_string()))?,
    };

    for (idx, variant) in CopyVariant::ALL.into_iter().enumerate() {
        let (page_idx, layer_idx) = if idx == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(pt(PAGE_W), pt(PAGE_H), "Layer 1")
        };
        let page = PageWriter {
            layer: doc.get_page(page_idx).get_layer(layer_idx),
            fonts: &fonts,
        };
        draw_copy(&page, variant, &content);
    }

    let mut writer = BufWriter::new(Vec::<u8>::new());
    doc.save(&mut writer).map_err(|e| InvoiceError::Pdf(e.to_string()))?;
    let bytes = writer.into_inner().map_err(|e| InvoiceError::Pdf(e.to_string()))?;
    Ok(bytes)
}

/// Renders the invoice and writes it to `output_path`. The parent directory must exist.
pub fn render(record: &InvoiceRecord, items: &[LineItem], output_path: &Path, settings: &Settings) -> Result<()> {
    let bytes = render_invoice_pdf_bytes(record, items, settings)?;
    std::fs::write(output_path, bytes)?;
    Ok(())
}
