use crate::error::{ExportError, Result};
use crate::query::QueryResult;
use crate::render::layout::{compute_layout, fit_cell, TableLayout, MARGIN_PT};
use crate::render::{Color, RenderConfig, RenderedDocument};
use printpdf::path::PaintMode;
use printpdf::{
    BuiltinFont, Color as PdfColor, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference,
    Point, Rect, Rgb,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::{debug, info};

const PT_TO_MM: f32 = 0.352_778;
const TITLE_FONT_PT: f32 = 16.0;
const SUBTITLE_FONT_PT: f32 = 10.0;
const FOOTER_FONT_PT: f32 = 8.0;
const CELL_PAD_PT: f32 = 3.0;
const GRID_THICKNESS: f32 = 0.5;
const NO_DATA_MARKER: &str = "No rows returned";

fn mm(pt: f32) -> Mm {
    Mm(pt * PT_TO_MM)
}

fn pdf_color(c: Color) -> PdfColor {
    PdfColor::Rgb(Rgb::new(c.r, c.g, c.b, None))
}

/// Renders a [`QueryResult`] into a paginated PDF table. Two passes: the
/// layout pass fixes fonts, column widths and the page count, then each
/// page is drawn with a repeated title, header row and `Page N of M`
/// footer. An existing file at the output path is overwritten.
pub struct TableRenderer;

impl TableRenderer {
    pub fn new() -> Self {
        Self
    }

    pub fn render(
        &self,
        data: &QueryResult,
        output_path: impl AsRef<Path>,
        config: &RenderConfig,
    ) -> Result<RenderedDocument> {
        let output_path = output_path.as_ref();
        if let Some(dir) = output_path.parent() {
            if !dir.as_os_str().is_empty() && !dir.is_dir() {
                return Err(ExportError::Render(format!(
                    "output directory does not exist: {}",
                    dir.display()
                )));
            }
        }

        let layout = compute_layout(data, config);
        debug!(
            pages = layout.total_pages,
            rows_per_page = layout.rows_per_page,
            font_pt = layout.body_font_pt,
            "Computed table layout"
        );

        let (page_w, page_h) = config.page_dimensions_pt();
        let (doc, first_page, first_layer) =
            PdfDocument::new(&config.title, mm(page_w), mm(page_h), "table");
        // Pinned metadata: the document ID and dates would otherwise be
        // generated at save time, breaking byte-identity between renders
        // of the same result and config.
        let doc = doc
            .with_document_id(format!("dashex:{}", config.title))
            .with_creation_date(OffsetDateTime::UNIX_EPOCH)
            .with_mod_date(OffsetDateTime::UNIX_EPOCH);
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ExportError::Render(e.to_string()))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ExportError::Render(e.to_string()))?;
        let fonts = PageFonts { font, bold };

        for page_idx in 0..layout.total_pages {
            let layer = if page_idx == 0 {
                doc.get_page(first_page).get_layer(first_layer)
            } else {
                let (page, layer) = doc.add_page(mm(page_w), mm(page_h), "table");
                doc.get_page(page).get_layer(layer)
            };
            draw_page(&layer, data, config, &layout, &fonts, page_idx, page_h);
        }

        let file = File::create(output_path)
            .map_err(|e| ExportError::Render(format!("{}: {e}", output_path.display())))?;
        doc.save(&mut BufWriter::new(file))
            .map_err(|e| ExportError::Render(e.to_string()))?;

        let bytes = std::fs::metadata(output_path).map(|m| m.len()).unwrap_or(0);
        info!(path = %output_path.display(), bytes, pages = layout.total_pages, "PDF written");
        Ok(RenderedDocument {
            path: PathBuf::from(output_path),
            bytes,
            page_count: layout.total_pages,
        })
    }
}

impl Default for TableRenderer {
    fn default() -> Self {
        Self::new()
    }
}

struct PageFonts {
    font: IndirectFontRef,
    bold: IndirectFontRef,
}

/// Rough centered-text x position from the character-width model used by
/// the layout pass.
fn centered_x(text: &str, font_pt: f32, page_w: f32) -> f32 {
    let width = text.chars().count() as f32 * font_pt * 0.55;
    ((page_w - width) / 2.0).max(MARGIN_PT)
}

fn fill_rect(layer: &PdfLayerReference, x: f32, y_bottom: f32, w: f32, h: f32, color: Color) {
    layer.set_fill_color(pdf_color(color));
    let rect = Rect::new(mm(x), mm(y_bottom), mm(x + w), mm(y_bottom + h))
        .with_mode(PaintMode::Fill);
    layer.add_rect(rect);
}

fn stroke_line(layer: &PdfLayerReference, x1: f32, y1: f32, x2: f32, y2: f32) {
    let line = Line {
        points: vec![
            (Point::new(mm(x1), mm(y1)), false),
            (Point::new(mm(x2), mm(y2)), false),
        ],
        is_closed: false,
    };
    layer.add_line(line);
}

fn draw_page(
    layer: &PdfLayerReference,
    data: &QueryResult,
    config: &RenderConfig,
    layout: &TableLayout,
    fonts: &PageFonts,
    page_idx: usize,
    page_h: f32,
) {
    let style = &config.style;
    let page_w = layout.available_width_pt + 2.0 * MARGIN_PT;
    // y measured from the top edge; printpdf's origin is bottom-left.
    let mut y_top = MARGIN_PT + TITLE_FONT_PT;

    layer.set_fill_color(pdf_color(Color::new(0.1, 0.1, 0.1)));
    layer.use_text(
        config.title.as_str(),
        TITLE_FONT_PT,
        mm(centered_x(&config.title, TITLE_FONT_PT, page_w)),
        mm(page_h - y_top),
        &fonts.bold,
    );
    y_top += 10.0;

    if let Some(subtitle) = &config.subtitle {
        y_top += SUBTITLE_FONT_PT;
        layer.set_fill_color(pdf_color(Color::new(0.4, 0.4, 0.4)));
        layer.use_text(
            subtitle.as_str(),
            SUBTITLE_FONT_PT,
            mm(centered_x(subtitle, SUBTITLE_FONT_PT, page_w)),
            mm(page_h - y_top),
            &fonts.font,
        );
        y_top += 6.0;
    }

    // Header row, repeated on every page.
    let header_h = layout.header_row_height_pt;
    let header_bottom = page_h - y_top - header_h;
    fill_rect(
        layer,
        MARGIN_PT,
        header_bottom,
        layout.available_width_pt,
        header_h,
        style.header_fill,
    );
    layer.set_fill_color(pdf_color(style.header_text));
    let mut x = MARGIN_PT;
    for col in &layout.columns {
        let text = fit_cell(&col.header, col.cell_chars.max(1));
        layer.use_text(
            text,
            layout.header_font_pt,
            mm(x + CELL_PAD_PT),
            mm(header_bottom + (header_h - layout.header_font_pt) / 2.0),
            &fonts.bold,
        );
        x += col.width_pt;
    }

    let body_top = header_bottom;
    let rows = layout.page_rows(page_idx);
    let rows_on_page = rows.len();

    if data.is_empty() {
        layer.set_fill_color(pdf_color(Color::new(0.4, 0.4, 0.4)));
        layer.use_text(
            NO_DATA_MARKER,
            layout.body_font_pt.max(8.0),
            mm(centered_x(NO_DATA_MARKER, layout.body_font_pt.max(8.0), page_w)),
            mm(body_top - layout.row_height_pt),
            &fonts.font,
        );
    }

    for (offset, row_idx) in rows.clone().enumerate() {
        let row_bottom = body_top - (offset as f32 + 1.0) * layout.row_height_pt;
        // Stripe by absolute row index so shading stays stable across pages.
        if row_idx % 2 == 1 {
            fill_rect(
                layer,
                MARGIN_PT,
                row_bottom,
                layout.available_width_pt,
                layout.row_height_pt,
                style.stripe_fill,
            );
        }
        layer.set_fill_color(pdf_color(style.body_text));
        let mut x = MARGIN_PT;
        for (col, cell) in layout.columns.iter().zip(&data.rows()[row_idx]) {
            let text = fit_cell(&cell.display(&config.null_placeholder), col.cell_chars);
            layer.use_text(
                text,
                layout.body_font_pt,
                mm(x + CELL_PAD_PT),
                mm(row_bottom + (layout.row_height_pt - layout.body_font_pt) / 2.0),
                &fonts.font,
            );
            x += col.width_pt;
        }
    }

    // Hairline grid over the header and the rows drawn on this page.
    layer.set_outline_color(pdf_color(style.grid));
    layer.set_outline_thickness(GRID_THICKNESS);
    let grid_top = body_top + header_h;
    let grid_bottom = body_top - rows_on_page as f32 * layout.row_height_pt;
    let mut x = MARGIN_PT;
    for col in &layout.columns {
        stroke_line(layer, x, grid_bottom, x, grid_top);
        x += col.width_pt;
    }
    stroke_line(layer, x, grid_bottom, x, grid_top);
    let mut y = grid_top;
    stroke_line(layer, MARGIN_PT, y, x, y);
    y -= header_h;
    stroke_line(layer, MARGIN_PT, y, x, y);
    for _ in 0..rows_on_page {
        y -= layout.row_height_pt;
        stroke_line(layer, MARGIN_PT, y, x, y);
    }

    // Footer: current/total pages, plus the row total on the last page.
    let footer = if page_idx + 1 == layout.total_pages {
        format!(
            "Page {} of {} — Total rows: {}",
            page_idx + 1,
            layout.total_pages,
            layout.row_count()
        )
    } else {
        format!("Page {} of {}", page_idx + 1, layout.total_pages)
    };
    layer.set_fill_color(pdf_color(Color::new(0.4, 0.4, 0.4)));
    layer.use_text(
        footer.as_str(),
        FOOTER_FONT_PT,
        mm(centered_x(&footer, FOOTER_FONT_PT, page_w)),
        mm(MARGIN_PT / 2.0),
        &fonts.font,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{CellValue, Column, QueryResult};
    use std::io::Write;

    fn sample_result(n_rows: usize) -> QueryResult {
        let columns = vec![
            Column::new("id", "BIGINT"),
            Column::new("name", "STRING"),
            Column::new("amount", "DECIMAL(10,2)"),
        ];
        let rows = (0..n_rows)
            .map(|i| {
                vec![
                    CellValue::Number(i.to_string()),
                    if i % 5 == 0 {
                        CellValue::Null
                    } else {
                        CellValue::Text(format!("customer {i}"))
                    },
                    CellValue::Number(format!("{i}.00")),
                ]
            })
            .collect();
        QueryResult::new(columns, rows, false).unwrap()
    }

    fn read_header(path: &Path) -> [u8; 5] {
        let bytes = std::fs::read(path).unwrap();
        bytes[..5].try_into().unwrap()
    }

    #[test]
    fn test_render_writes_single_page_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        let doc = TableRenderer::new()
            .render(&sample_result(3), &path, &RenderConfig::default())
            .unwrap();

        assert_eq!(doc.path, path);
        assert_eq!(doc.page_count, 1);
        assert!(doc.bytes > 0);
        assert_eq!(&read_header(&path), b"%PDF-");
    }

    #[test]
    fn test_render_is_byte_identical_for_same_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.pdf");
        let second = dir.path().join("second.pdf");
        let data = sample_result(5);
        let config = RenderConfig {
            subtitle: Some("Generated: 2024-03-09 14:30:05".to_string()),
            ..RenderConfig::default()
        };

        TableRenderer::new().render(&data, &first, &config).unwrap();
        TableRenderer::new().render(&data, &second, &config).unwrap();

        assert_eq!(
            std::fs::read(&first).unwrap(),
            std::fs::read(&second).unwrap()
        );
    }

    #[test]
    fn test_render_empty_result_produces_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.pdf");
        let doc = TableRenderer::new()
            .render(&sample_result(0), &path, &RenderConfig::default())
            .unwrap();
        assert_eq!(doc.page_count, 1);
        assert_eq!(&read_header(&path), b"%PDF-");
    }

    #[test]
    fn test_render_paginates_large_results() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("large.pdf");
        let data = sample_result(400);
        let config = RenderConfig::default();
        let expected = compute_layout(&data, &config).total_pages;

        let doc = TableRenderer::new().render(&data, &path, &config).unwrap();
        assert!(doc.page_count > 1);
        assert_eq!(doc.page_count, expected);
    }

    #[test]
    fn test_render_missing_directory_is_render_error() {
        let err = TableRenderer::new()
            .render(
                &sample_result(3),
                "/definitely/not/a/real/dir/report.pdf",
                &RenderConfig::default(),
            )
            .unwrap_err();
        assert!(matches!(err, ExportError::Render(_)));
    }

    #[test]
    fn test_render_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        let mut stale = File::create(&path).unwrap();
        stale.write_all(b"not a pdf").unwrap();
        drop(stale);

        TableRenderer::new()
            .render(&sample_result(3), &path, &RenderConfig::default())
            .unwrap();
        assert_eq!(&read_header(&path), b"%PDF-");
    }

    #[test]
    fn test_render_with_subtitle_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dated.pdf");
        let config = RenderConfig {
            subtitle: Some("Generated: 2024-03-09 14:30:05".to_string()),
            ..RenderConfig::default()
        };
        let doc = TableRenderer::new()
            .render(&sample_result(3), &path, &config)
            .unwrap();
        assert_eq!(doc.page_count, 1);
    }
}
