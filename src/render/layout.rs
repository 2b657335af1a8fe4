use crate::query::QueryResult;
use crate::render::RenderConfig;
use std::ops::Range;

/// Page margins, 0.5 inch all around.
pub const MARGIN_PT: f32 = 36.0;
/// Vertical space reserved for the title line on every page.
const TITLE_LINE_PT: f32 = 26.0;
/// Extra space when a subtitle line is present.
const SUBTITLE_LINE_PT: f32 = 16.0;
/// Space reserved for the page footer.
const FOOTER_PT: f32 = 24.0;
/// Narrowest readable column, in characters at the current font size.
const MIN_COL_CHARS: usize = 6;
/// The font never shrinks below this; past it, content truncates harder.
const MIN_FONT_PT: f32 = 5.0;
const FONT_STEP_PT: f32 = 0.5;
/// Average Helvetica glyph advance as a fraction of the font size. Good
/// enough for column fitting; exact metrics are not needed because cells
/// truncate to their column's character budget anyway.
const AVG_CHAR_WIDTH: f32 = 0.55;

/// Placement plan for one column: final width plus the character budget
/// cells must truncate to.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnPlan {
    pub header: String,
    pub width_pt: f32,
    pub cell_chars: usize,
}

/// Output of the first layout pass. Knows everything page drawing needs,
/// including the total page count, so footers can say "Page N of M".
#[derive(Debug, Clone, PartialEq)]
pub struct TableLayout {
    pub columns: Vec<ColumnPlan>,
    pub body_font_pt: f32,
    pub header_font_pt: f32,
    pub row_height_pt: f32,
    pub header_row_height_pt: f32,
    pub available_width_pt: f32,
    pub rows_per_page: usize,
    pub total_pages: usize,
    row_count: usize,
}

impl TableLayout {
    /// The row indices that land on the given zero-based page.
    pub fn page_rows(&self, page: usize) -> Range<usize> {
        let start = (page * self.rows_per_page).min(self.row_count);
        let end = (start + self.rows_per_page).min(self.row_count);
        start..end
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }
}

/// Truncates `text` to `max_chars`, marking overflow with an ellipsis.
pub fn fit_cell(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(1);
    let mut out: String = text.chars().take(keep).collect();
    out.push('…');
    out
}

fn char_width_pt(font_pt: f32) -> f32 {
    font_pt * AVG_CHAR_WIDTH
}

/// Natural width of each column in characters: the widest of the header
/// and every cell's display text, with cells capped at `max_cell_chars`.
fn natural_widths(data: &QueryResult, config: &RenderConfig) -> Vec<usize> {
    let mut widths: Vec<usize> = data
        .columns()
        .iter()
        .map(|c| c.name.chars().count().max(1))
        .collect();
    for row in data.rows() {
        for (i, cell) in row.iter().enumerate() {
            let chars = cell
                .display(&config.null_placeholder)
                .chars()
                .count()
                .min(config.max_cell_chars);
            if chars > widths[i] {
                widths[i] = chars;
            }
        }
    }
    widths
}

/// Distributes `available` points across columns proportionally to their
/// natural widths, then raises any column below the minimum and takes the
/// difference back from the columns above it. Terminates because each pass
/// fixes at least one column at the minimum.
fn distribute_widths(naturals: &[usize], available: f32, min_pt: f32) -> Vec<f32> {
    let n = naturals.len();
    if n == 0 {
        return Vec::new();
    }
    // Minimums alone exceed the page even at the font floor: equal split.
    if min_pt * n as f32 >= available {
        return vec![available / n as f32; n];
    }

    let mut widths = vec![0.0f32; n];
    let mut fixed = vec![false; n];
    loop {
        let free: f32 = available
            - widths
                .iter()
                .zip(&fixed)
                .filter(|(_, &f)| f)
                .map(|(w, _)| *w)
                .sum::<f32>();
        let weight: usize = naturals
            .iter()
            .zip(&fixed)
            .filter(|(_, &f)| !f)
            .map(|(nat, _)| *nat)
            .sum();
        if weight == 0 {
            break;
        }
        let mut clamped_any = false;
        for i in 0..n {
            if fixed[i] {
                continue;
            }
            let share = free * naturals[i] as f32 / weight as f32;
            if share < min_pt {
                widths[i] = min_pt;
                fixed[i] = true;
                clamped_any = true;
            } else {
                widths[i] = share;
            }
        }
        if !clamped_any {
            break;
        }
    }
    widths
}

/// First pass of the two-pass render: decides the font size, the column
/// widths, and how many data rows fit on a page. Pure; same inputs always
/// produce the same layout.
pub fn compute_layout(data: &QueryResult, config: &RenderConfig) -> TableLayout {
    let (page_w, page_h) = config.page_dimensions_pt();
    let available_width = page_w - 2.0 * MARGIN_PT;
    let naturals = natural_widths(data, config);
    let n_cols = naturals.len();

    // Shrink the font before truncating columns: the readability floor is
    // expressed in characters, so a smaller font lowers it in points.
    let mut body_font = config.style.body_font_size;
    while body_font > MIN_FONT_PT
        && MIN_COL_CHARS as f32 * char_width_pt(body_font) * n_cols as f32 > available_width
    {
        body_font -= FONT_STEP_PT;
    }
    let header_font = config.style.header_font_size.min(body_font + 2.0);

    let min_pt = MIN_COL_CHARS as f32 * char_width_pt(body_font);
    let width_pts = distribute_widths(&naturals, available_width, min_pt);

    let columns: Vec<ColumnPlan> = data
        .columns()
        .iter()
        .zip(&width_pts)
        .map(|(col, &width_pt)| {
            // Leave half a character of padding on each side of the cell.
            let budget = (width_pt / char_width_pt(body_font) - 1.0).floor();
            let cell_chars = (budget.max(1.0) as usize).min(config.max_cell_chars);
            ColumnPlan {
                header: col.name.clone(),
                width_pt,
                cell_chars,
            }
        })
        .collect();

    let row_height = body_font * 1.4 + 6.0;
    let header_row_height = header_font * 1.4 + 10.0;
    let title_block = TITLE_LINE_PT
        + if config.subtitle.is_some() {
            SUBTITLE_LINE_PT
        } else {
            0.0
        };
    let body_space = page_h - 2.0 * MARGIN_PT - title_block - header_row_height - FOOTER_PT;
    let rows_per_page = ((body_space / row_height).floor() as usize).max(1);

    let row_count = data.row_count();
    let total_pages = if row_count == 0 {
        1
    } else {
        row_count.div_ceil(rows_per_page)
    };

    TableLayout {
        columns,
        body_font_pt: body_font,
        header_font_pt: header_font,
        row_height_pt: row_height,
        header_row_height_pt: header_row_height,
        available_width_pt: available_width,
        rows_per_page,
        total_pages,
        row_count,
    }
}
