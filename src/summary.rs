use crate::canvas::{LayoutBackend, TextAlign};
use crate::columns::summary_columns;
use crate::error::Result;
use crate::font::FontStyle;
use crate::record::SummaryRow;
use crate::table::PageCursor;
use crate::types::{Color, Length, Rect};
use crate::wrap::{WrappedCell, wrap_text_with};

pub const META_SUMMARY: &str = "report.summary";

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryStyle {
    pub title: String,
    pub title_font: FontStyle,
    pub title_fill: Color,
    pub title_height: Length,
    /// Space between the title band and the header row.
    pub title_gap: Length,
    pub header_font: FontStyle,
    pub body_font: FontStyle,
    /// Height of the data row; header label lines are set at half of it.
    pub row_height: Length,
    pub column_widths: Vec<Length>,
    pub cell_margin: Length,
    pub trailing_gap: Length,
}

impl SummaryStyle {
    pub fn total_width(&self) -> Length {
        self.column_widths.iter().sum()
    }
}

/// Draws the summary block at the cursor: a filled title band, the wrapped
/// column labels and one data row with centred values. Nothing here checks
/// for a page break; the block is drawn where the cursor stands.
#[tracing::instrument(level = "debug", skip_all, fields(name = %summary.name()))]
pub fn render_summary<B: LayoutBackend + ?Sized>(
    backend: &mut B,
    cursor: &mut PageCursor,
    summary: &SummaryRow,
    style: &SummaryStyle,
) -> Result<()> {
    let template = backend.template();
    let left = template.content_left();
    let content_width = template.content_width();
    backend.meta(META_SUMMARY, summary.name());

    backend.draw_band(
        Rect::new(left, cursor.y, content_width, style.title_height),
        &style.title,
        &style.title_font,
        style.title_fill,
    )?;
    cursor.advance(style.title_height + style.title_gap);

    let x_start = left + (content_width - style.total_width()).half();
    let half = style.row_height.half();
    let labels = wrap_labels(style, &*backend)?;
    let band = labels
        .iter()
        .map(|cell| cell.height(half))
        .max()
        .unwrap_or(half);

    let mut x = x_start;
    for (label, width) in labels.iter().zip(&style.column_widths) {
        backend.draw_wrapped_text(
            Rect::new(x, cursor.y, *width, band),
            label.lines(),
            half,
            &style.header_font,
            TextAlign::Center,
        )?;
        x += *width;
    }
    cursor.advance(band);

    let mut x = x_start;
    for (value, width) in summary.values().iter().zip(&style.column_widths) {
        backend.draw_bordered_cell(
            Rect::new(x, cursor.y, *width, style.row_height),
            value,
            &style.body_font,
            TextAlign::Center,
        )?;
        x += *width;
    }
    cursor.advance(style.row_height + style.trailing_gap);
    tracing::debug!(y = %cursor.y, band = %band, "summary block drawn");
    Ok(())
}

fn wrap_labels<B: LayoutBackend + ?Sized>(style: &SummaryStyle, backend: &B) -> Result<Vec<WrappedCell>> {
    let font = &style.header_font;
    summary_columns()
        .iter()
        .zip(&style.column_widths)
        .map(|(column, width)| {
            let target = (*width - style.cell_margin * 2).max(Length::ZERO);
            wrap_text_with(&column.label, target, |line| backend.measure_text(line, font))
        })
        .collect()
}
