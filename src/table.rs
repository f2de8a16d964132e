//! Activity table pagination.
//!
//! The renderer is a small state machine over a row cursor. A row is never
//! split: when it does not fit above the page's usable bottom the renderer
//! starts a new page, repeats the header and retries the same row there.

use crate::canvas::{LayoutBackend, TextAlign};
use crate::columns::{ColumnSpec, ColumnWidths, SizingParams, size_columns_with};
use crate::error::Result;
use crate::font::FontStyle;
use crate::record::Record;
use crate::types::{Length, Rect};
use crate::wrap::{WrappedCell, wrap_text_with};

pub const META_TABLE_HEADER: &str = "report.table.header";
pub const META_TABLE_ROW: &str = "report.table.row";

/// Vertical position of the next thing to draw, and the page it is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub y: Length,
    pub page_index: usize,
}

impl PageCursor {
    pub fn at_top<B: LayoutBackend + ?Sized>(backend: &B) -> Self {
        Self {
            y: backend.content_top(),
            page_index: backend.page_index(),
        }
    }

    pub fn advance(&mut self, height: Length) {
        self.y += height;
    }

    fn reset<B: LayoutBackend + ?Sized>(&mut self, backend: &B) {
        *self = Self::at_top(backend);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    DrawingHeader,
    DrawingRow,
    PageBreak,
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableStyle {
    pub header_font: FontStyle,
    pub body_font: FontStyle,
    /// Minimum height of a body row; header lines are set at half of it.
    pub row_height: Length,
    /// Height of one wrapped line in the flexible column.
    pub line_height: Length,
    /// Horizontal padding added to measured content when sizing columns.
    pub padding: Length,
    /// Text inset on each side of a cell; wrapping targets the width inside it.
    pub cell_margin: Length,
    pub min_flexible_width: Length,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableOutcome {
    pub pages_spanned: usize,
    pub header_draws: usize,
    pub rows_drawn: usize,
    pub page_breaks: usize,
}

#[derive(Debug, Clone)]
struct RowLayout {
    height: Length,
    wrapped: Option<WrappedCell>,
}

struct HeaderLayout {
    height: Length,
    labels: Vec<WrappedCell>,
}

pub struct TableRenderer<'a> {
    name: &'a str,
    columns: &'a [ColumnSpec],
    style: &'a TableStyle,
    widths: ColumnWidths,
    offsets: Vec<Length>,
    left: Length,
}

impl<'a> TableRenderer<'a> {
    /// Sizes the columns once for this render.
    pub fn new<B: LayoutBackend + ?Sized>(
        name: &'a str,
        columns: &'a [ColumnSpec],
        rows: &[Record],
        style: &'a TableStyle,
        backend: &B,
    ) -> Result<Self> {
        let template = backend.template();
        let params = SizingParams {
            header_font: &style.header_font,
            body_font: &style.body_font,
            padding: style.padding,
            content_width: template.content_width(),
            min_flexible_width: style.min_flexible_width,
        };
        let widths = size_columns_with(columns, rows, &params, |text, font| {
            backend.measure_text(text, font)
        })?;
        tracing::debug!(table = name, widths = ?widths.widths(), "column widths");
        Ok(Self {
            name,
            columns,
            style,
            offsets: widths.offsets(),
            widths,
            left: template.content_left(),
        })
    }

    pub fn widths(&self) -> &ColumnWidths {
        &self.widths
    }

    fn text_width(&self, column: usize) -> Length {
        (self.widths.get(column) - self.style.cell_margin * 2).max(Length::ZERO)
    }

    fn cell_rect(&self, column: usize, y: Length, height: Length) -> Rect {
        let x = self.left + self.offsets.get(column).copied().unwrap_or(Length::ZERO);
        Rect::new(x, y, self.widths.get(column), height)
    }

    fn layout_header<B: LayoutBackend + ?Sized>(&self, backend: &B) -> Result<HeaderLayout> {
        let half = self.style.row_height.half();
        let mut labels = Vec::with_capacity(self.columns.len());
        let mut height = self.style.row_height;
        for (idx, column) in self.columns.iter().enumerate() {
            let font = &self.style.header_font;
            let wrapped = wrap_text_with(&column.label, self.text_width(idx), |line| {
                backend.measure_text(line, font)
            })?;
            height = height.max(wrapped.height(half));
            labels.push(wrapped);
        }
        Ok(HeaderLayout { height, labels })
    }

    fn layout_row<B: LayoutBackend + ?Sized>(&self, record: &Record, backend: &B) -> Result<RowLayout> {
        let Some(idx) = self.columns.iter().position(|c| c.is_flexible) else {
            return Ok(RowLayout {
                height: self.style.row_height,
                wrapped: None,
            });
        };
        let font = &self.style.body_font;
        let wrapped = wrap_text_with(
            record.get(&self.columns[idx].source_key),
            self.text_width(idx),
            |line| backend.measure_text(line, font),
        )?;
        Ok(RowLayout {
            height: self.style.row_height.max(wrapped.height(self.style.line_height)),
            wrapped: Some(wrapped),
        })
    }

    fn draw_header<B: LayoutBackend + ?Sized>(
        &self,
        backend: &mut B,
        header: &HeaderLayout,
        y: Length,
    ) -> Result<()> {
        backend.meta(META_TABLE_HEADER, self.name);
        let half = self.style.row_height.half();
        for (idx, label) in header.labels.iter().enumerate() {
            backend.draw_wrapped_text(
                self.cell_rect(idx, y, header.height),
                label.lines(),
                half,
                &self.style.header_font,
                TextAlign::Center,
            )?;
        }
        Ok(())
    }

    fn draw_row<B: LayoutBackend + ?Sized>(
        &self,
        backend: &mut B,
        index: usize,
        record: &Record,
        row: &RowLayout,
        y: Length,
    ) -> Result<()> {
        backend.meta(META_TABLE_ROW, &index.to_string());
        for (idx, column) in self.columns.iter().enumerate() {
            let rect = self.cell_rect(idx, y, row.height);
            match (&row.wrapped, column.is_flexible) {
                (Some(wrapped), true) => backend.draw_wrapped_text(
                    rect,
                    wrapped.lines(),
                    self.style.line_height,
                    &self.style.body_font,
                    TextAlign::Left,
                )?,
                _ => backend.draw_bordered_cell(
                    rect,
                    record.get(&column.source_key),
                    &self.style.body_font,
                    TextAlign::Left,
                )?,
            }
        }
        Ok(())
    }

    /// Draws the header and every row starting at `cursor`, breaking pages as
    /// needed. An empty `rows` slice still draws the header.
    pub fn render<B: LayoutBackend + ?Sized>(
        &self,
        backend: &mut B,
        cursor: &mut PageCursor,
        rows: &[Record],
    ) -> Result<TableOutcome> {
        let bottom = backend.template().usable_bottom();
        let mut outcome = TableOutcome {
            pages_spanned: 1,
            ..TableOutcome::default()
        };
        let mut state = TableState::DrawingHeader;
        let mut next = 0usize;
        let mut rows_on_page = 0usize;

        loop {
            state = match state {
                TableState::DrawingHeader => {
                    let header = self.layout_header(&*backend)?;
                    // Unlike a plain "draw the header at the cursor" start, a
                    // header that would close a page below the summary with
                    // no row under it is moved to the next page instead.
                    let orphaned = match rows.get(next) {
                        Some(record) if cursor.y > backend.content_top() => {
                            let row = self.layout_row(record, &*backend)?;
                            cursor.y + header.height + row.height > bottom
                        }
                        _ => false,
                    };
                    if orphaned {
                        TableState::PageBreak
                    } else {
                        self.draw_header(backend, &header, cursor.y)?;
                        cursor.advance(header.height);
                        outcome.header_draws += 1;
                        rows_on_page = 0;
                        if next < rows.len() {
                            TableState::DrawingRow
                        } else {
                            TableState::Done
                        }
                    }
                }
                TableState::DrawingRow => {
                    let record = &rows[next];
                    let row = self.layout_row(record, &*backend)?;
                    let fits = cursor.y + row.height <= bottom;
                    if !fits && rows_on_page > 0 {
                        TableState::PageBreak
                    } else {
                        if !fits {
                            tracing::warn!(
                                table = self.name,
                                row = next,
                                height = %row.height,
                                "row is taller than the page body; drawing it past the bottom margin"
                            );
                        }
                        self.draw_row(backend, next, record, &row, cursor.y)?;
                        cursor.advance(row.height);
                        next += 1;
                        rows_on_page += 1;
                        outcome.rows_drawn += 1;
                        if next < rows.len() {
                            TableState::DrawingRow
                        } else {
                            TableState::Done
                        }
                    }
                }
                TableState::PageBreak => {
                    backend.begin_new_page()?;
                    cursor.reset(&*backend);
                    outcome.page_breaks += 1;
                    outcome.pages_spanned += 1;
                    tracing::debug!(
                        table = self.name,
                        page = cursor.page_index + 1,
                        pending_row = next,
                        "page break"
                    );
                    TableState::DrawingHeader
                }
                TableState::Done => break,
            };
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Canvas, Command, Document};
    use crate::columns::activity_columns;
    use crate::error::ReportError;
    use crate::font::tests::MonoMeasurer;
    use crate::font::{FontVariant, TextMeasurer};
    use crate::page_template::PageTemplate;
    use crate::types::{Color, Margins, Size};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn style() -> TableStyle {
        TableStyle {
            header_font: FontStyle::helvetica(FontVariant::Bold, 11.0),
            body_font: FontStyle::helvetica(FontVariant::Regular, 10.0),
            row_height: Length::from_i32(10),
            line_height: Length::from_i32(5),
            padding: Length::from_i32(4),
            cell_margin: Length::from_i32(1),
            min_flexible_width: Length::from_i32(30),
        }
    }

    fn canvas_with(width: f32, height: f32, measurer: Arc<dyn TextMeasurer>) -> Canvas {
        let template = PageTemplate::new(
            Size::new(width, height),
            Margins::new(10.0, 10.0, 10.0, 10.0),
            Length::from_i32(10),
        );
        let mut canvas = Canvas::new(template, measurer, 1.0);
        canvas.begin_new_page().expect("first page");
        canvas
    }

    fn canvas(width: f32, height: f32) -> Canvas {
        canvas_with(width, height, Arc::new(MonoMeasurer))
    }

    fn record(description: &str) -> Record {
        Record::activity("Docencia", "2024-03-01", "TLC", description, "2")
    }

    fn render(canvas: &mut Canvas, rows: &[Record]) -> TableOutcome {
        let columns = activity_columns();
        let style = style();
        let table = TableRenderer::new("activities", &columns, rows, &style, &*canvas).expect("size");
        let mut cursor = PageCursor::at_top(&*canvas);
        table.render(canvas, &mut cursor, rows).expect("render")
    }

    fn rows_per_page(doc: &Document) -> Vec<Vec<String>> {
        doc.pages
            .iter()
            .map(|p| p.meta_values(META_TABLE_ROW).map(str::to_string).collect())
            .collect()
    }

    fn headers_per_page(doc: &Document) -> Vec<usize> {
        doc.pages
            .iter()
            .map(|p| p.meta_values(META_TABLE_HEADER).count())
            .collect()
    }

    #[test]
    fn row_that_does_not_fit_moves_to_a_new_page_with_the_header() {
        // Top 10, header to 20, rows of 10; usable bottom 45 leaves room for two rows.
        let rows = vec![
            record("Taller de laboratorio clinico"),
            record("Reunion"),
            record("Apoyo administrativo en farmacia"),
        ];
        let mut canvas = canvas(300.0, 55.0);
        let outcome = render(&mut canvas, &rows);
        let doc = canvas.finish().expect("finish");

        assert_eq!(rows_per_page(&doc), vec![vec!["0", "1"], vec!["2"]]);
        assert_eq!(headers_per_page(&doc), vec![1, 1]);
        assert_eq!(
            outcome,
            TableOutcome {
                pages_spanned: 2,
                header_draws: 2,
                rows_drawn: 3,
                page_breaks: 1,
            }
        );
        let page_two: Vec<&str> = doc.pages[1].texts().collect();
        assert!(page_two.contains(&"Descripción de la actividad"));
        assert!(page_two.contains(&"Apoyo administrativo en farmacia"));
    }

    #[test]
    fn header_is_drawn_once_per_spanned_page() {
        let rows: Vec<Record> = (0..40).map(|i| record(&format!("Actividad {i}"))).collect();
        let mut canvas = canvas(300.0, 100.0);
        let outcome = render(&mut canvas, &rows);
        let doc = canvas.finish().expect("finish");

        assert_eq!(doc.pages.len(), outcome.pages_spanned);
        assert_eq!(headers_per_page(&doc), vec![1; doc.pages.len()]);
        // Every row lands on exactly one page, in order.
        let seen: Vec<String> = rows_per_page(&doc).into_iter().flatten().collect();
        let expected: Vec<String> = (0..40).map(|i| i.to_string()).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn rows_never_cross_the_usable_bottom() {
        let rows: Vec<Record> = (0..25)
            .map(|i| record(&"palabra ".repeat(1 + i % 7)))
            .collect();
        let mut canvas = canvas(120.0, 100.0);
        render(&mut canvas, &rows);
        let doc = canvas.finish().expect("finish");
        for page in &doc.pages {
            for cmd in &page.commands {
                if let Command::DrawRect { y, height, .. } = cmd {
                    assert!(*y + *height <= Length::from_i32(90));
                }
            }
        }
    }

    #[test]
    fn long_description_wraps_and_grows_the_row() {
        // Content width 100; fixed columns need 17 + 22 + 10 + 9 = 58.
        let text = "uno dos tres cuatro cinco seis siete ocho nueve diez once doce trece";
        let rows = vec![record(text)];
        let mut canvas = canvas(120.0, 200.0);
        let columns = activity_columns();
        let style = style();
        let table = TableRenderer::new("activities", &columns, &rows, &style, &canvas).expect("size");
        assert_eq!(table.widths().get(3), Length::from_i32(42));
        let row = table.layout_row(&rows[0], &canvas).expect("row");
        let wrapped = row.wrapped.clone().expect("flexible column");
        assert_eq!(wrapped.lines().join(" "), text);
        assert!(wrapped.line_count() >= 2);
        assert_eq!(row.height, Length::from_i32(5) * (wrapped.line_count() as i32));

        let mut cursor = PageCursor::at_top(&canvas);
        table.render(&mut canvas, &mut cursor, &rows).expect("render");
        assert_eq!(cursor.y, Length::from_i32(20) + row.height);
    }

    #[test]
    fn empty_rows_draw_only_the_header() {
        let mut canvas = canvas(300.0, 100.0);
        let outcome = render(&mut canvas, &[]);
        let doc = canvas.finish().expect("finish");
        assert_eq!(outcome.header_draws, 1);
        assert_eq!(outcome.rows_drawn, 0);
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(headers_per_page(&doc), vec![1]);
    }

    #[test]
    fn header_is_not_orphaned_at_the_bottom_of_a_page() {
        let rows = vec![record("Reunion")];
        let mut canvas = canvas(300.0, 55.0);
        let columns = activity_columns();
        let style = style();
        let table = TableRenderer::new("activities", &columns, &rows, &style, &canvas).expect("size");
        // Header (10) fits above 45 but header plus the first row does not.
        let mut cursor = PageCursor {
            y: Length::from_i32(30),
            page_index: 0,
        };
        let outcome = table.render(&mut canvas, &mut cursor, &rows).expect("render");
        let doc = canvas.finish().expect("finish");
        assert_eq!(headers_per_page(&doc), vec![0, 1]);
        assert_eq!(outcome.header_draws, 1);
        assert_eq!(rows_per_page(&doc), vec![Vec::<String>::new(), vec!["0".to_string()]]);
    }

    #[test]
    fn row_taller_than_a_page_is_drawn_once_instead_of_looping() {
        let long = "x ".repeat(200);
        let rows = vec![record("corta"), record(&long), record("corta")];
        let mut canvas = canvas(120.0, 60.0);
        let outcome = render(&mut canvas, &rows);
        let doc = canvas.finish().expect("finish");
        assert_eq!(outcome.rows_drawn, 3);
        assert_eq!(rows_per_page(&doc), vec![vec!["0"], vec!["1"], vec!["2"]]);
        assert_eq!(headers_per_page(&doc), vec![1, 1, 1]);
    }

    /// Reports every width at twice what the wrapped canvas measures.
    struct WideBackend(Canvas);

    impl LayoutBackend for WideBackend {
        fn measure_text(&self, text: &str, font: &FontStyle) -> Result<Length> {
            Ok(self.0.measure_text(text, font)? * 2)
        }

        fn draw_bordered_cell(
            &mut self,
            rect: Rect,
            text: &str,
            font: &FontStyle,
            align: TextAlign,
        ) -> Result<()> {
            self.0.draw_bordered_cell(rect, text, font, align)
        }

        fn draw_wrapped_text(
            &mut self,
            rect: Rect,
            lines: &[String],
            line_height: Length,
            font: &FontStyle,
            align: TextAlign,
        ) -> Result<()> {
            self.0.draw_wrapped_text(rect, lines, line_height, font, align)
        }

        fn draw_band(&mut self, rect: Rect, text: &str, font: &FontStyle, fill: Color) -> Result<()> {
            self.0.draw_band(rect, text, font, fill)
        }

        fn begin_new_page(&mut self) -> Result<()> {
            self.0.begin_new_page()
        }

        fn content_top(&self) -> Length {
            self.0.content_top()
        }

        fn page_index(&self) -> usize {
            self.0.page_index()
        }

        fn template(&self) -> &PageTemplate {
            self.0.template()
        }

        fn meta(&mut self, key: &str, value: &str) {
            self.0.meta(key, value)
        }
    }

    #[test]
    fn sizing_and_wrapping_measure_through_the_backend() {
        let columns = activity_columns();
        let style = style();
        let rows = vec![record("Taller de laboratorio clinico")];
        let plain = canvas(600.0, 100.0);
        let wide = WideBackend(canvas(600.0, 100.0));
        let narrow = TableRenderer::new("activities", &columns, &rows, &style, &plain).expect("plain");
        let doubled = TableRenderer::new("activities", &columns, &rows, &style, &wide).expect("wide");
        let padding = style.padding;
        for idx in 0..columns.len() {
            assert_eq!(
                doubled.widths().get(idx) - padding,
                (narrow.widths().get(idx) - padding) * 2
            );
        }

        let layout = doubled.layout_row(&rows[0], &wide).expect("row");
        assert_eq!(layout.wrapped.map(|cell| cell.line_count()), Some(1));
    }

    struct FailingMeasurer;

    impl TextMeasurer for FailingMeasurer {
        fn measure(&self, _text: &str, _font: &FontStyle) -> Result<Length> {
            Err(ReportError::RenderBackend("metrics unavailable".to_string()))
        }
    }

    #[test]
    fn measurement_failure_aborts_the_render() {
        let canvas = canvas_with(300.0, 100.0, Arc::new(FailingMeasurer));
        let columns = activity_columns();
        let style = style();
        let rows = vec![record("Reunion")];
        let err = match TableRenderer::new("activities", &columns, &rows, &style, &canvas) {
            Ok(_) => panic!("sizing must fail without metrics"),
            Err(err) => err,
        };
        assert!(matches!(err, ReportError::RenderBackend(_)));
    }
}
