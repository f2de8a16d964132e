mod canvas;
mod columns;
mod error;
mod font;
mod metrics;
mod page_template;
mod pdf;
mod record;
mod summary;
mod table;
mod types;
mod wrap;

pub use canvas::{CellStyle, Canvas, Command, Document, LayoutBackend, Page, RectStyle, TextAlign};
pub use columns::{
    ColumnSpec, ColumnWidths, SizingParams, activity_columns, size_columns, size_columns_with,
    summary_columns,
};
pub use error::{ReportError, Result};
pub use font::{CoreFontMetrics, FontRegistry, FontStyle, FontVariant, POINTS_PER_MM, TextMeasurer};
pub use metrics::{DocumentMetrics, PageMetrics};
pub use page_template::{PageBanner, PageFooter, PageTemplate, substitute_placeholders};
pub use pdf::{PdfOptions, document_to_pdf, document_to_pdf_with_registry};
pub use record::{Record, SUMMARY_KEYS, SubjectReport, SummaryRow};
pub use summary::{META_SUMMARY, SummaryStyle, render_summary};
pub use table::{
    META_TABLE_HEADER, META_TABLE_ROW, PageCursor, TableOutcome, TableRenderer, TableState,
    TableStyle,
};
pub use types::{Color, Length, Margins, Rect, Size};
pub use wrap::{WrappedCell, wrap_text, wrap_text_with};

pub mod keys {
    pub use crate::record::{
        ACTIVITY_CODE, ACTIVITY_DATE, ASSIGNED_HOURS, COMPLETED_HOURS, CUTOFF_DATE, DESCRIPTION,
        HOUR_TYPE, HOURS, NAME, PENDING_HOURS, PERCENTAGE, TOTAL_HOURS,
    };
}

use std::path::PathBuf;
use std::sync::Arc;

const ACTIVITY_TABLE: &str = "activities";

/// A validated report configuration. Immutable and shareable across threads;
/// every render gets its own canvas, column widths and cursor.
pub struct ReportRenderer {
    template: PageTemplate,
    font_registry: Arc<FontRegistry>,
    unit_scale: f32,
    cell_style: CellStyle,
    table_style: TableStyle,
    summary_style: SummaryStyle,
    pdf_options: PdfOptions,
}

impl ReportRenderer {
    pub fn builder() -> ReportBuilder {
        ReportBuilder::new()
    }

    pub fn template(&self) -> &PageTemplate {
        &self.template
    }

    pub fn table_style(&self) -> &TableStyle {
        &self.table_style
    }

    pub fn summary_style(&self) -> &SummaryStyle {
        &self.summary_style
    }

    fn new_canvas(&self) -> Canvas {
        let measurer: Arc<dyn TextMeasurer> = self.font_registry.clone();
        Canvas::new(self.template.clone(), measurer, self.unit_scale).with_cell_style(self.cell_style)
    }

    pub fn render(&self, report: &SubjectReport) -> Result<Document> {
        self.render_with_metrics(report).map(|(document, _)| document)
    }

    /// Lays out the summary block (when present) and the activity table.
    /// A subject without activity rows is rejected before anything is drawn.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(subject = %report.subject, rows = report.rows.len())
    )]
    pub fn render_with_metrics(&self, report: &SubjectReport) -> Result<(Document, DocumentMetrics)> {
        if report.rows.is_empty() {
            return Err(ReportError::NoRecordsForSubject(report.subject.clone()));
        }
        let started = std::time::Instant::now();
        let mut canvas = self.new_canvas();
        canvas.begin_new_page()?;
        let mut cursor = PageCursor::at_top(&canvas);

        match &report.summary {
            Some(summary) => render_summary(&mut canvas, &mut cursor, summary, &self.summary_style)?,
            None => tracing::debug!("no summary row; drawing the activity table only"),
        }

        let columns = activity_columns();
        let table = TableRenderer::new(ACTIVITY_TABLE, &columns, &report.rows, &self.table_style, &canvas)?;
        let overflow = table.widths().overflow();
        let outcome = table.render(&mut canvas, &mut cursor, &report.rows)?;
        let document = canvas.finish()?;

        let mut metrics = DocumentMetrics::from_document(&document);
        metrics.total_render_ms = started.elapsed().as_secs_f64() * 1000.0;
        metrics.column_overflow = overflow;
        tracing::debug!(
            pages = document.pages.len(),
            rows = outcome.rows_drawn,
            page_breaks = outcome.page_breaks,
            render_ms = metrics.total_render_ms,
            "report rendered"
        );
        Ok((document, metrics))
    }

    /// Renders to PDF. Registered faces are embedded so the text is drawn
    /// with the widths it was laid out with.
    pub fn render_pdf(&self, report: &SubjectReport) -> Result<Vec<u8>> {
        let document = self.render(report)?;
        let mut options = self.pdf_options.clone();
        if options.document_title.is_none() {
            options.document_title = Some(format!("Informe de Actividades - {}", report.subject));
        }
        document_to_pdf_with_registry(&document, &options, Some(&self.font_registry))
    }

    /// Renders each report to PDF on the rayon pool. Results keep input order
    /// and a failing subject does not affect the others.
    pub fn render_many_parallel(&self, reports: &[SubjectReport]) -> Vec<Result<Vec<u8>>> {
        use rayon::prelude::*;

        reports
            .par_iter()
            .map(|report| self.render_pdf(report))
            .collect()
    }
}

#[derive(Debug, Clone)]
enum FontSource {
    File(PathBuf),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone)]
struct FontSpec {
    family: String,
    variant: FontVariant,
    source: FontSource,
}

#[derive(Debug, Clone)]
pub struct ReportBuilder {
    page_size: Size,
    margins: Margins,
    break_margin: Length,
    unit_scale: f32,
    font_family: String,
    body_font_size: f32,
    table_header_font_size: f32,
    summary_header_font_size: f32,
    summary_title_font_size: f32,
    banner_font_size: f32,
    footer_font_size: f32,
    banner_text: Option<String>,
    banner_fill: Color,
    banner_height: Length,
    banner_gap: Length,
    footer_text: Option<String>,
    footer_offset: Length,
    summary_title: String,
    summary_fill: Color,
    summary_title_gap: Length,
    summary_trailing_gap: Length,
    summary_column_widths: Vec<Length>,
    row_height: Length,
    line_height: Length,
    padding: Length,
    cell_margin: Length,
    border_width: Length,
    min_flexible_width: Length,
    fonts: Vec<FontSpec>,
    pdf_options: PdfOptions,
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportBuilder {
    /// Defaults reproduce the INIFAR activity report on A4 in millimetres.
    pub fn new() -> Self {
        Self {
            page_size: Size::a4_mm(),
            margins: Margins::new(10.0, 15.0, 15.0, 15.0),
            break_margin: Length::from_i32(15),
            unit_scale: POINTS_PER_MM,
            font_family: "Helvetica".to_string(),
            body_font_size: 10.0,
            table_header_font_size: 11.0,
            summary_header_font_size: 10.0,
            summary_title_font_size: 12.0,
            banner_font_size: 14.0,
            footer_font_size: 8.0,
            banner_text: Some("Informe de Actividades realizadas INIFAR".to_string()),
            banner_fill: Color::rgb8(162, 210, 255),
            banner_height: Length::from_i32(10),
            banner_gap: Length::from_i32(5),
            footer_text: Some("Página {page}".to_string()),
            footer_offset: Length::from_i32(15),
            summary_title: "Corte de Horas".to_string(),
            summary_fill: Color::rgb8(200, 220, 255),
            summary_title_gap: Length::from_i32(2),
            summary_trailing_gap: Length::from_i32(10),
            summary_column_widths: [40, 25, 25, 25, 25, 25, 25]
                .into_iter()
                .map(Length::from_i32)
                .collect(),
            row_height: Length::from_i32(10),
            line_height: Length::from_i32(5),
            padding: Length::from_i32(4),
            cell_margin: Length::from_i32(1),
            border_width: Length::from_f32(0.2),
            min_flexible_width: Length::from_i32(30),
            fonts: Vec::new(),
            pdf_options: PdfOptions::default(),
        }
    }

    pub fn page_size(mut self, size: Size) -> Self {
        self.page_size = size;
        self
    }

    pub fn margins(mut self, margins: Margins) -> Self {
        self.margins = margins;
        self
    }

    /// Distance from the bottom edge that table rows must stay above.
    pub fn break_margin(mut self, value: f32) -> Self {
        self.break_margin = Length::from_f32(value);
        self
    }

    /// Points per layout unit; 72/25.4 for millimetres, 1.0 for points.
    pub fn unit_scale(mut self, points_per_unit: f32) -> Self {
        self.unit_scale = points_per_unit;
        self
    }

    pub fn font_family(mut self, family: impl Into<String>) -> Self {
        self.font_family = family.into();
        self
    }

    pub fn body_font_size(mut self, size_pt: f32) -> Self {
        self.body_font_size = size_pt;
        self
    }

    pub fn table_header_font_size(mut self, size_pt: f32) -> Self {
        self.table_header_font_size = size_pt;
        self
    }

    pub fn summary_header_font_size(mut self, size_pt: f32) -> Self {
        self.summary_header_font_size = size_pt;
        self
    }

    pub fn banner_text(mut self, text: impl Into<String>) -> Self {
        self.banner_text = Some(text.into());
        self
    }

    pub fn no_banner(mut self) -> Self {
        self.banner_text = None;
        self
    }

    pub fn banner_fill(mut self, fill: Color) -> Self {
        self.banner_fill = fill;
        self
    }

    /// Band height and the gap left below it before body content.
    pub fn banner_geometry(mut self, height: f32, gap_after: f32) -> Self {
        self.banner_height = Length::from_f32(height);
        self.banner_gap = Length::from_f32(gap_after);
        self
    }

    /// `{page}` and `{pages}` are replaced once the page count is known.
    pub fn footer_text(mut self, text: impl Into<String>) -> Self {
        self.footer_text = Some(text.into());
        self
    }

    pub fn no_footer(mut self) -> Self {
        self.footer_text = None;
        self
    }

    /// Distance from the bottom edge to the top of the footer line.
    pub fn footer_offset(mut self, value: f32) -> Self {
        self.footer_offset = Length::from_f32(value);
        self
    }

    pub fn summary_title(mut self, title: impl Into<String>) -> Self {
        self.summary_title = title.into();
        self
    }

    pub fn summary_gaps(mut self, after_title: f32, after_block: f32) -> Self {
        self.summary_title_gap = Length::from_f32(after_title);
        self.summary_trailing_gap = Length::from_f32(after_block);
        self
    }

    pub fn summary_column_widths(mut self, widths: &[f32]) -> Self {
        self.summary_column_widths = widths.iter().map(|w| Length::from_f32(*w)).collect();
        self
    }

    pub fn row_height(mut self, value: f32) -> Self {
        self.row_height = Length::from_f32(value);
        self
    }

    pub fn line_height(mut self, value: f32) -> Self {
        self.line_height = Length::from_f32(value);
        self
    }

    pub fn padding(mut self, value: f32) -> Self {
        self.padding = Length::from_f32(value);
        self
    }

    pub fn cell_margin(mut self, value: f32) -> Self {
        self.cell_margin = Length::from_f32(value);
        self
    }

    pub fn border_width(mut self, value: f32) -> Self {
        self.border_width = Length::from_f32(value);
        self
    }

    pub fn min_flexible_width(mut self, value: f32) -> Self {
        self.min_flexible_width = Length::from_f32(value);
        self
    }

    pub fn register_font_file(
        mut self,
        family: impl Into<String>,
        variant: FontVariant,
        path: impl Into<PathBuf>,
    ) -> Self {
        self.fonts.push(FontSpec {
            family: family.into(),
            variant,
            source: FontSource::File(path.into()),
        });
        self
    }

    pub fn register_font_bytes(
        mut self,
        family: impl Into<String>,
        variant: FontVariant,
        data: Vec<u8>,
    ) -> Self {
        self.fonts.push(FontSpec {
            family: family.into(),
            variant,
            source: FontSource::Bytes(data),
        });
        self
    }

    pub fn pdf_options(mut self, options: PdfOptions) -> Self {
        self.pdf_options = options;
        self
    }

    pub fn document_title(mut self, title: impl Into<String>) -> Self {
        self.pdf_options.document_title = Some(title.into());
        self
    }

    fn font(&self, variant: FontVariant, size_pt: f32) -> FontStyle {
        FontStyle::new(self.font_family.as_str(), variant, size_pt)
    }

    fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ReportError::InvalidConfiguration(msg));
        if !(self.unit_scale.is_finite() && self.unit_scale > 0.0) {
            return invalid(format!("unit_scale must be > 0 (got {})", self.unit_scale));
        }
        if !self.page_size.width.is_positive() || !self.page_size.height.is_positive() {
            return invalid("page size must be positive".to_string());
        }
        if self.font_family.trim().is_empty() {
            return invalid("font family cannot be empty".to_string());
        }
        for (name, size) in [
            ("body", self.body_font_size),
            ("table header", self.table_header_font_size),
            ("summary header", self.summary_header_font_size),
            ("summary title", self.summary_title_font_size),
            ("banner", self.banner_font_size),
            ("footer", self.footer_font_size),
        ] {
            if !(size.is_finite() && size > 0.0) {
                return invalid(format!("{name} font size must be > 0 (got {size})"));
            }
        }
        if !self.row_height.is_positive() || !self.line_height.is_positive() {
            return invalid("row_height and line_height must be > 0".to_string());
        }
        if self.line_height > self.row_height {
            return invalid(format!(
                "line_height {} exceeds row_height {}",
                self.line_height, self.row_height
            ));
        }
        let spacings = [
            self.padding,
            self.cell_margin,
            self.border_width,
            self.banner_height,
            self.banner_gap,
            self.footer_offset,
            self.summary_title_gap,
            self.summary_trailing_gap,
        ];
        if spacings.iter().any(|v| *v < Length::ZERO) {
            return invalid("spacing values cannot be negative".to_string());
        }
        if !self.min_flexible_width.is_positive() {
            return invalid("min_flexible_width must be > 0".to_string());
        }
        if self.summary_column_widths.len() != SUMMARY_KEYS.len() {
            return invalid(format!(
                "summary needs {} column widths (got {})",
                SUMMARY_KEYS.len(),
                self.summary_column_widths.len()
            ));
        }
        if self.summary_column_widths.iter().any(|w| !w.is_positive()) {
            return invalid("summary column widths must be > 0".to_string());
        }
        Ok(())
    }

    pub fn build(self) -> Result<ReportRenderer> {
        self.validate()?;

        let mut template = PageTemplate::new(self.page_size, self.margins, self.break_margin);
        if let Some(text) = &self.banner_text {
            template = template.with_banner(PageBanner {
                text: text.clone(),
                font: self.font(FontVariant::Bold, self.banner_font_size),
                fill: self.banner_fill,
                height: self.banner_height,
                gap_after: self.banner_gap,
            });
        }
        if let Some(text) = &self.footer_text {
            template = template.with_footer(PageFooter {
                template: text.clone(),
                font: self.font(FontVariant::Italic, self.footer_font_size),
                from_bottom: self.footer_offset,
                height: self.row_height,
            });
        }
        if !template.content_width().is_positive() {
            return Err(ReportError::InvalidConfiguration(format!(
                "margins leave no content width on a {} wide page",
                self.page_size.width
            )));
        }
        if template.usable_bottom() <= template.content_top() {
            return Err(ReportError::InvalidConfiguration(
                "page decoration and break margin leave no room for the table".to_string(),
            ));
        }

        let mut registry = FontRegistry::new(self.unit_scale);
        for spec in &self.fonts {
            match &spec.source {
                FontSource::File(path) => registry.register_file(&spec.family, spec.variant, path)?,
                FontSource::Bytes(data) => registry.register_bytes(&spec.family, spec.variant, data)?,
            };
        }

        let table_style = TableStyle {
            header_font: self.font(FontVariant::Bold, self.table_header_font_size),
            body_font: self.font(FontVariant::Regular, self.body_font_size),
            row_height: self.row_height,
            line_height: self.line_height,
            padding: self.padding,
            cell_margin: self.cell_margin,
            min_flexible_width: self.min_flexible_width,
        };
        let summary_style = SummaryStyle {
            title: self.summary_title.clone(),
            title_font: self.font(FontVariant::Bold, self.summary_title_font_size),
            title_fill: self.summary_fill,
            title_height: self.row_height,
            title_gap: self.summary_title_gap,
            header_font: self.font(FontVariant::Bold, self.summary_header_font_size),
            body_font: self.font(FontVariant::Regular, self.body_font_size),
            row_height: self.row_height,
            column_widths: self.summary_column_widths.clone(),
            cell_margin: self.cell_margin,
            trailing_gap: self.summary_trailing_gap,
        };
        let cell_style = CellStyle {
            margin: self.cell_margin,
            border_width: self.border_width,
            ..CellStyle::default()
        };
        tracing::debug!(
            content_width = %template.content_width(),
            content_top = %template.content_top(),
            usable_bottom = %template.usable_bottom(),
            fonts = self.fonts.len(),
            "report renderer built"
        );
        Ok(ReportRenderer {
            template,
            font_registry: Arc::new(registry),
            unit_scale: self.unit_scale,
            cell_style,
            table_style,
            summary_style,
            pdf_options: self.pdf_options,
        })
    }
}
