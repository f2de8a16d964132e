use crate::error::{ReportError, Result};
use crate::font::{FontStyle, TextMeasurer};
use crate::page_template::{PageTemplate, substitute_placeholders};
use crate::types::{Color, Length, Rect, Size};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RectStyle {
    Stroke,
    Fill,
}

/// Coordinates are in user units with the origin at the top-left corner of
/// the page and y growing downwards. `DrawString` positions the baseline.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // Non-rendered metadata used for page-aware reporting. Ignored by the PDF writer.
    Meta {
        key: String,
        value: String,
    },
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetLineWidth(Length),
    SetFont(FontStyle),
    DrawRect {
        x: Length,
        y: Length,
        width: Length,
        height: Length,
        style: RectStyle,
    },
    DrawString {
        x: Length,
        y: Length,
        text: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub commands: Vec<Command>,
}

impl Page {
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|cmd| match cmd {
            Command::DrawString { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn meta_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.commands.iter().filter_map(move |cmd| match cmd {
            Command::Meta { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub page_size: Size,
    /// Points per user unit.
    pub unit_scale: f32,
    pub pages: Vec<Page>,
}

/// Drawing surface driven by the table layout code.
pub trait LayoutBackend {
    /// Width of `text` as this backend will draw it.
    fn measure_text(&self, text: &str, font: &FontStyle) -> Result<Length>;

    fn draw_bordered_cell(
        &mut self,
        rect: Rect,
        text: &str,
        font: &FontStyle,
        align: TextAlign,
    ) -> Result<()>;

    /// Bordered cell whose text is already broken into lines, one line per
    /// `line_height` starting at the top of `rect`.
    fn draw_wrapped_text(
        &mut self,
        rect: Rect,
        lines: &[String],
        line_height: Length,
        font: &FontStyle,
        align: TextAlign,
    ) -> Result<()>;

    /// Filled, unbordered band with centred text.
    fn draw_band(&mut self, rect: Rect, text: &str, font: &FontStyle, fill: Color) -> Result<()>;

    fn begin_new_page(&mut self) -> Result<()>;

    /// Cursor origin for body content on the current page.
    fn content_top(&self) -> Length;

    /// Zero-based index of the current page.
    fn page_index(&self) -> usize;

    fn template(&self) -> &PageTemplate;

    fn meta(&mut self, key: &str, value: &str);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellStyle {
    /// Horizontal inset of text inside a cell.
    pub margin: Length,
    pub border_width: Length,
    pub border_color: Color,
    pub text_color: Color,
}

impl Default for CellStyle {
    fn default() -> Self {
        Self {
            margin: Length::from_i32(1),
            border_width: Length::from_f32(0.2),
            border_color: Color::BLACK,
            text_color: Color::BLACK,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct GraphicsState {
    fill_color: Color,
    stroke_color: Color,
    line_width: Option<Length>,
    font: Option<FontStyle>,
}

impl GraphicsState {
    fn initial() -> Self {
        Self {
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            line_width: None,
            font: None,
        }
    }
}

/// Records draw commands page by page.
pub struct Canvas {
    template: PageTemplate,
    measurer: Arc<dyn TextMeasurer>,
    unit_scale: f32,
    cell_style: CellStyle,
    pages: Vec<Page>,
    current: Option<Page>,
    state: GraphicsState,
}

impl Canvas {
    pub fn new(template: PageTemplate, measurer: Arc<dyn TextMeasurer>, unit_scale: f32) -> Self {
        Self {
            template,
            measurer,
            unit_scale,
            cell_style: CellStyle::default(),
            pages: Vec::new(),
            current: None,
            state: GraphicsState::initial(),
        }
    }

    pub fn with_cell_style(mut self, style: CellStyle) -> Self {
        self.cell_style = style;
        self
    }

    pub fn page_size(&self) -> Size {
        self.template.page_size
    }

    pub fn page_count(&self) -> usize {
        self.pages.len() + usize::from(self.current.is_some())
    }

    fn push(&mut self, command: Command) -> Result<()> {
        match self.current.as_mut() {
            Some(page) => {
                page.commands.push(command);
                Ok(())
            }
            None => Err(ReportError::RenderBackend(
                "draw command issued before the first page was started".to_string(),
            )),
        }
    }

    fn set_fill_color(&mut self, color: Color) -> Result<()> {
        if self.state.fill_color == color {
            return Ok(());
        }
        self.state.fill_color = color;
        self.push(Command::SetFillColor(color))
    }

    fn set_stroke_color(&mut self, color: Color) -> Result<()> {
        if self.state.stroke_color == color {
            return Ok(());
        }
        self.state.stroke_color = color;
        self.push(Command::SetStrokeColor(color))
    }

    fn set_line_width(&mut self, width: Length) -> Result<()> {
        let width = width.max(Length::ZERO);
        if self.state.line_width == Some(width) {
            return Ok(());
        }
        self.state.line_width = Some(width);
        self.push(Command::SetLineWidth(width))
    }

    fn set_font(&mut self, font: &FontStyle) -> Result<()> {
        if self.state.font.as_ref() == Some(font) {
            return Ok(());
        }
        self.state.font = Some(font.clone());
        self.push(Command::SetFont(font.clone()))
    }

    fn stroke_rect(&mut self, rect: Rect) -> Result<()> {
        self.set_line_width(self.cell_style.border_width)?;
        self.set_stroke_color(self.cell_style.border_color)?;
        self.push(Command::DrawRect {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            style: RectStyle::Stroke,
        })
    }

    /// Places one line of text inside `rect`, vertically centred the way a
    /// single-line cell is.
    fn place_text(&mut self, rect: Rect, text: &str, font: &FontStyle, align: TextAlign) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let width = self.measure_text(text, font)?;
        let margin = self.cell_style.margin;
        let x = match align {
            TextAlign::Left => rect.x + margin,
            TextAlign::Center => rect.x + (rect.width - width).half(),
        };
        let font_size = font.size_in_units(self.unit_scale);
        let y = rect.y + rect.height.half() + font_size * 0.3;
        self.set_font(font)?;
        self.set_fill_color(self.cell_style.text_color)?;
        self.push(Command::DrawString {
            x,
            y,
            text: text.to_string(),
        })
    }

    fn close_current_page(&mut self) {
        if let Some(page) = self.current.take() {
            self.pages.push(page);
        }
        self.state = GraphicsState::initial();
    }

    fn draw_banner(&mut self) -> Result<()> {
        let Some(banner) = self.template.banner().cloned() else {
            return Ok(());
        };
        let rect = Rect::new(
            self.template.content_left(),
            self.template.margins.top,
            self.template.content_width(),
            banner.height,
        );
        self.draw_band(rect, &banner.text, &banner.font, banner.fill)
    }

    /// Closes the last page and stamps footers now that the page count is known.
    pub fn finish(mut self) -> Result<Document> {
        self.close_current_page();
        if let Some(footer) = self.template.footer().cloned() {
            let total = self.pages.len();
            let pages = std::mem::take(&mut self.pages);
            for (idx, page) in pages.into_iter().enumerate() {
                self.current = Some(page);
                let text = substitute_placeholders(&footer.template, idx + 1, total);
                let rect = Rect::new(
                    self.template.content_left(),
                    self.template.page_size.height - footer.from_bottom,
                    self.template.content_width(),
                    footer.height,
                );
                self.place_text(rect, &text, &footer.font, TextAlign::Center)?;
                self.close_current_page();
            }
        }
        Ok(Document {
            page_size: self.template.page_size,
            unit_scale: self.unit_scale,
            pages: self.pages,
        })
    }
}

impl LayoutBackend for Canvas {
    fn measure_text(&self, text: &str, font: &FontStyle) -> Result<Length> {
        self.measurer.measure(text, font)
    }

    fn draw_bordered_cell(
        &mut self,
        rect: Rect,
        text: &str,
        font: &FontStyle,
        align: TextAlign,
    ) -> Result<()> {
        self.stroke_rect(rect)?;
        self.place_text(rect, text, font, align)
    }

    fn draw_wrapped_text(
        &mut self,
        rect: Rect,
        lines: &[String],
        line_height: Length,
        font: &FontStyle,
        align: TextAlign,
    ) -> Result<()> {
        self.stroke_rect(rect)?;
        for (idx, line) in lines.iter().enumerate() {
            let line_rect = Rect::new(
                rect.x,
                rect.y + line_height * (idx as i32),
                rect.width,
                line_height,
            );
            self.place_text(line_rect, line, font, align)?;
        }
        Ok(())
    }

    fn draw_band(&mut self, rect: Rect, text: &str, font: &FontStyle, fill: Color) -> Result<()> {
        self.set_fill_color(fill)?;
        self.push(Command::DrawRect {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            style: RectStyle::Fill,
        })?;
        self.place_text(rect, text, font, TextAlign::Center)
    }

    fn begin_new_page(&mut self) -> Result<()> {
        self.close_current_page();
        self.current = Some(Page::default());
        tracing::debug!(page = self.pages.len() + 1, "page started");
        self.draw_banner()
    }

    fn content_top(&self) -> Length {
        self.template.content_top()
    }

    fn page_index(&self) -> usize {
        self.pages.len()
    }

    fn template(&self) -> &PageTemplate {
        &self.template
    }

    fn meta(&mut self, key: &str, value: &str) {
        if let Some(page) = self.current.as_mut() {
            page.commands.push(Command::Meta {
                key: key.to_string(),
                value: value.to_string(),
            });
        }
    }
}
