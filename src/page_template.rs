use crate::font::FontStyle;
use crate::types::{Color, Length, Margins, Size};

/// Filled title band drawn at the top of every page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageBanner {
    pub text: String,
    pub font: FontStyle,
    pub fill: Color,
    pub height: Length,
    pub gap_after: Length,
}

/// Centred footer line; `{page}` and `{pages}` are substituted once the
/// document is complete.
#[derive(Debug, Clone, PartialEq)]
pub struct PageFooter {
    pub template: String,
    pub font: FontStyle,
    pub from_bottom: Length,
    pub height: Length,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageTemplate {
    pub page_size: Size,
    pub margins: Margins,
    /// Distance from the bottom edge below which no table row may extend.
    pub break_margin: Length,
    banner: Option<PageBanner>,
    footer: Option<PageFooter>,
}

impl PageTemplate {
    pub fn new(page_size: Size, margins: Margins, break_margin: Length) -> Self {
        Self {
            page_size,
            margins,
            break_margin,
            banner: None,
            footer: None,
        }
    }

    pub fn with_banner(mut self, banner: PageBanner) -> Self {
        self.banner = Some(banner);
        self
    }

    pub fn with_footer(mut self, footer: PageFooter) -> Self {
        self.footer = Some(footer);
        self
    }

    pub fn banner(&self) -> Option<&PageBanner> {
        self.banner.as_ref()
    }

    pub fn footer(&self) -> Option<&PageFooter> {
        self.footer.as_ref()
    }

    pub fn content_left(&self) -> Length {
        self.margins.left
    }

    pub fn content_width(&self) -> Length {
        self.page_size.width - self.margins.left - self.margins.right
    }

    /// First y available to body content once the banner is drawn.
    pub fn content_top(&self) -> Length {
        match &self.banner {
            Some(banner) => self.margins.top + banner.height + banner.gap_after,
            None => self.margins.top,
        }
    }

    /// Lowest y a table row may reach.
    pub fn usable_bottom(&self) -> Length {
        self.page_size.height - self.break_margin
    }
}

pub fn substitute_placeholders(template: &str, page_number: usize, total_pages: usize) -> String {
    template
        .replace("{page}", &page_number.to_string())
        .replace("{pages}", &total_pages.to_string())
}
