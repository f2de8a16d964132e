use crate::canvas::{Command, Document};
use crate::summary::META_SUMMARY;
use crate::table::{META_TABLE_HEADER, META_TABLE_ROW};
use crate::types::Length;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMetrics {
    pub page_number: usize,
    /// Drawing commands, metadata markers excluded.
    pub command_count: usize,
    pub header_draws: usize,
    pub row_count: usize,
    pub has_summary: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentMetrics {
    pub pages: Vec<PageMetrics>,
    pub total_render_ms: f64,
    /// How far the activity table extends past the content width.
    pub column_overflow: Option<Length>,
}

impl DocumentMetrics {
    pub fn from_document(document: &Document) -> Self {
        let pages = document
            .pages
            .iter()
            .enumerate()
            .map(|(idx, page)| {
                let mut metrics = PageMetrics {
                    page_number: idx + 1,
                    ..PageMetrics::default()
                };
                for cmd in &page.commands {
                    match cmd {
                        Command::Meta { key, .. } if key == META_TABLE_HEADER => {
                            metrics.header_draws += 1
                        }
                        Command::Meta { key, .. } if key == META_TABLE_ROW => metrics.row_count += 1,
                        Command::Meta { key, .. } if key == META_SUMMARY => metrics.has_summary = true,
                        Command::Meta { .. } => {}
                        _ => metrics.command_count += 1,
                    }
                }
                metrics
            })
            .collect();
        Self {
            pages,
            ..Self::default()
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn total_rows(&self) -> usize {
        self.pages.iter().map(|p| p.row_count).sum()
    }

    pub fn total_header_draws(&self) -> usize {
        self.pages.iter().map(|p| p.header_draws).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Page;
    use crate::types::Size;
    use pretty_assertions::assert_eq;

    fn meta(key: &str, value: &str) -> Command {
        Command::Meta {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn counts_markers_per_page() {
        let doc = Document {
            page_size: Size::a4_mm(),
            unit_scale: 1.0,
            pages: vec![
                Page {
                    commands: vec![
                        meta(META_SUMMARY, "Ana"),
                        Command::SetLineWidth(Length::from_i32(1)),
                        meta(META_TABLE_HEADER, "activities"),
                        meta(META_TABLE_ROW, "0"),
                        meta(META_TABLE_ROW, "1"),
                    ],
                },
                Page {
                    commands: vec![meta(META_TABLE_HEADER, "activities"), meta(META_TABLE_ROW, "2")],
                },
            ],
        };
        let metrics = DocumentMetrics::from_document(&doc);
        assert_eq!(metrics.page_count(), 2);
        assert_eq!(metrics.total_rows(), 3);
        assert_eq!(metrics.total_header_draws(), 2);
        assert_eq!(
            metrics.pages[0],
            PageMetrics {
                page_number: 1,
                command_count: 1,
                header_draws: 1,
                row_count: 2,
                has_summary: true,
            }
        );
        assert!(!metrics.pages[1].has_summary);
    }
}
