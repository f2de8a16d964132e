use crate::error::Result;
use crate::font::{FontStyle, TextMeasurer};
use crate::record::{self, Record};
use crate::types::Length;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub label: String,
    pub source_key: String,
    pub is_flexible: bool,
}

impl ColumnSpec {
    pub fn new(label: impl Into<String>, source_key: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            source_key: source_key.into(),
            is_flexible: false,
        }
    }

    pub fn flexible(mut self) -> Self {
        self.is_flexible = true;
        self
    }
}

/// The activity table: five columns, the description absorbs overflow.
pub fn activity_columns() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::new("Tipo de horas", record::HOUR_TYPE),
        ColumnSpec::new("Fecha de Actividad", record::ACTIVITY_DATE),
        ColumnSpec::new("Siglas", record::ACTIVITY_CODE),
        ColumnSpec::new("Descripción de la actividad", record::DESCRIPTION).flexible(),
        ColumnSpec::new("Horas", record::HOURS),
    ]
}

/// The summary table: one column per summary key, labelled by the key itself.
pub fn summary_columns() -> Vec<ColumnSpec> {
    record::SUMMARY_KEYS
        .iter()
        .map(|key| ColumnSpec::new(*key, *key))
        .collect()
}

/// Parameters of the sizing pass.
#[derive(Debug, Clone)]
pub struct SizingParams<'a> {
    pub header_font: &'a FontStyle,
    pub body_font: &'a FontStyle,
    /// Added to every measured width (both sides together).
    pub padding: Length,
    /// Page width minus left and right margins.
    pub content_width: Length,
    /// Floor for the flexible column after shrinking.
    pub min_flexible_width: Length,
}

/// Per-column widths for one table render.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnWidths {
    widths: Vec<Length>,
    natural: Vec<Length>,
    content_width: Length,
}

impl ColumnWidths {
    pub fn from_widths(widths: Vec<Length>, content_width: Length) -> Self {
        Self {
            natural: widths.clone(),
            widths,
            content_width,
        }
    }

    pub fn widths(&self) -> &[Length] {
        &self.widths
    }

    /// Widths before the shrink pass.
    pub fn natural_widths(&self) -> &[Length] {
        &self.natural
    }

    pub fn get(&self, index: usize) -> Length {
        self.widths.get(index).copied().unwrap_or(Length::ZERO)
    }

    pub fn len(&self) -> usize {
        self.widths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widths.is_empty()
    }

    pub fn total(&self) -> Length {
        self.widths.iter().sum()
    }

    /// How far the table still extends past the content width, if at all.
    pub fn overflow(&self) -> Option<Length> {
        let total = self.total();
        (total > self.content_width).then(|| total - self.content_width)
    }

    /// Left edge of each column relative to the table's left edge.
    pub fn offsets(&self) -> Vec<Length> {
        let mut x = Length::ZERO;
        self.widths
            .iter()
            .map(|w| {
                let left = x;
                x += *w;
                left
            })
            .collect()
    }
}

/// Sizes every column to its widest content (header label included), then
/// shrinks the flexible column once by the amount the table exceeds the
/// content width. The shrink never goes below `min_flexible_width` and the
/// excess is never spread over other columns, so the table can still overflow.
pub fn size_columns(
    columns: &[ColumnSpec],
    rows: &[Record],
    params: &SizingParams<'_>,
    measurer: &dyn TextMeasurer,
) -> Result<ColumnWidths> {
    size_columns_with(columns, rows, params, |text, font| measurer.measure(text, font))
}

/// [`size_columns`] over any width function, such as a backend's `measure_text`.
pub fn size_columns_with<F>(
    columns: &[ColumnSpec],
    rows: &[Record],
    params: &SizingParams<'_>,
    mut measure: F,
) -> Result<ColumnWidths>
where
    F: FnMut(&str, &FontStyle) -> Result<Length>,
{
    let mut natural = Vec::with_capacity(columns.len());
    for column in columns {
        let mut widest = measure(&column.label, params.header_font)?;
        for row in rows {
            widest = widest.max(measure(row.get(&column.source_key), params.body_font)?);
        }
        natural.push(widest + params.padding);
    }

    let mut widths = natural.clone();
    let total: Length = widths.iter().sum();
    if total > params.content_width {
        let excess = total - params.content_width;
        if let Some(idx) = columns.iter().position(|c| c.is_flexible) {
            let shrunk = (widths[idx] - excess).max(params.min_flexible_width);
            tracing::debug!(
                column = %columns[idx].label,
                from = %widths[idx],
                to = %shrunk,
                %excess,
                "shrinking flexible column"
            );
            widths[idx] = shrunk;
        }
    }

    let sized = ColumnWidths {
        widths,
        natural,
        content_width: params.content_width,
    };
    if let Some(overflow) = sized.overflow() {
        tracing::warn!(
            %overflow,
            content_width = %params.content_width,
            "table is wider than the page content area after shrinking"
        );
    }
    Ok(sized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::tests::MonoMeasurer;
    use crate::font::FontVariant;
    use pretty_assertions::assert_eq;

    fn fonts() -> (FontStyle, FontStyle) {
        (
            FontStyle::helvetica(FontVariant::Bold, 11.0),
            FontStyle::helvetica(FontVariant::Regular, 10.0),
        )
    }

    fn params<'a>(
        header: &'a FontStyle,
        body: &'a FontStyle,
        padding: i32,
        content: i32,
    ) -> SizingParams<'a> {
        SizingParams {
            header_font: header,
            body_font: body,
            padding: Length::from_i32(padding),
            content_width: Length::from_i32(content),
            min_flexible_width: Length::from_i32(30),
        }
    }

    fn lens(values: &[i32]) -> Vec<Length> {
        values.iter().map(|v| Length::from_i32(*v)).collect()
    }

    fn three_columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new("a", "a"),
            ColumnSpec::new("b", "b").flexible(),
            ColumnSpec::new("c", "c"),
        ]
    }

    #[test]
    fn widths_cover_header_and_every_cell() {
        let (header, body) = fonts();
        let rows = vec![
            Record::activity("Docencia", "2024-03-01", "TLC", "Taller", "2"),
            Record::activity("Apoyo", "2024-03-02", "REU", "Reunion larga", "12.5"),
        ];
        let columns = activity_columns();
        let sized = size_columns(&columns, &rows, &params(&header, &body, 4, 500), &MonoMeasurer)
            .expect("size");
        // "Tipo de horas"=13, "Fecha de Actividad"=18, "Siglas"=6,
        // "Descripción de la actividad"=27, "Horas"=5; all beat the cells.
        assert_eq!(sized.widths(), lens(&[17, 22, 10, 31, 9]).as_slice());
        assert_eq!(sized.overflow(), None);
        for (idx, column) in columns.iter().enumerate() {
            assert!(sized.get(idx) >= Length::from_i32(column.label.chars().count() as i32));
            for row in &rows {
                let cell = row.get(&column.source_key).chars().count() as i32;
                assert!(sized.get(idx) >= Length::from_i32(cell));
            }
        }
    }

    #[test]
    fn flexible_column_absorbs_excess() {
        // Others 100 + 120 = 220, flexible 120, budget 300 -> excess 40 -> 80.
        let (header, body) = fonts();
        let rows = vec![
            Record::new()
                .with_field("a", "x".repeat(100))
                .with_field("b", "y".repeat(120))
                .with_field("c", "z".repeat(120)),
        ];
        let sized = size_columns(
            &three_columns(),
            &rows,
            &params(&header, &body, 0, 300),
            &MonoMeasurer,
        )
        .expect("size");
        assert_eq!(sized.widths(), lens(&[100, 80, 120]).as_slice());
        assert_eq!(sized.natural_widths(), lens(&[100, 120, 120]).as_slice());
        assert_eq!(sized.total(), Length::from_i32(300));
        assert_eq!(sized.overflow(), None);
    }

    #[test]
    fn shrink_stops_at_minimum_and_table_overflows() {
        let (header, body) = fonts();
        let rows = vec![
            Record::new()
                .with_field("a", "x".repeat(200))
                .with_field("b", "y".repeat(60))
                .with_field("c", "z".repeat(100)),
        ];
        let sized = size_columns(
            &three_columns(),
            &rows,
            &params(&header, &body, 0, 300),
            &MonoMeasurer,
        )
        .expect("size");
        // excess = 60, flexible 60 - 60 = 0 -> floored to 30; others untouched.
        assert_eq!(sized.widths(), lens(&[200, 30, 100]).as_slice());
        assert_eq!(sized.overflow(), Some(Length::from_i32(30)));
    }

    #[test]
    fn shrink_never_touches_non_flexible_columns() {
        let (header, body) = fonts();
        let columns = vec![ColumnSpec::new("a", "a"), ColumnSpec::new("b", "b")];
        let rows = vec![
            Record::new()
                .with_field("a", "x".repeat(200))
                .with_field("b", "y".repeat(200)),
        ];
        let sized = size_columns(&columns, &rows, &params(&header, &body, 0, 300), &MonoMeasurer)
            .expect("size");
        assert_eq!(sized.widths(), lens(&[200, 200]).as_slice());
        assert_eq!(sized.overflow(), Some(Length::from_i32(100)));
    }

    #[test]
    fn empty_rows_size_from_headers_alone() {
        let (header, body) = fonts();
        let sized = size_columns(
            &summary_columns(),
            &[],
            &params(&header, &body, 4, 500),
            &MonoMeasurer,
        )
        .expect("size");
        assert_eq!(sized.len(), 7);
        assert_eq!(sized.get(0), Length::from_i32(10)); // "Nombre" + 4
    }

    #[test]
    fn offsets_accumulate_widths() {
        let widths = ColumnWidths::from_widths(lens(&[10, 20, 5]), Length::from_i32(100));
        assert_eq!(widths.offsets(), lens(&[0, 10, 30]));
        assert_eq!(widths.get(9), Length::ZERO);
    }
}
