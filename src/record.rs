//! Row data handed to the layout engine. Records arrive already filtered to a
//! single subject; nothing here fetches or parses source sheets.

use std::sync::Arc;

pub const HOUR_TYPE: &str = "Tipo de horas";
pub const ACTIVITY_DATE: &str = "Fecha de la Actividad";
pub const ACTIVITY_CODE: &str = "Siglas de la Actividad";
pub const DESCRIPTION: &str = "Descripción de la Actividad";
pub const HOURS: &str = "Horas";

pub const NAME: &str = "Nombre";
pub const ASSIGNED_HOURS: &str = "Horas asignadas";
pub const TOTAL_HOURS: &str = "Horas totales";
pub const COMPLETED_HOURS: &str = "Horas realizadas";
pub const PERCENTAGE: &str = "Porcentaje";
pub const PENDING_HOURS: &str = "Horas pendientes";
pub const CUTOFF_DATE: &str = "Fecha de corte";

pub const SUMMARY_KEYS: [&str; 7] = [
    NAME,
    ASSIGNED_HOURS,
    TOTAL_HOURS,
    COMPLETED_HOURS,
    PERCENTAGE,
    PENDING_HOURS,
    CUTOFF_DATE,
];

/// One activity entry: named fields in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(Arc<str>, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, key: impl Into<Arc<str>>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
        self
    }

    pub fn activity(
        hour_type: impl Into<String>,
        date: impl Into<String>,
        code: impl Into<String>,
        description: impl Into<String>,
        hours: impl Into<String>,
    ) -> Self {
        Self::new()
            .with_field(HOUR_TYPE, hour_type)
            .with_field(ACTIVITY_DATE, date)
            .with_field(ACTIVITY_CODE, code)
            .with_field(DESCRIPTION, description)
            .with_field(HOURS, hours)
    }

    /// Field value, or the empty string when the source row lacks the key.
    pub fn get(&self, key: &str) -> &str {
        self.fields
            .iter()
            .find(|(k, _)| k.as_ref() == key)
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_ref(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<Arc<str>>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Record::new(), |record, (k, v)| record.with_field(k, v))
    }
}

/// The per-subject cut-off row: always the seven [`SUMMARY_KEYS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    values: [String; 7],
}

impl SummaryRow {
    pub fn new(values: [String; 7]) -> Self {
        Self { values }
    }

    /// Builds the row from a keyed record; missing keys become empty strings.
    pub fn from_record(record: &Record) -> Self {
        Self {
            values: SUMMARY_KEYS.map(|key| record.get(key).to_string()),
        }
    }

    pub fn get(&self, key: &str) -> &str {
        SUMMARY_KEYS
            .iter()
            .position(|k| *k == key)
            .map(|idx| self.values[idx].as_str())
            .unwrap_or("")
    }

    pub fn name(&self) -> &str {
        &self.values[0]
    }

    pub fn values(&self) -> &[String; 7] {
        &self.values
    }
}

/// Everything needed to render one subject's report.
#[derive(Debug, Clone)]
pub struct SubjectReport {
    pub subject: String,
    pub rows: Vec<Record>,
    pub summary: Option<SummaryRow>,
}

impl SubjectReport {
    pub fn new(subject: impl Into<String>, rows: Vec<Record>) -> Self {
        Self {
            subject: subject.into(),
            rows,
            summary: None,
        }
    }

    pub fn with_summary(mut self, summary: SummaryRow) -> Self {
        self.summary = Some(summary);
        self
    }
}
