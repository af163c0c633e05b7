use crate::stage::StageRecord;

pub const DEFAULT_COLUMNS: [&str; 6] = [
    "status",
    "apps",
    "expire",
    "last-modified-by",
    "comment",
    "urls",
];

const UNIT_SEPARATOR: char = '\u{1f}';
const RECORD_SEPARATOR: char = '\u{1e}';

/// Produces the serialized form of a row. Must be a pure function of the
/// record: equal records render equal strings.
pub trait RowRenderer {
    fn render(&self, record: &StageRecord) -> String;
}

/// Renders the stage name followed by `column=value` pairs for a fixed
/// column list. Fields outside the list do not affect the representation.
#[derive(Debug, Clone)]
pub struct ColumnRenderer {
    columns: Vec<String>,
}

impl ColumnRenderer {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Display cells in column order, without the name.
    pub fn cells(&self, record: &StageRecord) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| record.field_text(column))
            .collect()
    }
}

impl Default for ColumnRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_COLUMNS)
    }
}

impl RowRenderer for ColumnRenderer {
    fn render(&self, record: &StageRecord) -> String {
        let mut output = String::with_capacity(64);
        output.push_str(&record.name);
        for column in &self.columns {
            output.push(RECORD_SEPARATOR);
            output.push_str(column);
            output.push(UNIT_SEPARATOR);
            output.push_str(&record.field_text(column));
        }
        output
    }
}
