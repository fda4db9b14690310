use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ---------------------------------------------------------------------------
// CellValue – a single answer cell
// ---------------------------------------------------------------------------

/// Spreadsheet exports spell "no answer" in many ways; these read as null.
const NA_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// A dynamically-typed survey answer, as guessed from the CSV text.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Null,
}

impl CellValue {
    /// Guess the type of a raw CSV field. Blank fields and NA markers
    /// (`"nan"`, `"None"`, `"N/A"`, ...) become `Null`.
    pub fn guess(raw: &str) -> Self {
        let s = raw.trim();
        if s.is_empty() || NA_TOKENS.contains(&s) {
            return CellValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return CellValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            if f.is_finite() {
                return CellValue::Float(f);
            }
        }
        CellValue::Text(s.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Text form of a non-null value. Whole floats print without a
    /// fractional part so that `16.0` and `16` compare equal as labels.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Integer(i) => Some(i.to_string()),
            CellValue::Float(v) if v.fract() == 0.0 && v.abs() < 1e15 => {
                Some(format!("{}", *v as i64))
            }
            CellValue::Float(v) => Some(v.to_string()),
            CellValue::Null => None,
        }
    }

    /// Numeric interpretation; text is parsed leniently (`"42"` → 42.0).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::Float(v) if v.is_finite() => Some(*v),
            CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(s) => write!(f, "{s}"),
            None => write!(f, "<null>"),
        }
    }
}

// ---------------------------------------------------------------------------
// Row – one survey response
// ---------------------------------------------------------------------------

static NULL: CellValue = CellValue::Null;

/// One survey response: question code → answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: BTreeMap<String, CellValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for tests and generators.
    pub fn with(mut self, column: &str, value: CellValue) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: &str, value: CellValue) {
        self.cells.insert(column.to_string(), value);
    }

    /// Get-or-null: an absent column reads as `Null`.
    pub fn get(&self, column: &str) -> &CellValue {
        self.cells.get(column).unwrap_or(&NULL)
    }

    /// Trimmed, non-empty text of the cell.
    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column)
            .as_text()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn number(&self, column: &str) -> Option<f64> {
        self.get(column).as_f64()
    }

    pub fn columns(&self) -> impl Iterator<Item = &String> {
        self.cells.keys()
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded survey
// ---------------------------------------------------------------------------

/// All responses of a survey, immutable once built.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// All rows, in file order.
    pub rows: Vec<Row>,
    /// Ordered list of column names as they appeared in the header.
    pub column_names: Vec<String>,
}

impl Dataset {
    /// Build a dataset from rows, collecting the column list from the rows
    /// themselves (sorted).
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let columns: BTreeSet<String> = rows
            .iter()
            .flat_map(|r| r.columns().cloned())
            .collect();
        Dataset {
            rows,
            column_names: columns.into_iter().collect(),
        }
    }

    /// Build with an explicit header order.
    pub fn with_columns(column_names: Vec<String>, rows: Vec<Row>) -> Self {
        Dataset { rows, column_names }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_names.iter().any(|c| c == column)
    }

    /// Sorted distinct non-null text values of a column.
    pub fn distinct_text(&self, column: &str) -> BTreeSet<String> {
        self.rows.iter().filter_map(|r| r.text(column)).collect()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guess_types() {
        assert_eq!(CellValue::guess(""), CellValue::Null);
        assert_eq!(CellValue::guess("  "), CellValue::Null);
        assert_eq!(CellValue::guess("42"), CellValue::Integer(42));
        assert_eq!(CellValue::guess("4.5"), CellValue::Float(4.5));
        assert_eq!(CellValue::guess("Sul"), CellValue::Text("Sul".into()));
        assert_eq!(CellValue::guess("-12"), CellValue::Integer(-12));
    }

    #[test]
    fn na_markers_read_as_null() {
        for token in ["nan", "NaN", "None", "N/A", "NULL", " <NA> "] {
            assert_eq!(CellValue::guess(token), CellValue::Null, "{token}");
        }
        assert_eq!(CellValue::guess("Nao"), CellValue::Text("Nao".into()));
        assert_eq!(CellValue::guess("N"), CellValue::Text("N".into()));
    }

    #[test]
    fn absent_column_reads_as_null() {
        let row = Row::new().with("PERG.9", CellValue::Text("Feminino".into()));
        assert!(row.get("PERG.99").is_null());
        assert_eq!(row.text("PERG.99"), None);
        assert_eq!(row.text("PERG.9").as_deref(), Some("Feminino"));
    }

    #[test]
    fn whole_floats_print_as_integers() {
        assert_eq!(CellValue::Float(16.0).as_text().as_deref(), Some("16"));
        assert_eq!(CellValue::Float(1.5).as_text().as_deref(), Some("1.5"));
    }

    #[test]
    fn distinct_text_skips_nulls() {
        let ds = Dataset::from_rows(vec![
            Row::new().with("s", CellValue::Text("b".into())),
            Row::new().with("s", CellValue::Null),
            Row::new().with("s", CellValue::Text("a".into())),
            Row::new().with("s", CellValue::Text("b".into())),
        ]);
        let got: Vec<String> = ds.distinct_text("s").into_iter().collect();
        assert_eq!(got, vec!["a", "b"]);
        assert_eq!(ds.column_names, vec!["s"]);
    }
}
