use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use anyhow::{bail, Context, Result};
use serde_json::Value as JsonValue;

use super::filter::SurveyColumns;
use super::model::{CellValue, Dataset, Row};

/// Ages outside `(0, MAX_AGE]` are treated as missing.
pub const MAX_AGE: i64 = 120;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a survey from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`  – header row with question codes, one response per line
/// * `.json` – `[{ "PERG.5": 42, "PERG.9": "Feminino", ... }, ...]`
pub fn load_file(path: &Path) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" => load_csv(path),
        "json" => load_json(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

/// Load a survey and clean its age column.
pub fn load_survey(path: &Path, columns: &SurveyColumns) -> Result<Dataset> {
    let mut dataset = load_file(path).with_context(|| format!("loading {}", path.display()))?;
    let cleared = prepare_ages(&mut dataset, &columns.age);
    log::info!(
        "Loaded {} responses with {} columns from {} ({cleared} unusable ages)",
        dataset.len(),
        dataset.column_names.len(),
        path.display()
    );
    Ok(dataset)
}

fn cache() -> &'static Mutex<HashMap<PathBuf, Arc<Dataset>>> {
    static CACHE: OnceLock<Mutex<HashMap<PathBuf, Arc<Dataset>>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// [`load_survey`] memoized per canonical path for the life of the process.
pub fn load_cached(path: &Path, columns: &SurveyColumns) -> Result<Arc<Dataset>> {
    let key = path
        .canonicalize()
        .with_context(|| format!("resolving {}", path.display()))?;

    if let Some(hit) = cache()
        .lock()
        .map_err(|_| anyhow::anyhow!("dataset cache poisoned"))?
        .get(&key)
    {
        log::debug!("dataset cache hit for {}", key.display());
        return Ok(Arc::clone(hit));
    }

    let dataset = Arc::new(load_survey(&key, columns)?);
    cache()
        .lock()
        .map_err(|_| anyhow::anyhow!("dataset cache poisoned"))?
        .insert(key, Arc::clone(&dataset));
    Ok(dataset)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with question codes. Every cell is typed with
/// [`CellValue::guess`]; short records read the missing cells as null.
fn load_csv(path: &Path) -> Result<Dataset> {
    let file = std::fs::File::open(path).context("opening CSV")?;
    read_csv(file)
}

/// Parse CSV text from any reader.
pub fn read_csv<R: Read>(input: R) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        let mut row = Row::new();
        for (col_idx, col_name) in headers.iter().enumerate() {
            let value = record.get(col_idx).map_or(CellValue::Null, CellValue::guess);
            row.set(col_name, value);
        }
        rows.push(row);
    }

    Ok(Dataset::with_columns(headers, rows))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, as written by `df.to_json(orient='records')`.
fn load_json(path: &Path) -> Result<Dataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    parse_json(&text)
}

pub fn parse_json(text: &str) -> Result<Dataset> {
    let root: JsonValue = serde_json::from_str(text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let mut rows = Vec::with_capacity(records.len());

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let mut row = Row::new();
        for (key, val) in obj {
            row.set(key, json_to_cell(val));
        }
        rows.push(row);
    }

    Ok(Dataset::from_rows(rows))
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::guess(s),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::Text(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Text(b.to_string()),
        JsonValue::Null => CellValue::Null,
        other => CellValue::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Age cleanup
// ---------------------------------------------------------------------------

/// First run of ASCII digits in `s` ("42 anos" → 42).
pub fn extract_age(s: &str) -> Option<i64> {
    let digits: String = s
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Rewrite the age column as integers. Unparseable or implausible ages
/// become null (rows are kept). Returns how many cells were cleared.
pub fn prepare_ages(dataset: &mut Dataset, column: &str) -> usize {
    let mut cleared = 0;
    for row in &mut dataset.rows {
        let raw = row.get(column);
        if raw.is_null() {
            continue;
        }
        let age = match raw {
            CellValue::Integer(i) => Some(*i),
            CellValue::Float(f) => Some(f.trunc() as i64),
            CellValue::Text(s) => extract_age(s),
            CellValue::Null => None,
        }
        .filter(|a| *a > 0 && *a <= MAX_AGE);

        match age {
            Some(a) => row.set(column, CellValue::Integer(a)),
            None => {
                row.set(column, CellValue::Null);
                cleared += 1;
            }
        }
    }
    cleared
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
PERG.5,PERG.6,PERG.7,PERG.9,PERG.16
42 anos,São Paulo (SP),Capital,Masculino,Superior
,Bahia (BA),Interior,Feminino,
abc,Bahia (BA),Interior,Feminino,Médio
130,Paraná (PR)
";

    #[test]
    fn csv_cells_are_typed_and_padded() {
        let ds = read_csv(CSV.as_bytes()).unwrap();
        assert_eq!(ds.len(), 4);
        assert_eq!(ds.column_names[0], "PERG.5");
        assert_eq!(ds.rows[0].get("PERG.5"), &CellValue::Text("42 anos".into()));
        assert!(ds.rows[1].get("PERG.16").is_null());
        assert!(ds.rows[3].get("PERG.9").is_null());
        assert_eq!(ds.rows[3].get("PERG.5"), &CellValue::Integer(130));
    }

    #[test]
    fn ages_are_extracted_and_range_checked() {
        let mut ds = read_csv(CSV.as_bytes()).unwrap();
        let cleared = prepare_ages(&mut ds, "PERG.5");
        assert_eq!(cleared, 2);
        assert_eq!(ds.rows[0].get("PERG.5"), &CellValue::Integer(42));
        assert!(ds.rows[1].get("PERG.5").is_null());
        assert!(ds.rows[2].get("PERG.5").is_null());
        assert!(ds.rows[3].get("PERG.5").is_null());
    }

    #[test]
    fn extract_age_takes_first_digit_run() {
        assert_eq!(extract_age("tenho 35 anos e 2 meses"), Some(35));
        assert_eq!(extract_age("sem idade"), None);
    }

    #[test]
    fn json_records() {
        let ds = parse_json(r#"[{"PERG.5": 30, "PERG.9": "Feminino"}, {"PERG.5": null}]"#).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.rows[0].get("PERG.5"), &CellValue::Integer(30));
        assert!(ds.rows[1].get("PERG.9").is_null());
        assert!(parse_json(r#"{"not": "an array"}"#).is_err());
    }

    #[test]
    fn unsupported_extension() {
        assert!(load_file(Path::new("survey.xlsx")).is_err());
    }
}
