use crate::error::{Result, SheetError};
use calamine::{Data, Reader, Xlsx};
use kbnav::{NodeId, Row};
use serde::Deserialize;
use std::io::Cursor;
use std::path::Path;

/// Sheet encodings understood by [`SheetReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Csv,
    Json,
    Xlsx,
}

impl SheetFormat {
    /// Pick the format from a file name's extension (case-insensitive).
    pub fn from_file_name(file_name: &str) -> Result<Self> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv") => Ok(SheetFormat::Csv),
            Some("json") => Ok(SheetFormat::Json),
            Some("xlsx") => Ok(SheetFormat::Xlsx),
            _ => Err(SheetError::UnsupportedFormat(file_name.to_string())),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            SheetFormat::Csv => "csv",
            SheetFormat::Json => "json",
            SheetFormat::Xlsx => "xlsx",
        }
    }
}

/// Decodes dataset sheets into raw rows.
///
/// Column names are matched case-insensitively, ignoring spaces,
/// underscores and dashes:
///
/// | column | aliases | required |
/// |---|---|---|
/// | `id` | | yes |
/// | `name` | `title` | yes |
/// | `parentid` | `parent_id`, `parent` | no |
/// | `text` | `body` | no |
///
/// Workbooks are read from their first worksheet, whose first row holds
/// the headers. Blank `id` cells become rows without an id (rejected
/// later by tree validation); blank parent cells mean "no parent"; blank
/// text cells mean "no body". Fully blank lines are skipped.
pub struct SheetReader;

impl SheetReader {
    pub fn read_path<P: AsRef<Path>>(path: P) -> Result<Vec<Row>> {
        let path = path.as_ref();
        let format = SheetFormat::from_file_name(&path.to_string_lossy())?;
        let bytes = std::fs::read(path)?;
        Self::read_bytes(format, &bytes)
    }

    pub fn read_bytes(format: SheetFormat, bytes: &[u8]) -> Result<Vec<Row>> {
        match format {
            SheetFormat::Csv => Self::read_csv(strip_bom(bytes)),
            SheetFormat::Json => Self::read_json(strip_bom(bytes)),
            SheetFormat::Xlsx => Self::read_xlsx(bytes),
        }
    }

    fn read_csv(bytes: &[u8]) -> Result<Vec<Row>> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(bytes);

        let columns = Columns::locate(reader.headers()?.iter())?;
        let mut rows = Vec::new();

        for (idx, record) in reader.records().enumerate() {
            let record = record?;
            // The csv crate skips empty lines, so count from the reader's position.
            let line = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(idx + 2);
            if record.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }

            let cell = |col: Option<usize>| {
                col.and_then(|c| record.get(c))
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
            };

            rows.push(Row {
                id: parse_id(cell(Some(columns.id)), line, "id")?,
                parent: parse_id(cell(columns.parent), line, "parentid")?,
                name: cell(Some(columns.name)).unwrap_or_default().to_string(),
                text: columns
                    .text
                    .and_then(|c| record.get(c))
                    .filter(|s| !s.trim().is_empty())
                    .map(str::to_string),
            });
        }

        Ok(rows)
    }

    fn read_json(bytes: &[u8]) -> Result<Vec<Row>> {
        let raw: Vec<JsonRow> = serde_json::from_slice(bytes)?;
        raw.into_iter()
            .enumerate()
            .map(|(idx, r)| {
                let line = idx + 1;
                Ok(Row {
                    id: json_id(r.id, line, "id")?,
                    parent: json_id(r.parentid, line, "parentid")?,
                    name: r.name,
                    text: r.text.filter(|t| !t.trim().is_empty()),
                })
            })
            .collect()
    }

    fn read_xlsx(bytes: &[u8]) -> Result<Vec<Row>> {
        let mut workbook: Xlsx<_> = calamine::open_workbook_from_rs(Cursor::new(bytes))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or(SheetError::NoWorksheet)??;
        let first_line = range.start().map(|(row, _)| row as usize + 1).unwrap_or(1);

        let mut records = range.rows();
        let Some(header) = records.next() else {
            return Err(SheetError::MissingColumn("id"));
        };
        let header: Vec<String> = header.iter().map(|c| c.to_string()).collect();
        let columns = Columns::locate(header.iter().map(String::as_str))?;
        let mut rows = Vec::new();

        for (idx, record) in records.enumerate() {
            let line = first_line + idx + 1;
            if record.iter().all(is_blank) {
                continue;
            }

            let cell = |col: Option<usize>| col.and_then(|c| record.get(c)).filter(|d| !is_blank(d));

            rows.push(Row {
                id: cell_id(cell(Some(columns.id)), line, "id")?,
                parent: cell_id(cell(columns.parent), line, "parentid")?,
                name: cell(Some(columns.name))
                    .map(|d| d.to_string().trim().to_string())
                    .unwrap_or_default(),
                text: cell(columns.text).map(|d| d.to_string()),
            });
        }

        Ok(rows)
    }
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
}

/// Header positions of the known columns.
#[derive(Debug)]
struct Columns {
    id: usize,
    name: usize,
    parent: Option<usize>,
    text: Option<usize>,
}

impl Columns {
    fn locate<'a, I>(headers: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let normalized: Vec<String> = headers.into_iter().map(normalize_header).collect();
        let find = |aliases: &[&str]| {
            normalized
                .iter()
                .position(|h| aliases.contains(&h.as_str()))
        };

        Ok(Self {
            id: find(&["id"]).ok_or(SheetError::MissingColumn("id"))?,
            name: find(&["name", "title"]).ok_or(SheetError::MissingColumn("name"))?,
            parent: find(&["parentid", "parent"]),
            text: find(&["text", "body"]),
        })
    }
}

fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

fn parse_id(cell: Option<&str>, line: usize, column: &'static str) -> Result<Option<NodeId>> {
    cell.map(|raw| {
        raw.parse::<NodeId>().map_err(|_| SheetError::InvalidCell {
            line,
            column,
            value: raw.to_string(),
        })
    })
    .transpose()
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Spreadsheet numbers arrive as floats; integral ones are ids.
fn cell_id(cell: Option<&Data>, line: usize, column: &'static str) -> Result<Option<NodeId>> {
    let Some(cell) = cell else {
        return Ok(None);
    };
    let invalid = || SheetError::InvalidCell {
        line,
        column,
        value: cell.to_string(),
    };

    match cell {
        Data::Int(raw) => Ok(Some(NodeId::new(*raw))),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Ok(Some(NodeId::new(*f as i64))),
        Data::String(s) => s.parse::<NodeId>().map(Some).map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

#[derive(Debug, Deserialize)]
struct JsonRow {
    #[serde(default)]
    id: serde_json::Value,
    #[serde(default, alias = "parent_id", alias = "parent")]
    parentid: serde_json::Value,
    name: String,
    #[serde(default, alias = "body")]
    text: Option<String>,
}

fn json_id(value: serde_json::Value, line: usize, column: &'static str) -> Result<Option<NodeId>> {
    use serde_json::Value;

    let invalid = |value: &Value| SheetError::InvalidCell {
        line,
        column,
        value: value.to_string(),
    };

    match &value {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s.parse::<NodeId>().map(Some).map_err(|_| invalid(&value)),
        Value::Number(n) => match n.as_i64() {
            Some(raw) => Ok(Some(NodeId::new(raw))),
            None => n
                .to_string()
                .parse::<NodeId>()
                .map(Some)
                .map_err(|_| invalid(&value)),
        },
        _ => Err(invalid(&value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn csv(text: &str) -> Result<Vec<Row>> {
        SheetReader::read_bytes(SheetFormat::Csv, text.as_bytes())
    }

    fn json(text: &str) -> Result<Vec<Row>> {
        SheetReader::read_bytes(SheetFormat::Json, text.as_bytes())
    }

    #[test]
    fn test_format_from_file_name() {
        assert_eq!(SheetFormat::from_file_name("data.csv").unwrap(), SheetFormat::Csv);
        assert_eq!(SheetFormat::from_file_name("DATA.JSON").unwrap(), SheetFormat::Json);
        assert_eq!(SheetFormat::from_file_name("data.xlsx").unwrap(), SheetFormat::Xlsx);
        assert!(matches!(
            SheetFormat::from_file_name("data.xls"),
            Err(SheetError::UnsupportedFormat(_))
        ));
        assert!(SheetFormat::from_file_name("csv").is_err());
    }

    #[test]
    fn test_csv_basic() {
        let rows = csv("id,parentid,name,text\n1,,Root,R\n2,1,A,a\n3,1,B,\n").unwrap();
        assert_eq!(
            rows,
            vec![
                Row::new(1, "Root").with_text("R"),
                Row::new(2, "A").with_parent(1).with_text("a"),
                Row::new(3, "B").with_parent(1),
            ]
        );
    }

    #[test]
    fn test_csv_header_aliases_and_order() {
        let rows = csv("Title,Body,Parent_ID,ID\nRoot,hello,,1\nKid,,1,2\n").unwrap();
        assert_eq!(rows[0], Row::new(1, "Root").with_text("hello"));
        assert_eq!(rows[1], Row::new(2, "Kid").with_parent(1));
    }

    #[test]
    fn test_csv_float_ids_from_spreadsheet_export() {
        let rows = csv("id,parentid,name\n1.0,,Root\n2.0,1.0,A\n").unwrap();
        assert_eq!(rows[1], Row::new(2, "A").with_parent(1));
    }

    #[test]
    fn test_csv_multiline_text_kept() {
        let rows = csv("id,name,text\n1,Root,\"line one\nline two\"\n").unwrap();
        assert_eq!(rows[0].text.as_deref(), Some("line one\nline two"));
    }

    #[test]
    fn test_csv_blank_lines_skipped_and_blank_id_kept() {
        let rows = csv("id,name\n1,Root\n,,\n,Nameless\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], Row::without_id("Nameless"));
    }

    #[test]
    fn test_csv_without_parent_column() {
        let rows = csv("id,name\n1,Root\n").unwrap();
        assert_eq!(rows, vec![Row::new(1, "Root")]);
    }

    #[test]
    fn test_csv_missing_required_column() {
        assert!(matches!(csv("id,text\n1,x\n"), Err(SheetError::MissingColumn("name"))));
        assert!(matches!(csv("name\nRoot\n"), Err(SheetError::MissingColumn("id"))));
    }

    #[test]
    fn test_csv_invalid_id_cell() {
        let err = csv("id,parentid,name\n1,,Root\n2,one,A\n").unwrap_err();
        match err {
            SheetError::InvalidCell { line, column, value } => {
                assert_eq!(line, 3);
                assert_eq!(column, "parentid");
                assert_eq!(value, "one");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_csv_invalid_cell_reports_file_line() {
        let err = csv("id,name\n1,Root\n\n\nx,Bad\n").unwrap_err();
        assert!(matches!(err, SheetError::InvalidCell { line: 5, column: "id", .. }));
        assert!(err.to_string().starts_with("line 5:"));

        let err = csv("id,name,text\n1,Root,\"two\nlines\"\nx,Bad,\n").unwrap_err();
        assert!(matches!(err, SheetError::InvalidCell { line: 4, .. }));
    }

    #[test]
    fn test_csv_with_bom() {
        let rows = csv("\u{feff}id,name\n1,Root\n").unwrap();
        assert_eq!(rows, vec![Row::new(1, "Root")]);
    }

    #[test]
    fn test_json_rows() {
        let rows = json(
            r#"[
                {"id": 1, "name": "Root", "text": "R"},
                {"id": "2", "parent_id": 1, "name": "A", "body": "a"},
                {"id": 3.0, "parentid": "1", "name": "B", "text": ""}
            ]"#,
        )
        .unwrap();
        assert_eq!(
            rows,
            vec![
                Row::new(1, "Root").with_text("R"),
                Row::new(2, "A").with_parent(1).with_text("a"),
                Row::new(3, "B").with_parent(1),
            ]
        );
    }

    #[test]
    fn test_json_rejects_bad_shapes() {
        assert!(matches!(json(r#"{"id":1}"#), Err(SheetError::Json(_))));
        assert!(matches!(json(r#"[{"id":1}]"#), Err(SheetError::Json(_))));
        assert!(matches!(
            json(r#"[{"id":[1],"name":"x"}]"#),
            Err(SheetError::InvalidCell { column: "id", .. })
        ));
        assert!(matches!(
            json(r#"[{"id":1.5,"name":"x"}]"#),
            Err(SheetError::InvalidCell { .. })
        ));
    }

    const WORKBOOK: &[u8] = include_bytes!("../tests/fixtures/data.xlsx");
    const BAD_WORKBOOK: &[u8] = include_bytes!("../tests/fixtures/bad_id.xlsx");

    #[test]
    fn test_xlsx_first_sheet() {
        let rows = SheetReader::read_bytes(SheetFormat::Xlsx, WORKBOOK).unwrap();
        assert_eq!(
            rows,
            vec![
                Row::new(1, "Root").with_text("R"),
                Row::new(2, "A").with_parent(1).with_text("a"),
                Row::new(3, "B").with_parent(1),
                Row::new(4, "A1").with_parent(2).with_text("line one\nline two"),
            ]
        );
    }

    #[test]
    fn test_xlsx_invalid_cell_reports_sheet_row() {
        let err = SheetReader::read_bytes(SheetFormat::Xlsx, BAD_WORKBOOK).unwrap_err();
        match err {
            SheetError::InvalidCell { line, column, value } => {
                assert_eq!(line, 4);
                assert_eq!(column, "id");
                assert_eq!(value, "x");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_xlsx_rejects_non_workbook() {
        assert!(matches!(
            SheetReader::read_bytes(SheetFormat::Xlsx, b"id,name\n1,Root\n"),
            Err(SheetError::Xlsx(_))
        ));
    }

    #[test]
    fn test_xlsx_cell_ids() {
        assert_eq!(cell_id(Some(&Data::Float(2.0)), 2, "id").unwrap(), Some(NodeId::new(2)));
        assert_eq!(cell_id(Some(&Data::Int(7)), 2, "id").unwrap(), Some(NodeId::new(7)));
        assert_eq!(
            cell_id(Some(&Data::String(" 3.0 ".into())), 2, "id").unwrap(),
            Some(NodeId::new(3))
        );
        assert_eq!(cell_id(None, 2, "id").unwrap(), None);
        assert!(cell_id(Some(&Data::Float(2.5)), 2, "id").is_err());
        assert!(cell_id(Some(&Data::Bool(true)), 2, "id").is_err());
    }

    #[test]
    fn test_read_path() {
        let mut f = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(f, "id,parentid,name,text\n1,,Root,R\n").unwrap();
        f.flush().unwrap();
        let rows = SheetReader::read_path(f.path()).unwrap();
        assert_eq!(rows, vec![Row::new(1, "Root").with_text("R")]);
    }
}
