use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, ExcelDateTime, Reader};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xls", "xlsm", "xlsb", "ods", "csv"];
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const TIME_FORMAT: &str = "%H:%M:%S";

/// 1シート分の表データ。先頭行はヘッダとして `headers` に分けて保持する。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Dataset {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// 列一覧の表示用。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetSummary {
    pub headers: Vec<String>,
    pub labels: Vec<String>,
    pub rows: usize,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DatasetError {
    #[error("対応していない表形式です: {0}")]
    UnsupportedFormat(String),
    #[error("シートが見つかりません")]
    NoSheet,
    #[error("{}行目のデータがありません (データ行数 {len})", .row + 1)]
    RowOutOfRange { row: usize, len: usize },
    #[error("第{}列は存在しません (列数 {width})", .index + 1)]
    ColumnOutOfRange { index: usize, width: usize },
}

impl Dataset {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0)
    }

    pub fn row(&self, row: usize) -> Result<&[String], DatasetError> {
        self.rows
            .get(row)
            .map(Vec::as_slice)
            .ok_or(DatasetError::RowOutOfRange {
                row,
                len: self.rows.len(),
            })
    }

    pub fn value(&self, row: usize, column: usize) -> Result<&str, DatasetError> {
        let width = self.column_count();
        if column >= width {
            return Err(DatasetError::ColumnOutOfRange {
                index: column,
                width,
            });
        }
        // 短い行の末尾は空セル扱い
        Ok(self
            .row(row)?
            .get(column)
            .map(String::as_str)
            .unwrap_or_default())
    }

    /// `1: 氏名` のような列の表示ラベル。ヘッダが空の列は番号のみ。
    pub fn column_labels(&self) -> Vec<String> {
        (0..self.column_count())
            .map(|index| match self.headers.get(index) {
                Some(header) if !header.trim().is_empty() => {
                    format!("{}: {}", index + 1, header.trim())
                }
                _ => format!("{}", index + 1),
            })
            .collect()
    }

    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            headers: self.headers.clone(),
            labels: self.column_labels(),
            rows: self.len(),
        }
    }
}

pub fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            SPREADSHEET_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let ext = path
        .extension()
        .map(|v| v.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    let dataset = match ext.as_str() {
        "csv" => load_csv(path)?,
        "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => load_workbook(path)?,
        _ => return Err(DatasetError::UnsupportedFormat(path.display().to_string()).into()),
    };

    log::debug!(
        "表を読み込みました: {} ({}列 x {}行)",
        path.display(),
        dataset.column_count(),
        dataset.len()
    );
    Ok(dataset)
}

fn load_csv(path: &Path) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("CSVを開けませんでした: {}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("CSVのヘッダを読めませんでした: {}", path.display()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record =
            record.with_context(|| format!("CSVの行を読めませんでした: {}", path.display()))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Dataset::new(headers, rows))
}

fn load_workbook(path: &Path) -> Result<Dataset> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("ブックを開けませんでした: {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(DatasetError::NoSheet)?
        .with_context(|| format!("シートを読めませんでした: {}", path.display()))?;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect::<Vec<String>>());
    let headers = rows.next().unwrap_or_default();
    Ok(Dataset::new(headers, rows.collect()))
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Bool(true) => "True".to_string(),
        Data::Bool(false) => "False".to_string(),
        Data::DateTime(dt) => excel_datetime_to_string(dt),
        Data::DateTimeIso(iso) => iso_datetime_to_string(iso),
        other => other.to_string(),
    }
}

fn excel_datetime_to_string(dt: &ExcelDateTime) -> String {
    if dt.is_duration() {
        return dt
            .as_duration()
            .map(format_duration)
            .unwrap_or_else(|| dt.to_string());
    }
    // シリアル値が1未満なら日付を持たない時刻
    let format = if (0.0..1.0).contains(&dt.as_f64()) {
        TIME_FORMAT
    } else {
        DATETIME_FORMAT
    };
    dt.as_datetime()
        .map(|value| value.format(format).to_string())
        .unwrap_or_else(|| dt.to_string())
}

fn iso_datetime_to_string(iso: &str) -> String {
    if let Ok(value) = NaiveDateTime::parse_from_str(iso, "%Y-%m-%dT%H:%M:%S%.f") {
        return value.format(DATETIME_FORMAT).to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(iso, "%Y-%m-%d") {
        return date.and_time(NaiveTime::MIN).format(DATETIME_FORMAT).to_string();
    }
    if let Ok(time) = NaiveTime::parse_from_str(iso, "%H:%M:%S%.f") {
        return time.format(TIME_FORMAT).to_string();
    }
    iso.to_string()
}

fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds();
    let sign = if total < 0 { "-" } else { "" };
    let total = total.abs();
    format!(
        "{}{:02}:{:02}:{:02}",
        sign,
        total / 3600,
        total % 3600 / 60,
        total % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::ExcelDateTimeType;
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    const SHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
    const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

    /// 1シートだけの最小構成の xlsx を書き出す。スタイル1番は日付書式 (numFmtId 14)。
    fn write_xlsx(path: &Path, sheet_data: &str) {
        let parts = [
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"></Default><Default Extension="xml" ContentType="application/xml"></Default></Types>"#.to_string(),
            ),
            (
                "_rels/.rels",
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"></Relationship></Relationships>"#.to_string(),
            ),
            (
                "xl/workbook.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="{SHEET_NS}" xmlns:r="{REL_NS}"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"></sheet></sheets></workbook>"#
                ),
            ),
            (
                "xl/_rels/workbook.xml.rels",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{REL_NS}/worksheet" Target="worksheets/sheet1.xml"></Relationship><Relationship Id="rId2" Type="{REL_NS}/styles" Target="styles.xml"></Relationship></Relationships>"#
                ),
            ),
            (
                "xl/styles.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?><styleSheet xmlns="{SHEET_NS}"><cellXfs count="2"><xf numFmtId="0"></xf><xf numFmtId="14" applyNumberFormat="1"></xf></cellXfs></styleSheet>"#
                ),
            ),
            (
                "xl/worksheets/sheet1.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="{SHEET_NS}"><sheetData>{sheet_data}</sheetData></worksheet>"#
                ),
            ),
        ];

        let file = fs::File::create(path).expect("create xlsx");
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, body) in parts {
            zip.start_file(name, options).expect("start part");
            zip.write_all(body.as_bytes()).expect("write part");
        }
        zip.finish().expect("finish xlsx");
    }

    fn text_cell(reference: &str, value: &str) -> String {
        format!(r#"<c r="{reference}" t="inlineStr"><is><t>{value}</t></is></c>"#)
    }

    fn sample() -> Dataset {
        Dataset::new(
            vec!["name".to_string(), "".to_string(), "code".to_string()],
            vec![
                vec!["Alice".to_string(), "x".to_string(), "001".to_string()],
                vec!["Bob".to_string()],
            ],
        )
    }

    #[test]
    fn value_reads_cells_and_pads_short_rows() {
        let data = sample();
        assert_eq!(data.value(0, 2).expect("cell"), "001");
        assert_eq!(data.value(1, 2).expect("short row"), "");
    }

    #[test]
    fn value_rejects_missing_column_and_row() {
        let data = sample();
        assert_eq!(
            data.value(0, 3),
            Err(DatasetError::ColumnOutOfRange { index: 3, width: 3 })
        );
        assert_eq!(
            data.value(5, 0),
            Err(DatasetError::RowOutOfRange { row: 5, len: 2 })
        );
    }

    #[test]
    fn column_labels_fall_back_to_number() {
        assert_eq!(sample().column_labels(), vec!["1: name", "2", "3: code"]);
    }

    #[test]
    fn load_csv_splits_header_and_rows() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("list.csv");
        fs::write(&path, "id,name\n1,Alice\n2,Bob,extra\n").expect("write csv");

        let data = load_dataset(&path).expect("csv must load");
        assert_eq!(data.headers, vec!["id", "name"]);
        assert_eq!(data.len(), 2);
        assert_eq!(data.column_count(), 3);
        assert_eq!(data.value(1, 2).expect("extra cell"), "extra");
    }

    #[test]
    fn load_rejects_unknown_extension() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("notes.txt");
        fs::write(&path, "a,b").expect("write");

        let err = load_dataset(&path).expect_err("txt is not a table");
        assert!(matches!(
            err.downcast_ref::<DatasetError>(),
            Some(DatasetError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn load_workbook_renders_dates_numbers_and_bools_like_text() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("list.xlsx");
        let sheet_data = format!(
            r#"<row r="1">{}{}{}{}</row><row r="2">{}<c r="B2" s="1"><v>45292</v></c><c r="C2"><v>7</v></c><c r="D2" t="b"><v>1</v></c></row>"#,
            text_cell("A1", "name"),
            text_cell("B1", "date"),
            text_cell("C1", "no"),
            text_cell("D1", "flag"),
            text_cell("A2", "Alice"),
        );
        write_xlsx(&path, &sheet_data);

        let data = load_dataset(&path).expect("xlsx must load");
        assert_eq!(data.headers, vec!["name", "date", "no", "flag"]);
        assert_eq!(data.len(), 1);
        assert_eq!(
            data.row(0).expect("row"),
            ["Alice", "2024-01-01 00:00:00", "7", "True"]
        );
    }

    #[test]
    fn date_cells_render_as_calendar_text() {
        let date = Data::DateTime(ExcelDateTime::new(
            45292.0,
            ExcelDateTimeType::DateTime,
            false,
        ));
        assert_eq!(cell_to_string(&date), "2024-01-01 00:00:00");

        let time = Data::DateTime(ExcelDateTime::new(0.5, ExcelDateTimeType::DateTime, false));
        assert_eq!(cell_to_string(&time), "12:00:00");

        let duration = Data::DateTime(ExcelDateTime::new(
            1.5,
            ExcelDateTimeType::TimeDelta,
            false,
        ));
        assert_eq!(cell_to_string(&duration), "36:00:00");

        assert_eq!(
            cell_to_string(&Data::DateTimeIso("2024-03-05T10:20:30".to_string())),
            "2024-03-05 10:20:30"
        );
        assert_eq!(
            cell_to_string(&Data::DateTimeIso("2024-03-05".to_string())),
            "2024-03-05 00:00:00"
        );
        assert_eq!(
            cell_to_string(&Data::DurationIso("PT1H".to_string())),
            "PT1H"
        );
    }

    #[test]
    fn bool_cells_use_capitalised_words() {
        assert_eq!(cell_to_string(&Data::Bool(true)), "True");
        assert_eq!(cell_to_string(&Data::Bool(false)), "False");
    }

    #[test]
    fn out_of_range_messages_count_from_one() {
        let data = sample();
        let row_err = data.value(5, 0).expect_err("row 5 is missing");
        assert_eq!(row_err.to_string(), "6行目のデータがありません (データ行数 2)");
        let col_err = data.value(0, 3).expect_err("column 3 is missing");
        assert_eq!(col_err.to_string(), "第4列は存在しません (列数 3)");
    }

    #[test]
    fn summary_carries_labels_and_row_count() {
        let summary = sample().summary();
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.labels, vec!["1: name", "2", "3: code"]);
        assert_eq!(summary.headers.len(), 3);

        let json = serde_json::to_value(&summary).expect("json");
        assert_eq!(json["rows"], 2);
        assert_eq!(json["labels"][0], "1: name");
        assert_eq!(json["headers"][1], "");
    }

    #[test]
    fn load_reports_broken_workbook() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("broken.xlsx");
        fs::write(&path, b"not a zip").expect("write");

        assert!(load_dataset(&path).is_err());
    }

    #[test]
    fn spreadsheet_detection_is_case_insensitive() {
        assert!(is_spreadsheet(Path::new("a/B.XLSX")));
        assert!(is_spreadsheet(Path::new("list.csv")));
        assert!(!is_spreadsheet(Path::new("photo.jpg")));
        assert!(!is_spreadsheet(Path::new("xlsx")));
    }

    #[test]
    fn integral_floats_render_without_fraction() {
        assert_eq!(cell_to_string(&Data::Float(42.0)), "42");
        assert_eq!(cell_to_string(&Data::Float(1.5)), "1.5");
        assert_eq!(cell_to_string(&Data::Empty), "");
        assert_eq!(cell_to_string(&Data::String("abc".to_string())), "abc");
    }
}
