use std::collections::BTreeMap;
use std::fmt;
use std::io::Cursor;
use std::sync::LazyLock;

use calamine::{Data, Reader};
use chrono::NaiveDateTime;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{DashboardError, DashboardResult};
use crate::fuzzy;
use crate::models::{FacetDomain, SurveyRecord, Technician};

static INTEGER_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("valid integer pattern"));

static DECIMAL_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d*\.?\d+").expect("valid decimal pattern"));

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Which column supplies every record's timestamp for one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "column", rename_all = "snake_case")]
pub enum DateSource {
    UseSubmissionDate(usize),
    UseDate(usize),
    NoDateSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberPattern {
    Integer,
    Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// xlsx/xlsm (zip container) or legacy xls; the first worksheet is read.
    Workbook,
    Csv,
}

impl InputFormat {
    /// Workbooks are recognised by their container signature, anything else is CSV.
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC) {
            InputFormat::Workbook
        } else {
            InputFormat::Csv
        }
    }
}

/// One cell of the uploaded table. Only workbooks produce typed cells.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    DateTime(NaiveDateTime),
}

impl Cell {
    fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(text) => text.trim().is_empty(),
            Cell::Number(_) | Cell::DateTime(_) => false,
        }
    }

    /// Date cells are taken as they are; text goes through the fuzzy parser.
    /// A bare number is not read as a date.
    fn timestamp(&self, day_first: bool) -> Option<NaiveDateTime> {
        match self {
            Cell::DateTime(dt) => Some(*dt),
            Cell::Text(text) => fuzzy::parse_timestamp(text, day_first),
            Cell::Empty | Cell::Number(_) => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(text) => f.write_str(text),
            Cell::Number(n) => write!(f, "{n}"),
            Cell::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Bool(b) => Cell::Text(b.to_string()),
            Data::DateTime(dt) => dt
                .as_datetime()
                .map_or_else(|| Cell::Number(dt.as_f64()), Cell::DateTime),
            Data::Error(e) => Cell::Text(e.to_string()),
        }
    }
}

/// Everything the display layer needs from one upload.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub records: Vec<SurveyRecord>,
    pub facets: FacetDomain,
    pub date_source: DateSource,
    pub rows_read: usize,
    pub dropped_rows: usize,
}

/// Header row plus data rows, whatever the upload format was.
#[derive(Debug)]
struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

fn header_text(cell: &str) -> String {
    cell.trim_start_matches('\u{feff}').trim().to_string()
}

fn read_csv(bytes: &[u8]) -> DashboardResult<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);

    let headers = reader.headers()?.iter().map(header_text).collect();
    let mut rows: Vec<Vec<Cell>> = Vec::new();
    for row in reader.records() {
        rows.push(row?.iter().map(|c| Cell::Text(c.to_string())).collect());
    }
    Ok(Table { headers, rows })
}

fn read_workbook(bytes: &[u8]) -> DashboardResult<Table> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let sheet = workbook
        .worksheet_range_at(0)
        .ok_or(DashboardError::NoWorksheet)??;

    let mut rows = sheet.rows();
    let headers = rows
        .next()
        .ok_or(DashboardError::NoHeader)?
        .iter()
        .map(|c| header_text(&Cell::from(c).to_string()))
        .collect();
    let rows = rows.map(|row| row.iter().map(Cell::from).collect()).collect();
    Ok(Table { headers, rows })
}

/// Pick the date column once for the whole table.
///
/// `Submission Date` wins when any of its cells holds something; otherwise
/// `Date` is used if the column exists at all.
pub fn resolve_date_source(
    submission_date: Option<usize>,
    date: Option<usize>,
    rows: &[Vec<Cell>],
) -> DateSource {
    if let Some(column) = submission_date {
        let populated = rows
            .iter()
            .any(|row| row.get(column).is_some_and(|cell| !cell.is_blank()));
        if populated {
            return DateSource::UseSubmissionDate(column);
        }
    }

    match date {
        Some(column) => DateSource::UseDate(column),
        None => DateSource::NoDateSource,
    }
}

/// First number appearing anywhere in a free-text cell.
pub fn extract_number(cell: &str, pattern: NumberPattern) -> Option<f64> {
    let re = match pattern {
        NumberPattern::Integer => &*INTEGER_RUN,
        NumberPattern::Decimal => &*DECIMAL_RUN,
    };
    re.find(cell)?.as_str().parse().ok()
}

/// Parse an upload, detecting whether it is a workbook or CSV.
pub fn ingest(bytes: &[u8], config: &Config) -> DashboardResult<IngestReport> {
    ingest_as(bytes, InputFormat::detect(bytes), config)
}

/// Parse an uploaded table into the dated working set.
///
/// Fails as a whole on unreadable input or a missing required column;
/// rows without a usable date are dropped and counted.
pub fn ingest_as(
    bytes: &[u8],
    format: InputFormat,
    config: &Config,
) -> DashboardResult<IngestReport> {
    let columns = &config.columns;
    let Table { headers, rows } = match format {
        InputFormat::Workbook => read_workbook(bytes)?,
        InputFormat::Csv => read_csv(bytes)?,
    };
    if headers.iter().all(String::is_empty) {
        return Err(DashboardError::NoHeader);
    }
    debug!(?format, columns = headers.len(), "read upload table");

    let find = |name: &str| headers.iter().position(|h| h == name);
    let tech_column = find(columns.tech.as_str())
        .ok_or_else(|| DashboardError::MissingColumn(columns.tech.clone()))?;
    let submission_column = find(columns.submission_date.as_str());
    let date_column = find(columns.date.as_str());
    if submission_column.is_none() && date_column.is_none() {
        return Err(DashboardError::MissingColumn(format!(
            "{} or {}",
            columns.submission_date, columns.date
        )));
    }
    let drop_column = find(columns.drop_length.as_str());
    let hours_column = find(columns.prep_hours.as_str());

    let date_source = resolve_date_source(submission_column, date_column, &rows);
    info!(rows = rows.len(), ?date_source, "resolved date source");

    let source_column = match date_source {
        DateSource::UseSubmissionDate(column) | DateSource::UseDate(column) => Some(column),
        DateSource::NoDateSource => None,
    };

    let mut records = Vec::with_capacity(rows.len());
    let mut dropped_rows = 0usize;

    for (idx, row) in rows.iter().enumerate() {
        let cell = |column: Option<usize>| {
            column
                .and_then(|c| row.get(c))
                .map(ToString::to_string)
                .unwrap_or_default()
        };

        let Some(timestamp) = source_column
            .and_then(|c| row.get(c))
            .and_then(|c| c.timestamp(config.day_first))
        else {
            debug!(row = idx + 1, value = %cell(source_column), "no usable date, dropping row");
            dropped_rows += 1;
            continue;
        };

        let mut fields = BTreeMap::new();
        for (name, value) in headers.iter().zip(row.iter()) {
            fields.entry(name.clone()).or_insert_with(|| value.to_string());
        }

        records.push(SurveyRecord::new(
            idx + 1,
            Technician::from_cell(&cell(Some(tech_column))),
            timestamp,
            extract_number(&cell(drop_column), NumberPattern::Integer),
            extract_number(&cell(hours_column), NumberPattern::Decimal),
            fields,
        ));
    }

    info!(kept = records.len(), dropped = dropped_rows, "ingested survey records");

    let facets = FacetDomain::from_records(&records);
    Ok(IngestReport {
        records,
        facets,
        date_source,
        rows_read: rows.len(),
        dropped_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate};
    use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

    fn run(csv: &str) -> DashboardResult<IngestReport> {
        ingest(csv.as_bytes(), &Config::default())
    }

    fn survey_workbook() -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        let stamp = Format::new().set_num_format("yyyy-mm-dd hh:mm");

        for (col, header) in [" Tech ", "Submission Date", "Drop Length", "Prep Hours"]
            .into_iter()
            .enumerate()
        {
            sheet.write(0, col as u16, header).unwrap();
        }

        let visit = ExcelDateTime::from_ymd(2024, 3, 3).unwrap().and_hms(8, 15, 0).unwrap();
        sheet.write(1, 0, "Alice").unwrap();
        sheet.write_datetime_with_format(1, 1, &visit, &stamp).unwrap();
        sheet.write(1, 2, 120.0).unwrap();
        sheet.write(1, 3, "1.5 hrs").unwrap();

        sheet.write(2, 0, "Bob").unwrap();
        sheet.write(2, 1, "March 4th, 2024 (survey)").unwrap();

        sheet.write(3, 0, "Bob").unwrap();
        sheet.write(3, 1, "pending").unwrap();

        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn submission_date_preferred_when_populated() {
        let report = run(
            " Tech ,Submission Date ,Date\n\
             A,2024-01-10,2023-05-05\n\
             B,,2023-05-06\n",
        )
        .unwrap();

        assert_eq!(report.date_source, DateSource::UseSubmissionDate(1));
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.dropped_rows, 1);
        assert_eq!(report.records[0].day, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
    }

    #[test]
    fn falls_back_to_date_column() {
        let report = run("Tech,Submission Date,Date\nA,,2023-05-05\nB, ,May 6 2023\n").unwrap();
        assert_eq!(report.date_source, DateSource::UseDate(2));
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[1].day, NaiveDate::from_ymd_opt(2023, 5, 6).unwrap());
    }

    #[test]
    fn empty_submission_date_without_date_column_drops_rows() {
        let report = run("Tech,Submission Date\nA,\nB,\n").unwrap();
        assert_eq!(report.date_source, DateSource::NoDateSource);
        assert!(report.records.is_empty());
        assert_eq!(report.rows_read, 2);
        assert_eq!(report.dropped_rows, 2);
    }

    #[test]
    fn dropped_plus_kept_equals_rows_read() {
        let report = run(
            "Tech,Date\n\
             A,2024-01-01\n\
             A,garbage\n\
             B,March 3rd, 2024 (survey)\n\
             C,\n",
        );
        // the unquoted comma makes the third row ragged
        assert!(matches!(report, Err(DashboardError::Malformed(_))));

        let report = run(
            "Tech,Date\n\
             A,2024-01-01\n\
             A,garbage\n\
             B,\"March 3rd, 2024 (survey)\"\n\
             C,\n",
        )
        .unwrap();
        assert_eq!(report.records.len() + report.dropped_rows, report.rows_read);
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[1].day, NaiveDate::from_ymd_opt(2024, 3, 3).unwrap());
        assert_eq!(report.records[1].row, 3);
    }

    #[test]
    fn buckets_derive_from_timestamp() {
        let report = run("Tech,Date\nA,12/31/2023 23:59\nB,2024-02-29\n").unwrap();
        for record in &report.records {
            assert_eq!(record.day, record.timestamp.date());
            assert_eq!(record.year, record.timestamp.year());
            assert_eq!(
                record.month.to_string(),
                record.timestamp.format("%Y-%m").to_string()
            );
        }
    }

    #[test]
    fn two_digit_year_rows_bucket_in_this_century() {
        let report = run("Tech,Date\nA,3/9/24\nB,03-Mar-24\n").unwrap();
        assert_eq!(report.records.len(), 2);
        for record in &report.records {
            assert_eq!(record.month.to_string(), "2024-03");
            assert_eq!(record.year, 2024);
        }
        assert_eq!(report.records[0].day, NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
    }

    #[test]
    fn workbook_first_sheet_with_typed_dates() {
        let bytes = survey_workbook();
        assert_eq!(InputFormat::detect(&bytes), InputFormat::Workbook);

        let report = ingest(&bytes, &Config::default()).unwrap();
        assert_eq!(report.date_source, DateSource::UseSubmissionDate(1));
        assert_eq!(report.rows_read, 3);
        assert_eq!(report.dropped_rows, 1);

        let alice = &report.records[0];
        assert_eq!(alice.technician, Technician::Named("Alice".into()));
        assert_eq!(
            alice.timestamp,
            NaiveDate::from_ymd_opt(2024, 3, 3).unwrap().and_hms_opt(8, 15, 0).unwrap()
        );
        assert_eq!(alice.drop_length, Some(120.0));
        assert_eq!(alice.prep_hours, Some(1.5));
        assert_eq!(alice.fields["Drop Length"], "120");

        assert_eq!(report.records[1].day, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(report.records[1].drop_length, None);
    }

    #[test]
    fn csv_is_the_fallback_format() {
        assert_eq!(InputFormat::detect(b"Tech,Date\n"), InputFormat::Csv);
        assert_eq!(InputFormat::detect(b""), InputFormat::Csv);
    }

    #[test]
    fn missing_tech_column_is_fatal() {
        let err = run("Technician,Date\nA,2024-01-01\n").unwrap_err();
        assert!(matches!(err, DashboardError::MissingColumn(ref c) if c == "Tech"));
    }

    #[test]
    fn missing_both_date_columns_is_fatal() {
        let err = run("Tech,When\nA,2024-01-01\n").unwrap_err();
        assert!(matches!(err, DashboardError::MissingColumn(_)));
    }

    #[test]
    fn empty_and_binary_uploads_are_malformed() {
        assert!(matches!(run(""), Err(DashboardError::NoHeader)));
        let bytes = [0x50u8, 0x4b, 0x03, 0x04, 0xff, 0xfe, 0x00, b'\n', 0xc3, 0x28];
        assert!(matches!(
            ingest(&bytes, &Config::default()),
            Err(DashboardError::Workbook(_))
        ));
        let bytes = [b'T', b'e', b'c', b'h', b'\n', 0xc3, 0x28, b'\n'];
        assert!(ingest(&bytes, &Config::default()).is_err());
    }

    #[test]
    fn blank_tech_becomes_unknown() {
        let report = run("Tech,Date\n,2024-01-01\n  Bo ,2024-01-02\n").unwrap();
        assert_eq!(report.records[0].technician, Technician::Unknown);
        assert_eq!(report.records[1].technician, Technician::Named("Bo".into()));
    }

    #[test]
    fn measurements_extracted_from_free_text() {
        let report = run(
            "Tech,Date,Drop Length,Prep Hours\n\
             A,2024-01-01,approx. 125.5 ft,approx. 125.5 ft\n\
             A,2024-01-02,no measurement taken,\n",
        )
        .unwrap();

        assert_eq!(report.records[0].drop_length, Some(125.0));
        assert_eq!(report.records[0].prep_hours, Some(125.5));
        assert_eq!(report.records[1].drop_length, None);
        assert_eq!(report.records[1].prep_hours, None);
        assert_eq!(report.records[0].fields["Drop Length"], "approx. 125.5 ft");
    }

    #[test]
    fn number_patterns() {
        assert_eq!(extract_number("approx. 125.5 ft", NumberPattern::Decimal), Some(125.5));
        assert_eq!(extract_number("approx. 125.5 ft", NumberPattern::Integer), Some(125.0));
        assert_eq!(extract_number("no measurement taken", NumberPattern::Decimal), None);
        assert_eq!(extract_number("2 hrs", NumberPattern::Decimal), Some(2.0));
        assert_eq!(extract_number(".5 hrs", NumberPattern::Decimal), Some(0.5));
        assert_eq!(extract_number("about 1.25", NumberPattern::Decimal), Some(1.25));
    }
}
