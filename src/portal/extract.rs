//! Attendance table extraction.
//!
//! The portal renders attendance as a wide table: one column per subject
//! code, with "Overall Class" / "Overall Present" / "Overall Absent" /
//! "Overall (%)" summary rows underneath the per-day grid. Subject names
//! appear separately in `colspan` cells as `CODE-Name` lines.

use html_scraper::{Html, Selector};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

/// A cell containing exactly a subject code, e.g. `ITITC601` or `DNCS0603`.
static SUBJECT_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2,5}\d{3,4}$").unwrap());

/// A `CODE-Name` line, e.g. `ITITC601 - Computer Networks`.
static SUBJECT_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]{2,5}\d{3,4})\s*-\s*(.+)$").unwrap());

static BR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// One subject's attendance for the selected year/semester.
///
/// Field names match the portal's historical JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceRecord {
    #[serde(rename = "Subject Code")]
    pub subject_code: String,
    #[serde(rename = "Subject Name")]
    pub subject_name: String,
    #[serde(rename = "Classes Present")]
    pub present: u32,
    #[serde(rename = "Classes Absent")]
    pub absent: u32,
    #[serde(rename = "Total Classes")]
    pub total: u32,
    #[serde(rename = "Attendance %")]
    pub percentage: f64,
}

/// Parse attendance records out of a frame's HTML.
///
/// Unrecognized tables yield nothing; a malformed column skips only that
/// subject. Never fails — an empty result means no attendance data here.
pub fn extract_attendance(html: &str) -> Vec<AttendanceRecord> {
    let document = Html::parse_document(html);
    let table_sel = Selector::parse("table").unwrap();
    let tr_sel = Selector::parse("tr").unwrap();
    let cell_sel = Selector::parse("td, th").unwrap();

    let subject_names = collect_subject_names(&document);
    let mut records = Vec::new();

    for table in document.select(&table_sel) {
        let rows: Vec<Vec<String>> = table
            .select(&tr_sel)
            .map(|row| {
                row.select(&cell_sel)
                    .map(|cell| {
                        cell.text()
                            .collect::<String>()
                            .split_whitespace()
                            .collect::<Vec<_>>()
                            .join(" ")
                    })
                    .collect()
            })
            .collect();

        // Header row: the first row containing bare subject codes
        let Some((header_idx, subject_codes)) = find_subject_codes(&rows) else {
            continue;
        };
        debug!(row = header_idx, codes = subject_codes.len(), "Found subject code header");

        let summary = find_summary_rows(&rows[header_idx + 1..]);
        let (Some(class_row), Some(absent_row), Some(present_row)) =
            (summary.class, summary.absent, summary.present)
        else {
            continue;
        };

        for (idx, code) in subject_codes.iter().enumerate() {
            // Column 0 is the "Days" label, so subject i sits at column i+1
            let col = idx + 1;
            let (Some(total), Some(absent), Some(present)) = (
                parse_count(class_row, col),
                parse_count(absent_row, col),
                parse_count(present_row, col),
            ) else {
                debug!(code = %code, "Skipping subject with unparseable counts");
                continue;
            };

            let percentage = summary
                .percent
                .and_then(|row| row.get(col))
                .and_then(|cell| cell.replace('%', "").trim().parse::<f64>().ok())
                .unwrap_or_else(|| derived_percentage(present, total));

            let subject_name = subject_names
                .get(code.as_str())
                .cloned()
                .unwrap_or_else(|| code.clone());

            records.push(AttendanceRecord {
                subject_code: code.clone(),
                subject_name,
                present,
                absent,
                total,
                percentage,
            });
        }
    }

    records
}

/// Map subject codes to names from `CODE-Name` lines inside `colspan` cells.
fn collect_subject_names(document: &Html) -> HashMap<String, String> {
    let colspan_sel = Selector::parse("td[colspan]").unwrap();
    let mut names = HashMap::new();

    for cell in document.select(&colspan_sel) {
        let inner = cell.inner_html();
        for line in BR_RE.split(&inner) {
            let clean = TAG_RE.replace_all(line, "");
            let clean = clean.trim();
            if let Some(caps) = SUBJECT_NAME_RE.captures(clean) {
                names.insert(caps[1].to_string(), caps[2].trim().to_string());
            }
        }
    }

    names
}

/// Locate the header row and pull the subject codes out of it.
///
/// The first column is a "Days" label; only cells after it are candidates,
/// and cells that don't look like subject codes are ignored.
fn find_subject_codes(rows: &[Vec<String>]) -> Option<(usize, Vec<String>)> {
    for (idx, cells) in rows.iter().enumerate() {
        if !cells.iter().any(|c| SUBJECT_CODE_RE.is_match(c)) {
            continue;
        }
        let codes: Vec<String> = cells
            .iter()
            .skip(1)
            .filter(|c| SUBJECT_CODE_RE.is_match(c))
            .cloned()
            .collect();
        return Some((idx, codes));
    }
    None
}

struct SummaryRows<'a> {
    class: Option<&'a Vec<String>>,
    absent: Option<&'a Vec<String>>,
    present: Option<&'a Vec<String>>,
    percent: Option<&'a Vec<String>>,
}

/// Identify the "Overall ..." summary rows below the header.
fn find_summary_rows(rows: &[Vec<String>]) -> SummaryRows<'_> {
    let mut summary = SummaryRows {
        class: None,
        absent: None,
        present: None,
        percent: None,
    };

    for cells in rows {
        let Some(first) = cells.first() else {
            continue;
        };
        let first = first.to_lowercase();
        if !first.contains("overall") {
            continue;
        }
        if first.contains("class") {
            summary.class = Some(cells);
        } else if first.contains("absent") {
            summary.absent = Some(cells);
        } else if first.contains("present") {
            summary.present = Some(cells);
        } else if first.contains('%') {
            summary.percent = Some(cells);
        }
    }

    summary
}

fn parse_count(row: &[String], col: usize) -> Option<u32> {
    row.get(col).and_then(|cell| cell.parse::<u32>().ok())
}

/// present/total as a percentage, rounded to two decimals. Zero when the
/// subject has no classes yet.
fn derived_percentage(present: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (present as f64 / total as f64 * 100.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal attendance table in the portal's layout.
    fn sample_table(percent_row: &str) -> String {
        format!(
            r#"<html><body>
            <table>
              <tr><td colspan="4">ITITC601 - Computer Networks<br>ITITC602 - Operating Systems</td></tr>
              <tr><td>Days</td><td>ITITC601</td><td>ITITC602</td></tr>
              <tr><td>01 Aug</td><td>P</td><td>A</td></tr>
              <tr><td>Overall Class</td><td>40</td><td>30</td></tr>
              <tr><td>Overall Present</td><td>36</td><td>20</td></tr>
              <tr><td>Overall Absent</td><td>4</td><td>10</td></tr>
              {percent_row}
            </table>
            </body></html>"#
        )
    }

    #[test]
    fn test_extracts_expected_records() {
        let html = sample_table(
            "<tr><td>Overall (%)</td><td>90.00%</td><td>66.67%</td></tr>",
        );
        let records = extract_attendance(&html);
        assert_eq!(
            records,
            vec![
                AttendanceRecord {
                    subject_code: "ITITC601".to_string(),
                    subject_name: "Computer Networks".to_string(),
                    present: 36,
                    absent: 4,
                    total: 40,
                    percentage: 90.0,
                },
                AttendanceRecord {
                    subject_code: "ITITC602".to_string(),
                    subject_name: "Operating Systems".to_string(),
                    present: 20,
                    absent: 10,
                    total: 30,
                    percentage: 66.67,
                },
            ]
        );
    }

    #[test]
    fn test_portal_percentage_preferred_over_derived() {
        // Portal reports 89.5 even though 36/40 derives to 90.0
        let html = sample_table("<tr><td>Overall (%)</td><td>89.5%</td><td>66.67%</td></tr>");
        let records = extract_attendance(&html);
        assert_eq!(records[0].percentage, 89.5);
    }

    #[test]
    fn test_percentage_derived_when_percent_row_missing() {
        let html = sample_table("");
        let records = extract_attendance(&html);
        assert_eq!(records[0].percentage, 90.0);
        assert_eq!(records[1].percentage, 66.67);
    }

    #[test]
    fn test_percentage_derived_when_portal_value_garbled() {
        let html = sample_table("<tr><td>Overall (%)</td><td>n/a</td><td>--</td></tr>");
        let records = extract_attendance(&html);
        assert_eq!(records[0].percentage, 90.0);
        assert_eq!(records[1].percentage, 66.67);
    }

    #[test]
    fn test_zero_total_yields_zero_percentage() {
        let html = r#"<table>
          <tr><td>Days</td><td>ABCDE1234</td></tr>
          <tr><td>Overall Class</td><td>0</td></tr>
          <tr><td>Overall Present</td><td>0</td></tr>
          <tr><td>Overall Absent</td><td>0</td></tr>
        </table>"#;
        let records = extract_attendance(html);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].percentage, 0.0);
    }

    #[test]
    fn test_ignores_cells_that_are_not_subject_codes() {
        // "TOTAL" and lowercase/short tokens must not be picked up as codes
        let html = r#"<table>
          <tr><td>Days</td><td>ITITC601</td><td>TOTAL</td><td>x601</td><td>A12</td></tr>
          <tr><td>Overall Class</td><td>10</td><td>10</td><td>10</td><td>10</td></tr>
          <tr><td>Overall Present</td><td>8</td><td>8</td><td>8</td><td>8</td></tr>
          <tr><td>Overall Absent</td><td>2</td><td>2</td><td>2</td><td>2</td></tr>
        </table>"#;
        let records = extract_attendance(html);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].subject_code, "ITITC601");
    }

    #[test]
    fn test_name_falls_back_to_code() {
        let html = r#"<table>
          <tr><td>Days</td><td>DNCS0603</td></tr>
          <tr><td>Overall Class</td><td>12</td></tr>
          <tr><td>Overall Present</td><td>9</td></tr>
          <tr><td>Overall Absent</td><td>3</td></tr>
        </table>"#;
        let records = extract_attendance(html);
        assert_eq!(records[0].subject_name, "DNCS0603");
        assert_eq!(records[0].percentage, 75.0);
    }

    #[test]
    fn test_subject_name_map_parses_br_separated_lines() {
        let html = sample_table("");
        let document = Html::parse_document(&html);
        let names = collect_subject_names(&document);
        assert_eq!(names.get("ITITC601").unwrap(), "Computer Networks");
        assert_eq!(names.get("ITITC602").unwrap(), "Operating Systems");
    }

    #[test]
    fn test_unparseable_column_skips_only_that_subject() {
        let html = r#"<table>
          <tr><td>Days</td><td>ITITC601</td><td>ITITC602</td></tr>
          <tr><td>Overall Class</td><td>40</td><td>?</td></tr>
          <tr><td>Overall Present</td><td>36</td><td>20</td></tr>
          <tr><td>Overall Absent</td><td>4</td><td>10</td></tr>
        </table>"#;
        let records = extract_attendance(html);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].subject_code, "ITITC601");
    }

    #[test]
    fn test_short_summary_row_skips_subjects_without_counts() {
        // The second subject's column is absent from "Overall Class"
        // entirely; that subject is dropped rather than reported with
        // made-up zero counts.
        let html = r#"<table>
          <tr><td>Days</td><td>ITITC601</td><td>ITITC602</td></tr>
          <tr><td>Overall Class</td><td>40</td></tr>
          <tr><td>Overall Present</td><td>36</td><td>20</td></tr>
          <tr><td>Overall Absent</td><td>4</td><td>10</td></tr>
        </table>"#;
        let records = extract_attendance(html);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].subject_code, "ITITC601");
        assert_eq!(records[0].total, 40);
    }

    #[test]
    fn test_missing_summary_rows_yield_nothing() {
        let html = r#"<table>
          <tr><td>Days</td><td>ITITC601</td></tr>
          <tr><td>01 Aug</td><td>P</td></tr>
        </table>"#;
        assert!(extract_attendance(html).is_empty());
    }

    #[test]
    fn test_no_tables_yield_nothing() {
        assert!(extract_attendance("<html><body><p>hello</p></body></html>").is_empty());
    }

    #[test]
    fn test_serializes_with_portal_field_names() {
        let record = AttendanceRecord {
            subject_code: "ITITC601".to_string(),
            subject_name: "Computer Networks".to_string(),
            present: 36,
            absent: 4,
            total: 40,
            percentage: 90.0,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["Subject Code"], "ITITC601");
        assert_eq!(json["Subject Name"], "Computer Networks");
        assert_eq!(json["Classes Present"], 36);
        assert_eq!(json["Classes Absent"], 4);
        assert_eq!(json["Total Classes"], 40);
        assert_eq!(json["Attendance %"], 90.0);
    }

    #[test]
    fn test_derived_percentage_rounds_to_two_decimals() {
        assert_eq!(derived_percentage(1, 3), 33.33);
        assert_eq!(derived_percentage(2, 3), 66.67);
        assert_eq!(derived_percentage(0, 0), 0.0);
        assert_eq!(derived_percentage(5, 5), 100.0);
    }
}
