//! End-to-end extraction against a fixture mirroring the portal's real
//! attendance page layout: banner tables, per-day grid, summary rows, and
//! the PDF button that must never affect parsing.

use ims_attendance::portal::extract::extract_attendance;

const ATTENDANCE_PAGE: &str = include_str!("fixtures/attendance_page.html");

#[test]
fn test_extracts_all_subjects_from_portal_page() {
    let records = extract_attendance(ATTENDANCE_PAGE);

    let codes: Vec<&str> = records.iter().map(|r| r.subject_code.as_str()).collect();
    assert_eq!(
        codes,
        vec!["ITITC601", "ITITC602", "ITITC603", "DNCS0603", "HUL0601"]
    );
}

#[test]
fn test_subject_names_resolved_from_legend() {
    let records = extract_attendance(ATTENDANCE_PAGE);

    let networks = records
        .iter()
        .find(|r| r.subject_code == "ITITC601")
        .unwrap();
    assert_eq!(networks.subject_name, "Computer Networks");

    let security = records
        .iter()
        .find(|r| r.subject_code == "DNCS0603")
        .unwrap();
    assert_eq!(security.subject_name, "Network Security");
}

#[test]
fn test_counts_and_portal_percentages() {
    let records = extract_attendance(ATTENDANCE_PAGE);

    let networks = records
        .iter()
        .find(|r| r.subject_code == "ITITC601")
        .unwrap();
    assert_eq!(networks.present, 38);
    assert_eq!(networks.absent, 4);
    assert_eq!(networks.total, 42);
    assert_eq!(networks.percentage, 90.48);

    let os = records
        .iter()
        .find(|r| r.subject_code == "ITITC602")
        .unwrap();
    assert_eq!(os.present, 29);
    assert_eq!(os.percentage, 76.32);
}

#[test]
fn test_blank_percentage_cell_falls_back_to_derived() {
    let records = extract_attendance(ATTENDANCE_PAGE);

    // The HUL0601 percent cell is blank in the fixture; 12/18 = 66.67
    let economics = records
        .iter()
        .find(|r| r.subject_code == "HUL0601")
        .unwrap();
    assert_eq!(economics.present, 12);
    assert_eq!(economics.total, 18);
    assert_eq!(economics.percentage, 66.67);
}

#[test]
fn test_day_grid_rows_do_not_produce_records() {
    let records = extract_attendance(ATTENDANCE_PAGE);
    assert_eq!(records.len(), 5);
}
