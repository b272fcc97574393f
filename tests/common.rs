#![allow(dead_code)]
use assert_cmd::{Command, cargo_bin_cmd};
use std::env;
use std::fs;
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};
use std::path::PathBuf;

pub const SURVEYS: &str = "\
 Tech ,Submission Date,Date,Drop Length,Prep Hours
Alice,2024-01-04 08:15,,approx. 120 ft,1.5 hrs
Alice,\"March 3rd, 2024 (survey)\",,,
Bob,01/19/2024,,90,2
Bob,,2023-12-01,,
,2024-02-10,,,0.5
";

pub fn dashboard() -> Command {
    cargo_bin_cmd!("ftth-survey-dashboard")
}

/// Scratch directory under the system temp dir, emptied first.
pub fn scratch_dir(name: &str) -> PathBuf {
    let mut path = env::temp_dir();
    path.push(format!("ftth_dashboard_{name}"));
    fs::remove_dir_all(&path).ok();
    fs::create_dir_all(&path).expect("create scratch dir");
    path
}

/// Write `content` as a CSV upload inside a fresh scratch directory.
pub fn write_upload(name: &str, content: &str) -> PathBuf {
    let path = scratch_dir(name).join(format!("{name}.csv"));
    fs::write(&path, content).expect("write fixture csv");
    path
}

/// Write the survey sheet as an `.xlsm` workbook with real date cells.
pub fn write_workbook_upload(name: &str) -> PathBuf {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let date = Format::new().set_num_format("mm/dd/yyyy");

    for (col, header) in ["Tech", "Submission Date", "Drop Length"].into_iter().enumerate() {
        sheet.write(0, col as u16, header).expect("write header");
    }
    let visits = [("Carol", 2024, 4, 2), ("Carol", 2024, 5, 9), ("Dev", 2024, 5, 10)];
    for (idx, (tech, year, month, day)) in visits.into_iter().enumerate() {
        let row = idx as u32 + 1;
        let when = ExcelDateTime::from_ymd(year, month, day).expect("valid date");
        sheet.write(row, 0, tech).expect("write tech");
        sheet.write_datetime_with_format(row, 1, &when, &date).expect("write date");
        sheet.write(row, 2, 75.0).expect("write drop");
    }

    let path = scratch_dir(name).join(format!("{name}.xlsm"));
    workbook.save(&path).expect("write fixture workbook");
    path
}
