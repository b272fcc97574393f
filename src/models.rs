use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};

use crate::error::DashboardError;

/// Label used for records whose `Tech` cell is empty.
///
/// A cell holding this exact text is read as `Unknown` too, so the label
/// always names one group in counts, facets and filters.
pub const UNKNOWN_TECHNICIAN: &str = "(unknown)";

/// Who performed the survey. `Unknown` sorts after every named technician.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Technician {
    Named(String),
    Unknown,
}

impl Technician {
    /// Read a `Tech` cell or a `--tech` label.
    pub fn from_cell(cell: &str) -> Self {
        match cell.trim() {
            "" | UNKNOWN_TECHNICIAN => Technician::Unknown,
            name => Technician::Named(name.to_string()),
        }
    }
}

impl fmt::Display for Technician {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Technician::Named(name) => f.pad(name),
            Technician::Unknown => f.pad(UNKNOWN_TECHNICIAN),
        }
    }
}

impl Serialize for Technician {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Year-month bucket, ordered chronologically and shown as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format!("{:04}-{:02}", self.year, self.month))
    }
}

impl FromStr for Month {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DashboardError::InvalidFilter(format!("month must be YYYY-MM, got {s:?}"));
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Month::new(year, month).ok_or_else(invalid)
    }
}

impl Serialize for Month {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One survey row that made it into the working set.
///
/// Only constructed through [`SurveyRecord::new`], so the time buckets always
/// agree with `timestamp`.
#[derive(Debug, Clone, Serialize)]
pub struct SurveyRecord {
    /// 1-based position of the data row in the uploaded file.
    pub row: usize,
    pub technician: Technician,
    pub timestamp: NaiveDateTime,
    pub day: NaiveDate,
    pub month: Month,
    pub year: i32,
    pub drop_length: Option<f64>,
    pub prep_hours: Option<f64>,
    pub fields: BTreeMap<String, String>,
}

impl SurveyRecord {
    pub fn new(
        row: usize,
        technician: Technician,
        timestamp: NaiveDateTime,
        drop_length: Option<f64>,
        prep_hours: Option<f64>,
        fields: BTreeMap<String, String>,
    ) -> Self {
        let day = timestamp.date();
        Self {
            row,
            technician,
            timestamp,
            day,
            month: Month::of(day),
            year: day.year(),
            drop_length,
            prep_hours,
            fields,
        }
    }
}

/// Distinct values observed per facet, in presentation order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FacetDomain {
    pub technicians: BTreeSet<Technician>,
    pub months: BTreeSet<Month>,
    pub days: BTreeSet<NaiveDate>,
    pub years: BTreeSet<i32>,
    pub drop_length_span: Option<(f64, f64)>,
    pub prep_hours_span: Option<(f64, f64)>,
}

impl FacetDomain {
    pub fn from_records(records: &[SurveyRecord]) -> Self {
        let mut domain = FacetDomain::default();

        for record in records {
            domain.technicians.insert(record.technician.clone());
            domain.months.insert(record.month);
            domain.days.insert(record.day);
            domain.years.insert(record.year);
            widen(&mut domain.drop_length_span, record.drop_length);
            widen(&mut domain.prep_hours_span, record.prep_hours);
        }

        domain
    }

    pub fn date_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((*self.days.first()?, *self.days.last()?))
    }
}

fn widen(span: &mut Option<(f64, f64)>, value: Option<f64>) {
    let Some(value) = value else {
        return;
    };
    *span = Some(match *span {
        Some((lo, hi)) => (lo.min(value), hi.max(value)),
        None => (value, value),
    });
}
