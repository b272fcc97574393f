use std::collections::BTreeSet;
use std::fmt::Display;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{DashboardError, DashboardResult};
use crate::models::{FacetDomain, Month, SurveyRecord, Technician};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NumericRange {
    pub min: f64,
    pub max: f64,
    /// Whether records without a value for this measurement pass.
    pub include_missing: bool,
}

impl NumericRange {
    pub fn admits(&self, value: Option<f64>) -> bool {
        match value {
            Some(v) => self.min <= v && v <= self.max,
            None => self.include_missing,
        }
    }
}

/// The chosen values for every facet.
///
/// Set facets are OR within, all facets are AND together. An empty set
/// matches nothing. `None` on a range facet means no bound.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterSelection {
    pub technicians: BTreeSet<Technician>,
    pub months: BTreeSet<Month>,
    pub days: BTreeSet<NaiveDate>,
    pub years: BTreeSet<i32>,
    pub date_range: Option<DateRange>,
    pub drop_length: Option<NumericRange>,
    pub prep_hours: Option<NumericRange>,
}

impl FilterSelection {
    /// Every observed value selected: the starting, un-narrowed state.
    pub fn full(domain: &FacetDomain) -> Self {
        let everything = |span: Option<(f64, f64)>| {
            span.map(|(min, max)| NumericRange {
                min,
                max,
                include_missing: true,
            })
        };

        Self {
            technicians: domain.technicians.clone(),
            months: domain.months.clone(),
            days: domain.days.clone(),
            years: domain.years.clone(),
            date_range: domain
                .date_span()
                .map(|(start, end)| DateRange { start, end }),
            drop_length: everything(domain.drop_length_span),
            prep_hours: everything(domain.prep_hours_span),
        }
    }

    pub fn matches(&self, record: &SurveyRecord) -> bool {
        self.technicians.contains(&record.technician)
            && self.months.contains(&record.month)
            && self.days.contains(&record.day)
            && self.years.contains(&record.year)
            && self.date_range.is_none_or(|r| r.contains(record.day))
            && self.drop_length.is_none_or(|r| r.admits(record.drop_length))
            && self.prep_hours.is_none_or(|r| r.admits(record.prep_hours))
    }
}

/// Records passing `selection`, in their original order.
pub fn apply<'a>(records: &'a [SurveyRecord], selection: &FilterSelection) -> Vec<&'a SurveyRecord> {
    let filtered: Vec<&SurveyRecord> = records.iter().filter(|r| selection.matches(r)).collect();
    debug!(total = records.len(), kept = filtered.len(), "applied filter selection");
    filtered
}

/// Narrowing requested by the host, before the observed domain is known.
///
/// Any facet left as `None` keeps its full observed domain.
#[derive(Debug, Clone, Default)]
pub struct FilterRequest {
    pub technicians: Option<Vec<String>>,
    pub months: Option<Vec<Month>>,
    pub days: Option<Vec<NaiveDate>>,
    pub years: Option<Vec<i32>>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub min_drop_length: Option<f64>,
    pub max_drop_length: Option<f64>,
    pub min_prep_hours: Option<f64>,
    pub max_prep_hours: Option<f64>,
}

impl FilterRequest {
    /// Turn the request into a selection that only holds observed values.
    pub fn resolve(&self, domain: &FacetDomain) -> DashboardResult<FilterSelection> {
        let mut selection = FilterSelection::full(domain);

        if let Some(labels) = &self.technicians {
            let wanted = labels.iter().map(|l| Technician::from_cell(l));
            selection.technicians = restrict("technician", wanted, &domain.technicians);
        }
        if let Some(months) = &self.months {
            selection.months = restrict("month", months.iter().copied(), &domain.months);
        }
        if let Some(days) = &self.days {
            selection.days = restrict("day", days.iter().copied(), &domain.days);
        }
        if let Some(years) = &self.years {
            selection.years = restrict("year", years.iter().copied(), &domain.years);
        }

        if self.from.is_some() || self.to.is_some() {
            selection.date_range = match (selection.date_range, self.from, self.to) {
                (_, Some(start), Some(end)) => Some(DateRange { start, end }),
                (Some(full), start, end) => Some(DateRange {
                    start: start.unwrap_or(full.start),
                    end: end.unwrap_or(full.end),
                }),
                (None, _, _) => None,
            };
            if let Some(range) = selection.date_range {
                if range.start > range.end {
                    return Err(DashboardError::InvalidFilter(format!(
                        "date range starts after it ends ({} > {})",
                        range.start, range.end
                    )));
                }
            }
        }

        if let Some(range) = narrow_numeric(
            "drop length",
            domain.drop_length_span,
            self.min_drop_length,
            self.max_drop_length,
        )? {
            selection.drop_length = Some(range);
        }
        if let Some(range) = narrow_numeric(
            "prep hours",
            domain.prep_hours_span,
            self.min_prep_hours,
            self.max_prep_hours,
        )? {
            selection.prep_hours = Some(range);
        }

        Ok(selection)
    }
}

fn restrict<T>(facet: &str, wanted: impl Iterator<Item = T>, observed: &BTreeSet<T>) -> BTreeSet<T>
where
    T: Ord + Display,
{
    wanted
        .filter(|value| {
            let known = observed.contains(value);
            if !known {
                warn!(facet, value = %value, "value not present in upload, ignoring");
            }
            known
        })
        .collect()
}

/// An explicit bound also drops records missing that measurement.
fn narrow_numeric(
    name: &str,
    span: Option<(f64, f64)>,
    min: Option<f64>,
    max: Option<f64>,
) -> DashboardResult<Option<NumericRange>> {
    if min.is_none() && max.is_none() {
        return Ok(None);
    }

    let (lo, hi) = span.unwrap_or((f64::NEG_INFINITY, f64::INFINITY));
    let range = NumericRange {
        min: min.unwrap_or(lo),
        max: max.unwrap_or(hi),
        include_missing: false,
    };
    if range.min > range.max {
        return Err(DashboardError::InvalidFilter(format!(
            "{name} minimum {} exceeds maximum {}",
            range.min, range.max
        )));
    }
    Ok(Some(range))
}
