use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

use crate::models::{Month, SurveyRecord, Technician};

pub type CountTable<K> = BTreeMap<K, usize>;

/// Technician rows by month columns, zero-filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pivot {
    pub rows: Vec<Technician>,
    pub columns: Vec<Month>,
    pub cells: Vec<Vec<usize>>,
}

impl Pivot {
    pub fn get(&self, technician: &Technician, month: &Month) -> Option<usize> {
        let row = self.rows.iter().position(|t| t == technician)?;
        let column = self.columns.iter().position(|m| m == month)?;
        Some(self.cells[row][column])
    }

    pub fn row_total(&self, row: usize) -> usize {
        self.cells.get(row).map_or(0, |cells| cells.iter().sum())
    }

    pub fn total(&self) -> usize {
        self.cells.iter().flatten().sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MeasurementStats {
    pub count: usize,
    pub sum: f64,
}

impl MeasurementStats {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.count += 1;
            self.sum += v;
        }
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Measurements {
    pub drop_length: MeasurementStats,
    pub prep_hours: MeasurementStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryTables {
    pub total: usize,
    pub by_technician: CountTable<Technician>,
    pub by_month: CountTable<Month>,
    pub by_day: CountTable<NaiveDate>,
    pub by_year: CountTable<i32>,
    #[serde(serialize_with = "pairs_as_rows")]
    pub by_technician_month: CountTable<(Technician, Month)>,
    pub pivot: Pivot,
    pub measurements: BTreeMap<Technician, Measurements>,
}

/// What the display layer gets for one filter selection.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Summaries {
    NoMatchingRecords,
    Tables(SummaryTables),
}

impl Summaries {
    pub fn tables(&self) -> Option<&SummaryTables> {
        match self {
            Summaries::Tables(tables) => Some(tables),
            Summaries::NoMatchingRecords => None,
        }
    }
}

pub fn count_by<K, F>(records: &[&SurveyRecord], key: F) -> CountTable<K>
where
    K: Ord,
    F: Fn(&SurveyRecord) -> K,
{
    let mut counts = CountTable::new();
    for record in records {
        *counts.entry(key(record)).or_insert(0) += 1;
    }
    counts
}

pub fn count_by_technician(records: &[&SurveyRecord]) -> CountTable<Technician> {
    count_by(records, |r| r.technician.clone())
}

pub fn count_by_technician_month(records: &[&SurveyRecord]) -> CountTable<(Technician, Month)> {
    count_by(records, |r| (r.technician.clone(), r.month))
}

/// Dense pivot over the technicians and months present in `pairs`.
pub fn pivot_technician_month(pairs: &CountTable<(Technician, Month)>) -> Pivot {
    let rows: Vec<Technician> = pairs
        .keys()
        .map(|(t, _)| t.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let columns: Vec<Month> = pairs
        .keys()
        .map(|(_, m)| *m)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let cells = rows
        .iter()
        .map(|tech| {
            columns
                .iter()
                .map(|month| {
                    pairs
                        .get(&(tech.clone(), *month))
                        .copied()
                        .unwrap_or(0)
                })
                .collect()
        })
        .collect();

    Pivot {
        rows,
        columns,
        cells,
    }
}

pub fn measurements_by_technician(records: &[&SurveyRecord]) -> BTreeMap<Technician, Measurements> {
    let mut map: BTreeMap<Technician, Measurements> = BTreeMap::new();
    for record in records {
        let entry = map.entry(record.technician.clone()).or_default();
        entry.drop_length.push(record.drop_length);
        entry.prep_hours.push(record.prep_hours);
    }
    map
}

pub fn summarize(records: &[&SurveyRecord]) -> Summaries {
    if records.is_empty() {
        return Summaries::NoMatchingRecords;
    }

    let by_technician_month = count_by_technician_month(records);
    let pivot = pivot_technician_month(&by_technician_month);

    Summaries::Tables(SummaryTables {
        total: records.len(),
        by_technician: count_by_technician(records),
        by_month: count_by(records, |r| r.month),
        by_day: count_by(records, |r| r.day),
        by_year: count_by(records, |r| r.year),
        by_technician_month,
        pivot,
        measurements: measurements_by_technician(records),
    })
}

fn pairs_as_rows<S: Serializer>(
    pairs: &CountTable<(Technician, Month)>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    struct PairRow<'a> {
        technician: &'a Technician,
        month: &'a Month,
        count: usize,
    }

    let mut seq = serializer.serialize_seq(Some(pairs.len()))?;
    for ((technician, month), count) in pairs {
        seq.serialize_element(&PairRow {
            technician,
            month,
            count: *count,
        })?;
    }
    seq.end()
}
