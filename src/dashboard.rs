use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::error::DashboardResult;
use crate::filter::{self, FilterRequest, FilterSelection};
use crate::ingest::{self, IngestReport};
use crate::models::SurveyRecord;
use crate::summary::{self, Summaries};

/// Filtered rows and their summaries for one selection.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub selection: FilterSelection,
    pub filtered: Vec<SurveyRecord>,
    pub summaries: Summaries,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardState {
    pub ingest: IngestReport,
    pub view: DashboardView,
}

/// Recompute the view for a new selection over an already ingested upload.
pub fn build_view(records: &[SurveyRecord], selection: FilterSelection) -> DashboardView {
    let matching = filter::apply(records, &selection);
    let summaries = summary::summarize(&matching);
    if matches!(summaries, Summaries::NoMatchingRecords) {
        info!("selection matches no records");
    }

    DashboardView {
        filtered: matching.into_iter().cloned().collect(),
        selection,
        summaries,
    }
}

/// Whole pipeline for one upload and one filter request.
pub fn compute_dashboard_state(
    bytes: &[u8],
    request: &FilterRequest,
    config: &Config,
) -> DashboardResult<DashboardState> {
    let ingest = ingest::ingest(bytes, config)?;
    let selection = request.resolve(&ingest.facets)?;
    let view = build_view(&ingest.records, selection);
    Ok(DashboardState { ingest, view })
}
