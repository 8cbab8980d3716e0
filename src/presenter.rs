// Turns a board outcome into display rows (web) or a text table (CLI).

use crate::config::Attribution;
use crate::ctb_api_models::{ArrivalRecord, BoardOutcome, CtbModels, FetchReport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Serialize)]
pub struct ArrivalRow {
    pub route: String,
    pub stop: String,
    pub dest_en: String,
    pub eta: String,
    pub eta_local: String,
    /// Upstream position of this arrival among the route's next buses.
    pub eta_seq: Option<u32>,
    pub minutes: i64,
    pub remark: String,
}

impl ArrivalRow {
    pub fn from_record(record: &ArrivalRecord, now: DateTime<Utc>) -> Self {
        ArrivalRow {
            route: record.route.clone(),
            stop: record.stop.clone(),
            dest_en: record.dest_en.clone(),
            eta: record.eta.to_rfc3339(),
            eta_local: CtbModels::format_clock(&record.eta),
            eta_seq: record.eta_seq,
            minutes: record.minutes_until(now),
            remark: record.remark.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardView {
    pub title: String,
    pub query: String,
    pub rows: Vec<ArrivalRow>,
    /// Set when there is nothing to show.
    pub message: Option<String>,
    pub report: FetchReport,
}

impl BoardView {
    pub fn new(title: &str, query: &str, outcome: &BoardOutcome, now: DateTime<Utc>) -> Self {
        let message = match outcome {
            BoardOutcome::Arrivals { .. } => None,
            BoardOutcome::NoData { message, .. } => Some(message.to_string()),
        };
        BoardView {
            title: title.to_string(),
            query: query.to_string(),
            rows: outcome.arrivals().iter().map(|a| ArrivalRow::from_record(a, now)).collect(),
            message,
            report: outcome.report().clone(),
        }
    }
}

pub fn render_text(view: &BoardView, attribution: &Attribution) -> String {
    TextBoard { view, attribution }.to_string()
}

struct TextBoard<'a> {
    view: &'a BoardView,
    attribution: &'a Attribution,
}

impl fmt::Display for TextBoard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let view = self.view;
        writeln!(f, "{} ({})", view.title, view.query)?;
        writeln!(f)?;

        match &view.message {
            Some(message) => writeln!(f, "{}", message)?,
            None => {
                writeln!(
                    f,
                    "{:<6} {:<7} {:<32} {:<9} {:>3} {:>4}  {}",
                    "Route", "Stop", "Destination", "ETA", "Seq", "Min", "Remark"
                )?;
                writeln!(f, "{}", "-".repeat(76))?;
                for row in &view.rows {
                    let seq = row.eta_seq.map(|s| s.to_string()).unwrap_or_default();
                    writeln!(
                        f,
                        "{:<6} {:<7} {:<32} {:<9} {:>3} {:>4}  {}",
                        row.route, row.stop, row.dest_en, row.eta_local, seq, row.minutes, row.remark
                    )?;
                }
            }
        }

        let report = &view.report;
        if report.failed > 0 || report.malformed > 0 || report.rejected > 0 {
            writeln!(
                f,
                "\n{} of {} requests failed, {} entries had unreadable times, {} entries were rejected",
                report.failed, report.requests, report.malformed, report.rejected
            )?;
        }

        writeln!(f, "\n---\nSource and Citation")?;
        writeln!(f, "{}\n{}", self.attribution.source, self.attribution.source_url)?;
        writeln!(f, "{}", self.attribution.disclaimer)
    }
}
