// API models for the Citybus (CTB) real-time ETA feed published on DATA.GOV.HK
// Dataset: https://data.gov.hk/en-data/dataset/ctb-eta-transport-realtime-eta
//
// CTB ETA endpoint:
// - https://rt.data.gov.hk/v2/transport/citybus/eta/CTB/{stop_id}/{route}
//
// Static lookup tables (stop -> route) live under data/ and are read per request.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Asia::Hong_Kong;
use serde::{Deserialize, Serialize};

// ============================================================================
// Lookup Table Rows
// ============================================================================

/// One row of a static stop/route lookup table. Extra CSV columns are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StopRouteRecord {
    pub stop: String,
    pub route: String,
}

// ============================================================================
// Upstream ETA Schema
// ============================================================================

/// Body of a `GET .../eta/CTB/{stop}/{route}` response.
#[derive(Debug, Clone, Deserialize)]
pub struct EtaResponse {
    #[serde(default)]
    pub generated_timestamp: Option<String>,
    /// Decoded entry by entry so one bad element does not sink the rest.
    pub data: Vec<serde_json::Value>,
}

/// One element of the `data` array, before its `eta` has been validated.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawEta {
    #[serde(default)]
    pub co: Option<String>,
    pub route: String,
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub seq: Option<u32>,
    pub stop: String,
    #[serde(default)]
    pub dest_en: String,
    #[serde(default)]
    pub eta_seq: Option<u32>,
    #[serde(default)]
    pub eta: Option<String>,
    #[serde(default)]
    pub rmk_en: Option<String>,
    #[serde(default)]
    pub data_timestamp: Option<String>,
}

/// Entries decoded from one ETA response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EtaBatch {
    pub entries: Vec<RawEta>,
    /// Elements of `data` that did not match the entry schema.
    pub rejected: usize,
}

impl From<Vec<RawEta>> for EtaBatch {
    fn from(entries: Vec<RawEta>) -> Self {
        EtaBatch { entries, rejected: 0 }
    }
}

/// Classification of a raw `eta` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EtaValue {
    Predicted(DateTime<FixedOffset>),
    /// Empty or absent: the bus has no prediction yet.
    Unscheduled,
    Malformed(String),
}

impl RawEta {
    pub fn eta_value(&self) -> EtaValue {
        match self.eta.as_deref().map(str::trim) {
            None | Some("") => EtaValue::Unscheduled,
            Some(text) => match CtbModels::parse_eta(text) {
                Some(ts) => EtaValue::Predicted(ts),
                None => EtaValue::Malformed(text.to_string()),
            },
        }
    }
}

// ============================================================================
// Pipeline Output
// ============================================================================

/// One predicted arrival, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrivalRecord {
    pub route: String,
    pub stop: String,
    pub dest_en: String,
    pub eta: DateTime<FixedOffset>,
    pub eta_seq: Option<u32>,
    pub remark: Option<String>,
}

impl ArrivalRecord {
    /// Whole minutes from `now` until arrival, never negative.
    pub fn minutes_until(&self, now: DateTime<Utc>) -> i64 {
        (self.eta.with_timezone(&Utc) - now).num_minutes().max(0)
    }
}

/// Counters describing how one pipeline run went.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchReport {
    pub requests: usize,
    pub failed: usize,
    pub unscheduled: usize,
    pub malformed: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoDataReason {
    EmptyQuery,
    UnknownStop,
    NoConnectingRoutes,
    NoArrivals,
}

impl NoDataReason {
    pub fn message(&self) -> &'static str {
        match self {
            NoDataReason::EmptyQuery => "Enter a stop number to see bus times.",
            NoDataReason::UnknownStop => "No data available for the given stop.",
            NoDataReason::NoConnectingRoutes => "No routes connect the given stop to the configured destinations.",
            NoDataReason::NoArrivals => "No data available for the given start stop.",
        }
    }
}

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BoardOutcome {
    Arrivals {
        arrivals: Vec<ArrivalRecord>,
        report: FetchReport,
    },
    NoData {
        reason: NoDataReason,
        message: &'static str,
        report: FetchReport,
    },
}

impl BoardOutcome {
    pub fn no_data(reason: NoDataReason, report: FetchReport) -> Self {
        BoardOutcome::NoData {
            reason,
            message: reason.message(),
            report,
        }
    }

    pub fn report(&self) -> &FetchReport {
        match self {
            BoardOutcome::Arrivals { report, .. } | BoardOutcome::NoData { report, .. } => report,
        }
    }

    pub fn arrivals(&self) -> &[ArrivalRecord] {
        match self {
            BoardOutcome::Arrivals { arrivals, .. } => arrivals,
            BoardOutcome::NoData { .. } => &[],
        }
    }
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CtbError {
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("File error: {0}")]
    FileError(String),
    #[error("Config error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, CtbError>;

// ============================================================================
// Helpers
// ============================================================================

pub struct CtbModels;

impl CtbModels {
    const NAIVE_ETA_FORMATS: [&'static str; 3] =
        ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

    /// Parses an upstream timestamp. Offset-less values are taken as Hong Kong time.
    pub fn parse_eta(text: &str) -> Option<DateTime<FixedOffset>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
            return Some(ts);
        }
        Self::NAIVE_ETA_FORMATS.iter().find_map(|fmt| {
            let naive = NaiveDateTime::parse_from_str(text, fmt).ok()?;
            let local = Hong_Kong.from_local_datetime(&naive).single()?;
            Some(local.fixed_offset())
        })
    }

    /// The envelope must decode; individual `data` elements that do not are skipped.
    pub fn parse_eta_response(body: &str) -> Result<EtaBatch> {
        let response: EtaResponse = serde_json::from_str(body)
            .map_err(|e| CtbError::ParseError(format!("Invalid ETA response: {}", e)))?;
        log::trace!("ETA response generated at {:?}", response.generated_timestamp);

        let mut batch = EtaBatch::default();
        for (index, value) in response.data.into_iter().enumerate() {
            match serde_json::from_value::<RawEta>(value) {
                Ok(entry) => batch.entries.push(entry),
                Err(e) => {
                    log::warn!("skipping ETA entry {}: {}", index, e);
                    batch.rejected += 1;
                }
            }
        }
        Ok(batch)
    }

    pub fn format_clock(ts: &DateTime<FixedOffset>) -> String {
        ts.with_timezone(&Hong_Kong).format("%H:%M:%S").to_string()
    }

    pub fn format_timestamp_full(timestamp: i64) -> String {
        match Utc.timestamp_opt(timestamp, 0).single() {
            Some(dt) => dt.with_timezone(&Hong_Kong).format("%Y-%m-%d %H:%M:%S").to_string(),
            None => format!("Invalid timestamp: {}", timestamp),
        }
    }

    pub fn get_current_timestamp() -> i64 {
        Utc::now().timestamp()
    }
}
