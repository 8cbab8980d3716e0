// Flattens fetch outcomes into a sorted arrival list.

use crate::ctb_api_models::{ArrivalRecord, EtaValue, FetchReport, RawEta};
use crate::fetcher::FetchOutcome;

/// Concatenates successful payloads in outcome order and counts failures
/// and entries rejected while decoding.
pub fn flatten(outcomes: Vec<FetchOutcome>, report: &mut FetchReport) -> Vec<RawEta> {
    report.requests += outcomes.len();
    let mut entries = Vec::new();
    for outcome in outcomes {
        match outcome {
            FetchOutcome::Arrivals(mut batch) => {
                report.rejected += batch.rejected;
                entries.append(&mut batch.entries);
            }
            FetchOutcome::Failed(_) => report.failed += 1,
        }
    }
    entries
}

/// Parses every `eta`, drops entries without a usable one and any heading to
/// an excluded destination, then sorts by arrival time. The sort is stable.
pub fn normalize(
    entries: Vec<RawEta>,
    exclude_dest_en: &[String],
    report: &mut FetchReport,
) -> Vec<ArrivalRecord> {
    let mut arrivals: Vec<ArrivalRecord> = entries
        .into_iter()
        .filter_map(|entry| {
            let eta = match entry.eta_value() {
                EtaValue::Predicted(eta) => eta,
                EtaValue::Unscheduled => {
                    log::debug!("route {} at {} has no ETA yet", entry.route, entry.stop);
                    report.unscheduled += 1;
                    return None;
                }
                EtaValue::Malformed(text) => {
                    log::warn!("skipping route {} at {}: unparseable eta {:?}", entry.route, entry.stop, text);
                    report.malformed += 1;
                    return None;
                }
            };
            Some(ArrivalRecord {
                route: entry.route,
                stop: entry.stop,
                dest_en: entry.dest_en,
                eta,
                eta_seq: entry.eta_seq,
                remark: entry.rmk_en.filter(|r| !r.trim().is_empty()),
            })
        })
        .filter(|arrival| !exclude_dest_en.contains(&arrival.dest_en))
        .collect();

    arrivals.sort_by_key(|a| a.eta);
    arrivals
}
