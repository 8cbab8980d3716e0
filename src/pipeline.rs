// The two arrival boards: loader -> route selection -> fetch -> merge.

use crate::config::{DashboardConfig, FromCentralConfig, ToCentralConfig};
use crate::ctb_api_models::{BoardOutcome, FetchReport, NoDataReason, Result};
use crate::fetcher::{fetch_all, CitybusClient, EtaSource, FetchRequest};
use crate::lookup::{RouteSet, StopRouteTable};
use crate::merger;

/// For every route: the start stop first, then each destination stop.
pub fn from_central_requests(start: &str, routes: &RouteSet, destinations: &[String]) -> Vec<FetchRequest> {
    routes
        .iter()
        .flat_map(move |route| {
            std::iter::once(FetchRequest::new(start, route))
                .chain(destinations.iter().map(move |dest| FetchRequest::new(dest, route)))
        })
        .collect()
}

/// Arrivals on routes linking `start` to any configured destination.
pub fn bus_times_from_central<S: EtaSource + ?Sized>(
    settings: &FromCentralConfig,
    table: &StopRouteTable,
    source: &S,
    max_concurrency: usize,
    start: &str,
) -> Result<BoardOutcome> {
    let start = start.trim();
    if start.is_empty() {
        return Ok(BoardOutcome::no_data(NoDataReason::EmptyQuery, FetchReport::default()));
    }
    if !table.contains_stop(start) {
        log::info!("start stop {} not in lookup table", start);
        return Ok(BoardOutcome::no_data(NoDataReason::UnknownStop, FetchReport::default()));
    }

    let routes = table.routes_connecting(start, &settings.destinations);
    if routes.is_empty() {
        log::info!("no routes connect {} to {:?}", start, settings.destinations);
        return Ok(BoardOutcome::no_data(NoDataReason::NoConnectingRoutes, FetchReport::default()));
    }

    let requests = from_central_requests(start, &routes, &settings.destinations);
    log::info!("from {}: {} routes, {} requests", start, routes.len(), requests.len());
    collect_board(source, &requests, &settings.exclude_dest_en, max_concurrency)
}

/// Arrivals of every route serving one of the named inbound stops.
pub fn bus_times_to_central<S: EtaSource + ?Sized>(
    settings: &ToCentralConfig,
    table: &StopRouteTable,
    source: &S,
    max_concurrency: usize,
    stop: &str,
) -> Result<BoardOutcome> {
    let stop = stop.trim();
    if stop.is_empty() {
        return Ok(BoardOutcome::no_data(NoDataReason::EmptyQuery, FetchReport::default()));
    }

    let routes = table.routes_serving(stop);
    if routes.is_empty() {
        log::info!("stop {} not in lookup table", stop);
        return Ok(BoardOutcome::no_data(NoDataReason::UnknownStop, FetchReport::default()));
    }

    let requests: Vec<_> = routes.iter().map(|route| FetchRequest::new(stop, route)).collect();
    log::info!("to Central from {}: {} requests", stop, requests.len());
    collect_board(source, &requests, &settings.exclude_dest_en, max_concurrency)
}

fn collect_board<S: EtaSource + ?Sized>(
    source: &S,
    requests: &[FetchRequest],
    exclude_dest_en: &[String],
    max_concurrency: usize,
) -> Result<BoardOutcome> {
    let mut report = FetchReport::default();
    let outcomes = fetch_all(source, requests, max_concurrency)?;
    let entries = merger::flatten(outcomes, &mut report);
    let arrivals = merger::normalize(entries, exclude_dest_en, &mut report);

    if report.failed > 0 {
        log::warn!("{} of {} ETA requests failed", report.failed, report.requests);
    }

    if arrivals.is_empty() {
        Ok(BoardOutcome::no_data(NoDataReason::NoArrivals, report))
    } else {
        Ok(BoardOutcome::Arrivals { arrivals, report })
    }
}

// ============================================================================
// Entry points with real I/O
// ============================================================================

pub fn run_from_central(config: &DashboardConfig, start: &str) -> Result<BoardOutcome> {
    if start.trim().is_empty() {
        return Ok(BoardOutcome::no_data(NoDataReason::EmptyQuery, FetchReport::default()));
    }
    let table = StopRouteTable::from_path(&config.from_central.lookup_file)?;
    let client = CitybusClient::new(&config.api)?;
    bus_times_from_central(&config.from_central, &table, &client, config.api.max_concurrency, start)
}

pub fn run_to_central(config: &DashboardConfig, stop: &str) -> Result<BoardOutcome> {
    if stop.trim().is_empty() {
        return Ok(BoardOutcome::no_data(NoDataReason::EmptyQuery, FetchReport::default()));
    }
    let table = StopRouteTable::from_path(&config.to_central.lookup_file)?;
    let client = CitybusClient::new(&config.api)?;
    bus_times_to_central(&config.to_central, &table, &client, config.api.max_concurrency, stop)
}
