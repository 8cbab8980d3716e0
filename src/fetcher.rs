// Parallel fan-out of CTB ETA requests.

use crate::config::ApiConfig;
use crate::ctb_api_models::{CtbError, CtbModels, EtaBatch, Result};
use rayon::prelude::*;
use reqwest::blocking;
use std::time::Duration;

/// One `(stop, route)` ETA lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FetchRequest {
    pub stop: String,
    pub route: String,
}

impl FetchRequest {
    pub fn new(stop: &str, route: &str) -> Self {
        FetchRequest {
            stop: stop.to_string(),
            route: route.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum FetchOutcome {
    Arrivals(EtaBatch),
    Failed(CtbError),
}

/// Something that can answer a single ETA lookup.
pub trait EtaSource: Sync {
    fn fetch_eta(&self, request: &FetchRequest) -> Result<EtaBatch>;
}

// ============================================================================
// HTTP Source
// ============================================================================

pub struct CitybusClient {
    client: blocking::Client,
    base_url: String,
}

impl CitybusClient {
    pub fn new(api: &ApiConfig) -> Result<Self> {
        let client = blocking::Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()
            .map_err(|e| CtbError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(CitybusClient {
            client,
            base_url: api.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn eta_url(&self, request: &FetchRequest) -> String {
        format!("{}/{}/{}", self.base_url, request.stop, request.route)
    }
}

impl EtaSource for CitybusClient {
    fn fetch_eta(&self, request: &FetchRequest) -> Result<EtaBatch> {
        let url = self.eta_url(request);

        let response = self.client.get(&url)
            .send()
            .map_err(|e| CtbError::NetworkError(format!("Failed to fetch {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(CtbError::HttpStatus {
                status: response.status().as_u16(),
                url,
            });
        }

        let body = response.text()
            .map_err(|e| CtbError::NetworkError(format!("Failed to read response: {}", e)))?;

        CtbModels::parse_eta_response(&body)
    }
}

// ============================================================================
// Fan-out
// ============================================================================

/// Runs every request on a pool of at most `max_concurrency` threads.
/// Outcomes come back in the same order as `requests`.
pub fn fetch_all<S: EtaSource + ?Sized>(
    source: &S,
    requests: &[FetchRequest],
    max_concurrency: usize,
) -> Result<Vec<FetchOutcome>> {
    if requests.is_empty() {
        return Ok(Vec::new());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(max_concurrency.clamp(1, requests.len()))
        .thread_name(|i| format!("ctb-fetch-{}", i))
        .build()
        .map_err(|e| CtbError::NetworkError(format!("Failed to start fetch pool: {}", e)))?;

    let outcomes = pool.install(|| {
        requests
            .par_iter()
            .map(|request| match source.fetch_eta(request) {
                Ok(batch) => {
                    log::debug!("{}/{}: {} entries", request.stop, request.route, batch.entries.len());
                    FetchOutcome::Arrivals(batch)
                }
                Err(e) => {
                    log::warn!("ETA request for stop {} route {} failed: {}", request.stop, request.route, e);
                    FetchOutcome::Failed(e)
                }
            })
            .collect()
    });

    Ok(outcomes)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ctb_api_models::RawEta;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory source that records every request it receives.
    #[derive(Default)]
    pub(crate) struct FakeSource {
        pub responses: HashMap<FetchRequest, Vec<RawEta>>,
        pub failing: Vec<FetchRequest>,
        pub calls: Mutex<Vec<FetchRequest>>,
    }

    impl FakeSource {
        pub fn with(mut self, stop: &str, route: &str, entries: Vec<RawEta>) -> Self {
            self.responses.insert(FetchRequest::new(stop, route), entries);
            self
        }

        pub fn failing(mut self, stop: &str, route: &str) -> Self {
            self.failing.push(FetchRequest::new(stop, route));
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().map(|c| c.len()).unwrap_or(0)
        }

        pub fn sorted_calls(&self) -> Vec<FetchRequest> {
            let mut calls = self.calls.lock().unwrap().clone();
            calls.sort();
            calls
        }
    }

    impl EtaSource for FakeSource {
        fn fetch_eta(&self, request: &FetchRequest) -> Result<EtaBatch> {
            self.calls.lock().unwrap().push(request.clone());
            if self.failing.contains(request) {
                return Err(CtbError::HttpStatus {
                    status: 503,
                    url: format!("fake/{}/{}", request.stop, request.route),
                });
            }
            Ok(self.responses.get(request).cloned().unwrap_or_default().into())
        }
    }

    pub(crate) fn entry(stop: &str, route: &str, dest: &str, eta: &str) -> RawEta {
        RawEta {
            co: Some("CTB".to_string()),
            route: route.to_string(),
            dir: Some("O".to_string()),
            seq: None,
            stop: stop.to_string(),
            dest_en: dest.to_string(),
            eta_seq: Some(1),
            eta: Some(eta.to_string()),
            rmk_en: None,
            data_timestamp: None,
        }
    }

    #[test]
    fn builds_eta_url() {
        let client = CitybusClient::new(&ApiConfig {
            base_url: "https://example.test/eta/CTB/".to_string(),
            ..ApiConfig::default()
        })
        .unwrap();
        assert_eq!(
            client.eta_url(&FetchRequest::new("001032", "1A")),
            "https://example.test/eta/CTB/001032/1A"
        );
    }

    #[test]
    fn no_requests_no_calls() {
        let source = FakeSource::default();
        let outcomes = fetch_all(&source, &[], 4).unwrap();
        assert!(outcomes.is_empty());
        assert_eq!(source.call_count(), 0);
    }

    #[test]
    fn keeps_request_order_and_isolates_failures() {
        let source = FakeSource::default()
            .with("001032", "1", vec![entry("001032", "1", "Happy Valley", "2024-05-01T12:35:00+08:00")])
            .failing("002378", "1")
            .with("002302", "1", vec![entry("002302", "1", "Happy Valley", "2024-05-01T12:50:00+08:00")]);
        let requests = vec![
            FetchRequest::new("001032", "1"),
            FetchRequest::new("002378", "1"),
            FetchRequest::new("002302", "1"),
        ];

        let outcomes = fetch_all(&source, &requests, 2).unwrap();

        assert_eq!(outcomes.len(), 3);
        assert!(matches!(&outcomes[0], FetchOutcome::Arrivals(b) if b.entries[0].stop == "001032"));
        assert!(matches!(&outcomes[1], FetchOutcome::Failed(CtbError::HttpStatus { status: 503, .. })));
        assert!(matches!(&outcomes[2], FetchOutcome::Arrivals(b) if b.entries[0].stop == "002302"));
        assert_eq!(source.call_count(), 3);
    }
}
