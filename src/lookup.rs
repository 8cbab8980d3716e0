// Static stop/route lookup tables and route selection.

use crate::ctb_api_models::{CtbError, Result, StopRouteRecord};
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

pub type RouteSet = BTreeSet<String>;

#[derive(Debug, Clone, Default)]
pub struct StopRouteTable {
    rows: Vec<StopRouteRecord>,
}

impl StopRouteTable {
    pub fn new(rows: Vec<StopRouteRecord>) -> Self {
        StopRouteTable { rows }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| CtbError::FileError(format!("Failed to open {:?}: {}", path, e)))?;
        let table = Self::from_reader(file)?;
        if table.is_empty() {
            log::warn!("lookup table {:?} has no usable rows; every stop will be unknown", path);
        } else {
            log::debug!("loaded {} stop/route rows from {:?}", table.len(), path);
        }
        Ok(table)
    }

    /// Reads a CSV with at least `stop` and `route` headers. Stop codes are kept
    /// as written, so `001032` never collapses to `1032`.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut rows = Vec::new();

        for (line, result) in rdr.deserialize::<StopRouteRecord>().enumerate() {
            let record = result
                .map_err(|e| CtbError::ParseError(format!("Bad lookup row {}: {}", line + 1, e)))?;
            if record.stop.is_empty() || record.route.is_empty() {
                log::warn!("skipping lookup row {} with empty stop or route", line + 1);
                continue;
            }
            rows.push(record);
        }

        Ok(StopRouteTable { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows_for_stop<'a>(&'a self, stop: &'a str) -> impl Iterator<Item = &'a StopRouteRecord> + 'a {
        self.rows.iter().filter(move |r| r.stop == stop)
    }

    pub fn rows_for_stops<'a>(&'a self, stops: &'a [String]) -> impl Iterator<Item = &'a StopRouteRecord> + 'a {
        self.rows.iter().filter(move |r| stops.iter().any(|s| *s == r.stop))
    }

    pub fn contains_stop(&self, stop: &str) -> bool {
        self.rows_for_stop(stop).next().is_some()
    }

    /// Distinct routes serving `stop`.
    pub fn routes_serving(&self, stop: &str) -> RouteSet {
        self.rows_for_stop(stop).map(|r| r.route.clone()).collect()
    }

    /// Routes serving `start` that also serve at least one of `destinations`.
    pub fn routes_connecting(&self, start: &str, destinations: &[String]) -> RouteSet {
        let start_routes = self.routes_serving(start);
        if start_routes.is_empty() {
            return start_routes;
        }
        let destination_routes: RouteSet = self
            .rows_for_stops(destinations)
            .map(|r| r.route.clone())
            .collect();
        start_routes
            .intersection(&destination_routes)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "route,bound,seq,stop,name_en
1,O,1,001032,Central (Exchange Square)
1,O,9,002378,Happy Valley (Upper)
5B,O,1,001032,Central (Exchange Square)
10,O,1,001031,City Hall
10,O,12,002302,North Point Ferry Pier
72,O,3,001136,Admiralty
";

    fn table() -> StopRouteTable {
        StopRouteTable::from_reader(CSV.as_bytes()).unwrap()
    }

    fn dests(stops: &[&str]) -> Vec<String> {
        stops.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn reads_stop_codes_as_strings() {
        let table = table();
        assert_eq!(table.len(), 6);
        assert!(table.contains_stop("001032"));
        assert!(!table.contains_stop("1032"));
    }

    #[test]
    fn header_only_or_blank_rows_give_empty_table() {
        let header_only = StopRouteTable::from_reader("route,bound,seq,stop,name_en\n".as_bytes()).unwrap();
        assert!(header_only.is_empty());

        let blanks = StopRouteTable::from_reader("route,stop\n1,\n,001032\n".as_bytes()).unwrap();
        assert!(blanks.is_empty());
        assert!(!blanks.contains_stop("001032"));
        assert!(!table().is_empty());
    }

    #[test]
    fn unknown_stop_has_no_rows() {
        let table = table();
        assert_eq!(table.rows_for_stop("999999").count(), 0);
        assert!(table.routes_serving("999999").is_empty());
        assert!(table.routes_connecting("", &dests(&["002378"])).is_empty());
    }

    #[test]
    fn direct_lookup_dedups_routes() {
        let table = StopRouteTable::from_reader(
            "stop,route\n002349,629\n002349,629\n002349,90\n".as_bytes(),
        )
        .unwrap();
        let routes: Vec<_> = table.routes_serving("002349").into_iter().collect();
        assert_eq!(routes, vec!["629", "90"]);
    }

    #[test]
    fn intersects_start_routes_with_any_destination() {
        let table = table();
        let routes = table.routes_connecting("001032", &dests(&["002378", "002302"]));
        assert_eq!(routes.into_iter().collect::<Vec<_>>(), vec!["1"]);

        let routes = table.routes_connecting("001031", &dests(&["002378", "002302"]));
        assert_eq!(routes.into_iter().collect::<Vec<_>>(), vec!["10"]);

        assert!(table.routes_connecting("001136", &dests(&["002378"])).is_empty());
    }

    #[test]
    fn skips_rows_with_blank_fields() {
        let table = StopRouteTable::from_reader("stop,route\n001032,\n,1\n001032,1\n".as_bytes()).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn bundled_tables_cover_default_stops() {
        let outbound =
            StopRouteTable::from_reader(include_str!("../data/bus_stop_data_complete_outbound.csv").as_bytes()).unwrap();
        let destinations = dests(&["002378", "002302", "002277", "002400"]);
        for start in ["001032", "001031", "001136"] {
            assert!(!outbound.routes_connecting(start, &destinations).is_empty(), "{}", start);
        }

        let inbound =
            StopRouteTable::from_reader(include_str!("../data/bus_stop_data_complete_inbound.csv").as_bytes()).unwrap();
        assert!(!inbound.routes_serving("002349").is_empty());
        assert!(!inbound.routes_serving("002353").is_empty());
    }

    #[test]
    fn missing_file_is_a_file_error() {
        let err = StopRouteTable::from_path(Path::new("does/not/exist.csv")).unwrap_err();
        assert!(matches!(err, CtbError::FileError(_)));
    }
}
