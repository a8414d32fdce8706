// Collector module - fetches the query catalog and builds a snapshot
//
// This module is responsible for:
// 1. Issuing each catalog query as a Prometheus instant query over HTTP
// 2. Flattening every returned series into a MetricRow
// 3. Surviving per-query failures: a failed query is logged and skipped,
//    the run continues with the remaining queries
//
// One wall-clock timestamp, truncated to minute granularity, is computed
// once per run and stamped on every row, so all rows of one invocation are
// treated as co-occurring when the merger deduplicates.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Local;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::dataset::MetricRow;
use crate::queries::MetricQuery;

/// Bounded timeout for each instant query
const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur while fetching a single query
///
/// These are never fatal to the run: the collector logs them and moves on
/// to the next query.
#[derive(Error, Debug)]
pub enum CollectError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
}

/// Prometheus instant-query response envelope.
///
/// Only the fields the pipeline consumes are modeled; everything else in
/// the response body is ignored.
#[derive(Deserialize)]
struct QueryResponse {
    data: QueryData,
}

#[derive(Deserialize, Default)]
struct QueryData {
    #[serde(default)]
    result: Vec<SeriesResult>,
}

/// One time series in an instant-query result: a label set plus a single
/// [epoch_seconds, value_string] sample
#[derive(Deserialize)]
struct SeriesResult {
    #[serde(default)]
    metric: HashMap<String, String>,

    value: (f64, String),
}

/// HTTP client for Prometheus instant queries
pub struct PrometheusClient {
    http: reqwest::Client,
    query_url: String,
}

impl PrometheusClient {
    /// Creates a client bound to a resolved query URL
    ///
    /// # Arguments
    /// * `query_url` - Base URL of the instant-query endpoint, e.g.
    ///   `http://prom.example.com/api/v1/query`
    pub fn new(query_url: String) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(QUERY_TIMEOUT).build()?;

        Ok(PrometheusClient { http, query_url })
    }

    /// Issues one instant query and returns its series results
    async fn instant_query(&self, expression: &str) -> Result<Vec<SeriesResult>, CollectError> {
        let response = self
            .http
            .get(&self.query_url)
            .query(&[("query", expression)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollectError::Status(status));
        }

        let body: QueryResponse = response.json().await?;
        Ok(body.data.result)
    }

    /// Runs every catalog query and accumulates the rows of this run
    ///
    /// # Arguments
    /// * `queries` - The static query catalog
    /// * `timestamp` - The shared run timestamp stamped on every row
    ///
    /// # Behavior
    /// Queries are issued strictly in sequence. A query that fails (network
    /// error, non-success status, undecodable body) contributes zero rows;
    /// the failure is logged and the run continues. Partial success is
    /// expected and acceptable.
    pub async fn collect_snapshot(
        &self,
        queries: &[MetricQuery],
        timestamp: &str,
    ) -> Vec<MetricRow> {
        let mut rows = Vec::new();

        for query in queries {
            debug!("Fetching '{}'", query.name);

            match self.instant_query(query.expression).await {
                Ok(results) => {
                    let count = results.len();
                    rows.extend(rows_from_results(query.name, timestamp, results));
                    info!("Fetched '{}': {} series", query.name, count);
                }
                Err(e) => {
                    error!("Failed to fetch '{}': {}", query.name, e);
                }
            }
        }

        rows
    }
}

/// Computes the shared timestamp for one collection run
///
/// Local wall-clock time formatted as `YYYY-MM-DD HH:MM`; the format itself
/// truncates to minute granularity.
pub fn run_timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M").to_string()
}

/// Flattens instant-query series into dataset rows
///
/// Each series yields one row: the `pod` label becomes the entity identifier
/// (falling back to "unknown" when the label is absent) and the sample's
/// value string is carried over verbatim, unparsed.
fn rows_from_results(
    metric_name: &str,
    timestamp: &str,
    results: Vec<SeriesResult>,
) -> Vec<MetricRow> {
    results
        .into_iter()
        .map(|series| {
            let pod = series
                .metric
                .get("pod")
                .cloned()
                .unwrap_or_else(|| "unknown".to_string());

            MetricRow {
                timestamp: timestamp.to_string(),
                pod,
                metric: metric_name.to_string(),
                value: series.value.1,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_response(body: &str) -> Vec<SeriesResult> {
        let response: QueryResponse = serde_json::from_str(body).expect("valid response");
        response.data.result
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{
            "status": "success",
            "data": {
                "resultType": "vector",
                "result": [
                    {
                        "metric": {"pod": "podA"},
                        "value": [1704067200, "0.25"]
                    },
                    {
                        "metric": {"pod": "podB"},
                        "value": [1704067200, "1.5e-3"]
                    }
                ]
            }
        }"#;

        let results = parse_response(body);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].metric.get("pod").map(String::as_str), Some("podA"));
        assert_eq!(results[0].value.1, "0.25");
    }

    #[test]
    fn test_empty_result_parses() {
        let body = r#"{"status": "success", "data": {"resultType": "vector", "result": []}}"#;
        assert!(parse_response(body).is_empty());
    }

    #[test]
    fn test_malformed_body_is_rejected() {
        let body = r#"{"status": "success"}"#;
        assert!(serde_json::from_str::<QueryResponse>(body).is_err());
    }

    #[test]
    fn test_rows_carry_value_text_verbatim() {
        let results = parse_response(
            r#"{"data": {"result": [{"metric": {"pod": "podA"}, "value": [0, "1.5e-3"]}]}}"#,
        );

        let rows = rows_from_results("cpu_usage", "2024-01-01 00:05", results);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].timestamp, "2024-01-01 00:05");
        assert_eq!(rows[0].pod, "podA");
        assert_eq!(rows[0].metric, "cpu_usage");
        assert_eq!(rows[0].value, "1.5e-3");
    }

    #[test]
    fn test_missing_pod_label_falls_back_to_unknown() {
        let results = parse_response(
            r#"{"data": {"result": [{"metric": {"phase": "Pending"}, "value": [0, "1"]}]}}"#,
        );

        let rows = rows_from_results("pod_pending", "2024-01-01 00:05", results);

        assert_eq!(rows[0].pod, "unknown");
    }

    /// Minimal HTTP stub: serves `count` sequential connections, returning
    /// 500 unless the request's query string contains "query=ok", in which
    /// case it returns one podA series as JSON
    fn spawn_stub_server(count: usize) -> (std::net::SocketAddr, std::thread::JoinHandle<()>) {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind stub");
        let addr = listener.local_addr().expect("stub addr");

        let handle = std::thread::spawn(move || {
            for _ in 0..count {
                let (mut stream, _) = listener.accept().expect("accept");

                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                loop {
                    let n = stream.read(&mut buf).expect("read request");
                    request.extend_from_slice(&buf[..n]);
                    if n == 0 || request.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }

                let request = String::from_utf8_lossy(&request);
                let response = if request.contains("query=ok") {
                    let body = r#"{"status":"success","data":{"resultType":"vector","result":[{"metric":{"pod":"podA"},"value":[1704067200,"0.25"]}]}}"#;
                    format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    )
                } else {
                    "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                        .to_string()
                };

                stream.write_all(response.as_bytes()).expect("write response");
            }
        });

        (addr, handle)
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_rows_from_surviving_queries() {
        let (addr, server) = spawn_stub_server(2);

        let client =
            PrometheusClient::new(format!("http://{addr}/api/v1/query")).expect("client");

        // The failing query comes first: the run must continue past it
        let queries = [
            MetricQuery {
                name: "broken_metric",
                expression: "boom",
            },
            MetricQuery {
                name: "cpu_usage",
                expression: "ok",
            },
        ];

        let rows = client.collect_snapshot(&queries, "2024-01-01 00:05").await;

        server.join().expect("stub server");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].metric, "cpu_usage");
        assert_eq!(rows[0].pod, "podA");
        assert_eq!(rows[0].value, "0.25");
        assert_eq!(rows[0].timestamp, "2024-01-01 00:05");
    }

    #[test]
    fn test_run_timestamp_has_minute_granularity() {
        let ts = run_timestamp();

        // YYYY-MM-DD HH:MM - no seconds component
        assert_eq!(ts.len(), 16);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], " ");
        assert_eq!(&ts[13..14], ":");
    }
}
