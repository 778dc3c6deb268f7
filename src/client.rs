//! Client for the external `/predict` endpoint
//!
//! One POST per call, no retries. Transport failures, timeouts and non-2xx
//! statuses become [`PredictionError::Network`]; a body that is not a valid
//! prediction becomes [`PredictionError::MalformedResponse`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::PredictionError;
use crate::model::{Prediction, PredictionInput};

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000/predict";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Display-ready result of a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutcome {
    pub prediction: Prediction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
}

/// Status and body of an HTTP response
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Sends a JSON body to the prediction endpoint
pub trait Transport {
    fn post_json(&self, body: String) -> Result<RawResponse, PredictionError>;
}

/// Blocking HTTP transport with a request deadline
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, PredictionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PredictionError::Network(format!("could not build HTTP client: {}", e)))?;
        Ok(Self { client, endpoint: endpoint.into() })
    }
}

impl Transport for HttpTransport {
    fn post_json(&self, body: String) -> Result<RawResponse, PredictionError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    PredictionError::Network(format!("request to {} timed out", self.endpoint))
                } else {
                    PredictionError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| PredictionError::Network(format!("failed to read response: {}", e)))?;
        Ok(RawResponse { status, body })
    }
}

/// Prediction client over any transport
pub struct PredictionClient<T: Transport> {
    transport: T,
}

impl PredictionClient<HttpTransport> {
    /// HTTP client for `endpoint` with the given request deadline
    pub fn http(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, PredictionError> {
        Ok(Self::new(HttpTransport::new(endpoint, timeout)?))
    }
}

impl<T: Transport> PredictionClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Submit `input` once and normalise the response
    pub fn predict(&self, input: &PredictionInput) -> Result<PredictionOutcome, PredictionError> {
        let body = serde_json::to_string(input)
            .map_err(|e| PredictionError::Network(format!("could not encode request: {}", e)))?;
        debug!("Sending prediction request: {}", body);

        let response = self.transport.post_json(body)?;
        if !(200..300).contains(&response.status) {
            warn!("Prediction endpoint returned status {}", response.status);
            return Err(PredictionError::Network(format!(
                "server returned status {}",
                response.status
            )));
        }

        let outcome: PredictionOutcome = serde_json::from_str(&response.body)
            .map_err(|e| PredictionError::MalformedResponse(e.to_string()))?;
        info!(
            "Prediction: {} (confidence {})",
            outcome.prediction,
            outcome.confidence.as_deref().unwrap_or("n/a")
        );
        Ok(outcome)
    }
}

/// Identifies one submission; only the newest ticket may apply its result
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestTicket(u64);

impl RequestTicket {
    pub fn sequence(self) -> u64 {
        self.0
    }
}

/// Monotonic sequence of submissions, shared between the UI and workers
#[derive(Debug, Clone, Default)]
pub struct RequestGate {
    latest: Arc<AtomicU64>,
}

impl RequestGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new submission, superseding any in flight
    pub fn begin(&self) -> RequestTicket {
        RequestTicket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Invalidate the in-flight submission without starting another
    pub fn cancel(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::{Gender, Smoking};
    use std::cell::RefCell;

    /// Replays a canned response and records what was sent
    pub(crate) struct StubTransport {
        pub response: Result<RawResponse, PredictionError>,
        pub sent: RefCell<Vec<String>>,
    }

    impl StubTransport {
        pub(crate) fn ok(status: u16, body: &str) -> Self {
            Self {
                response: Ok(RawResponse { status, body: body.to_string() }),
                sent: RefCell::new(Vec::new()),
            }
        }
    }

    impl Transport for StubTransport {
        fn post_json(&self, body: String) -> Result<RawResponse, PredictionError> {
            self.sent.borrow_mut().push(body);
            self.response.clone()
        }
    }

    fn input() -> PredictionInput {
        PredictionInput {
            age: 55,
            bmi: 27.0,
            hba1c: 5.8,
            blood_glucose: 130.0,
            gender: Gender::Male,
            smoking: Smoking::Yes,
        }
    }

    #[test]
    fn test_success_with_confidence() {
        let client = PredictionClient::new(StubTransport::ok(
            200,
            r#"{"prediction":"Diabetic","confidence":"82%"}"#,
        ));
        let outcome = client.predict(&input()).unwrap();
        assert_eq!(outcome.prediction, Prediction::Diabetic);
        assert_eq!(outcome.confidence.as_deref(), Some("82%"));

        let sent = client.transport.sent.borrow();
        let body: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(body["blood_glucose"], 130.0);
        assert_eq!(body["gender"], "Male");
    }

    #[test]
    fn test_success_without_confidence() {
        let client = PredictionClient::new(StubTransport::ok(200, r#"{"prediction":"Non-Diabetic"}"#));
        let outcome = client.predict(&input()).unwrap();
        assert_eq!(outcome.prediction, Prediction::NonDiabetic);
        assert_eq!(outcome.confidence, None);
    }

    #[test]
    fn test_error_status_is_network_error() {
        let client = PredictionClient::new(StubTransport::ok(400, r#"{"error":"bad age"}"#));
        assert!(matches!(client.predict(&input()), Err(PredictionError::Network(_))));
    }

    #[test]
    fn test_unparsable_body_is_malformed() {
        for body in ["<html>", r#"{"result":"Diabetic"}"#, r#"{"prediction":"Unsure"}"#] {
            let client = PredictionClient::new(StubTransport::ok(200, body));
            assert!(
                matches!(client.predict(&input()), Err(PredictionError::MalformedResponse(_))),
                "body {}",
                body
            );
        }
    }

    #[test]
    fn test_transport_failure_passes_through() {
        let client = PredictionClient::new(StubTransport {
            response: Err(PredictionError::Network("connection refused".into())),
            sent: RefCell::new(Vec::new()),
        });
        assert_eq!(
            client.predict(&input()),
            Err(PredictionError::Network("connection refused".into()))
        );
    }

    #[test]
    fn test_http_transport_unreachable() {
        // Port freed by a listener that has just been dropped
        let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{}/predict", port);
        let client = PredictionClient::http(url, Duration::from_millis(500)).unwrap();
        assert!(matches!(client.predict(&input()), Err(PredictionError::Network(_))));
    }

    #[test]
    fn test_http_round_trip() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/predict")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "age": 55,
                "hba1c": 5.8,
                "blood_glucose": 130.0,
                "gender": "Male",
                "smoking": "Yes"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"prediction":"Diabetic","confidence":"82%"}"#)
            .create();

        let client =
            PredictionClient::http(format!("{}/predict", server.url()), Duration::from_secs(5)).unwrap();
        let outcome = client.predict(&input()).unwrap();
        assert_eq!(outcome.prediction, Prediction::Diabetic);
        assert_eq!(outcome.confidence.as_deref(), Some("82%"));
        mock.assert();
    }

    #[test]
    fn test_http_server_error() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/predict")
            .with_status(500)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"model missing"}"#)
            .create();

        let client =
            PredictionClient::http(format!("{}/predict", server.url()), Duration::from_secs(5)).unwrap();
        match client.predict(&input()) {
            Err(PredictionError::Network(msg)) => assert!(msg.contains("500"), "message: {}", msg),
            other => panic!("expected network error, got {:?}", other),
        }
        mock.assert();
    }

    #[test]
    fn test_gate_discards_stale_tickets() {
        let gate = RequestGate::new();
        let first = gate.begin();
        assert!(gate.is_current(first));
        let second = gate.begin();
        assert!(!gate.is_current(first));
        assert!(gate.is_current(second));
        assert!(second > first);

        gate.cancel();
        assert!(!gate.is_current(second));
    }
}
