//! JSON-RPC status probe.
//!
//! Three fixed read-only queries, one attempt each, never fatal.

use crate::report::ReportBuffer;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use znn_diag_common::{Error, Result};

/// The three status queries issued per run.
pub const RPC_METHODS: [&str; 3] = ["stats.osInfo", "stats.processInfo", "stats.networkInfo"];

/// Fixed request id used by every probe call.
pub const RPC_REQUEST_ID: u64 = 40;

const RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of a single call.
#[derive(Debug)]
pub enum RpcOutcome {
    /// Response body parsed as JSON.
    Valid(Value),
    /// Response arrived but the body is not JSON; raw body kept verbatim.
    InvalidJson(String),
    /// Transport failure or timeout.
    Transport(String),
}

pub struct RpcProbe {
    client: reqwest::Client,
    endpoint: String,
}

impl RpcProbe {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(RPC_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Issue the fixed status queries sequentially and record each outcome.
    pub async fn run(&self, report: &mut ReportBuffer) {
        for method in RPC_METHODS {
            report.section(&format!("RPC {method}"));
            let outcome = self.call(method).await;
            for line in render_outcome(method, &outcome) {
                report.line(line);
            }
        }
    }

    async fn call(&self, method: &str) -> RpcOutcome {
        debug!("rpc call: {} -> {}", method, self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&envelope(method))
            .send()
            .await;

        let body = match response {
            Ok(response) => match response.text().await {
                Ok(body) => body,
                Err(e) => return RpcOutcome::Transport(e.to_string()),
            },
            Err(e) => return RpcOutcome::Transport(e.to_string()),
        };

        match serde_json::from_str::<Value>(&body) {
            Ok(value) => RpcOutcome::Valid(value),
            Err(_) => RpcOutcome::InvalidJson(body),
        }
    }
}

/// Build the JSON-RPC 2.0 envelope for one method.
pub fn envelope(method: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": RPC_REQUEST_ID,
        "method": method,
        "params": [],
    })
}

/// Render one outcome as report lines; every failure names its method.
pub fn render_outcome(method: &str, outcome: &RpcOutcome) -> Vec<String> {
    match outcome {
        RpcOutcome::Valid(value) => {
            let pretty =
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
            pretty.lines().map(str::to_string).collect()
        }
        RpcOutcome::InvalidJson(body) => vec![
            format!("ERROR: {method} returned invalid JSON:"),
            body.clone(),
        ],
        RpcOutcome::Transport(reason) => {
            vec![format!("ERROR: {method} request failed: {reason}")]
        }
    }
}
