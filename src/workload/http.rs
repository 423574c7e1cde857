use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::TargetConfig;
use crate::error::Result;

use super::{CheckResult, Iteration, Outcome, Workload};

/// POSTs the configured JSON body at a fixed URL and classifies the response.
pub struct HttpWorkload {
    client: Client,
    url: String,
    body: serde_json::Value,
    expected_status: u16,
    check_name: String,
}

impl HttpWorkload {
    pub fn new(config: &TargetConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            body: config.body.clone(),
            expected_status: config.expected_status,
            check_name: format!("status was {}", config.expected_status),
        })
    }
}

/// Coarse failure kind for aggregation.
fn classify(e: &reqwest::Error) -> &'static str {
    if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connect"
    } else {
        "request"
    }
}

#[async_trait]
impl Workload for HttpWorkload {
    async fn run_once(&self) -> Iteration {
        let start = Instant::now();
        // .json() also sets Content-Type: application/json
        let result = self.client.post(&self.url).json(&self.body).send().await;
        let latency = start.elapsed();

        let outcome = match result {
            Ok(response) => Outcome {
                status: Some(response.status().as_u16()),
                latency,
                error: None,
            },
            Err(e) => Outcome {
                status: None,
                latency,
                error: Some(classify(&e).to_string()),
            },
        };

        let pass = outcome.status == Some(self.expected_status);
        Iteration {
            check: CheckResult {
                name: self.check_name.clone(),
                pass,
            },
            outcome,
        }
    }
}
