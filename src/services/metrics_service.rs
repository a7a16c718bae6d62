use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use statsd::Client;

/// Fire-and-forget statsd counters and timers. Sends never fail a request.
#[derive(Clone)]
pub struct MetricsService {
    client: Arc<Client>,
}

impl MetricsService {
    pub fn new(host: &str, port: u16, prefix: &str) -> Result<Self> {
        let client = Client::new(format!("{}:{}", host, port), prefix)
            .map_err(|e| anyhow::anyhow!("{:?}", e))
            .with_context(|| format!("Failed to create statsd client for {}:{}", host, port))?;
        Ok(Self {
            client: Arc::new(client),
        })
    }

    pub fn increment(&self, metric: &str, tags: Option<HashMap<String, String>>) {
        self.client.incr(&tagged(metric, tags));
    }

    pub fn timing(&self, metric: &str, duration: Duration, tags: Option<HashMap<String, String>>) {
        self.client
            .timer(&tagged(metric, tags), duration.as_millis() as f64);
    }
}

fn tagged(metric: &str, tags: Option<HashMap<String, String>>) -> String {
    match tags {
        Some(tags) if !tags.is_empty() => {
            let mut pairs = tags
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<String>>();
            pairs.sort();
            format!("{}#{}", metric, pairs.join(","))
        }
        _ => metric.to_string(),
    }
}
