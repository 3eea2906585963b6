use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use mah_config::{ConfigStore, MemoryStorage, UlidSessionKeys};
use serde_json::Value;

use crate::transport::{OutboundRequest, Transport};

/// Records every request as it starts. Can fail, stall or panic per destination.
#[derive(Default)]
pub struct RecordingTransport {
    requests: Mutex<Vec<OutboundRequest>>,
    failing: Vec<String>,
    slow: Vec<(String, Duration)>,
    panicking: Vec<String>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_on(destinations: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            failing: destinations.iter().map(|d| d.to_string()).collect(),
            ..Self::default()
        })
    }

    pub fn slow_on(destination: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            slow: vec![(destination.to_string(), delay)],
            ..Self::default()
        })
    }

    pub fn panicking_on(destination: &str) -> Arc<Self> {
        Arc::new(Self {
            panicking: vec![destination.to_string()],
            ..Self::default()
        })
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, destination: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.destination == destination)
            .count()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn post(&self, request: &OutboundRequest) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        if self.panicking.contains(&request.destination) {
            panic!("transport blew up for {}", request.destination);
        }
        if let Some((_, delay)) = self.slow.iter().find(|(d, _)| *d == request.destination) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(&request.destination) {
            bail!("connection refused");
        }
        Ok(())
    }
}

pub fn memory_store(document: Value) -> Arc<ConfigStore> {
    let storage = Arc::new(MemoryStorage::from_json(document));
    Arc::new(ConfigStore::open(storage, Arc::new(UlidSessionKeys)).unwrap())
}
