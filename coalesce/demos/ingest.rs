// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Feeds both buffers from a few producer threads and prints what reaches the sinks.
//!
//! Run with `RUST_LOG=debug cargo run -p coalesce --example ingest` to see every flush.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use coalesce::{
    Bucket, Config, DataStore, Metric, Metrics, PeriodicFlush, SinkError, Transport,
    timesource::TimeSource,
};
use tracing_subscriber::EnvFilter;

const CONFIG: &str = r#"
[store]
granularity_ms = 1000
heartbeat_interval_ms = 200

[flush]
granularity_ms = 1000
"#;

/// Prints every write instead of persisting it
#[derive(Default)]
struct PrintingStore {
    writes: AtomicUsize,
}

impl DataStore for PrintingStore {
    fn persist(
        &self,
        entity_id: &str,
        bucket: Bucket,
        metrics: &Metrics,
    ) -> Result<(), SinkError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let values: Vec<String> = metrics
            .iter()
            .map(|(name, metric)| format!("{name}={}", metric.value()))
            .collect();
        println!("store     {entity_id:>6} @ {bucket}: {}", values.join(", "));
        Ok(())
    }
}

#[derive(Default)]
struct PrintingTransport {
    sends: AtomicUsize,
}

impl Transport for PrintingTransport {
    fn send(&self, payload: &str) -> Result<(), SinkError> {
        self.sends.fetch_add(1, Ordering::Relaxed);
        println!("transport {payload}");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_toml_str(CONFIG)?;

    let store = Arc::new(PrintingStore::default());
    let store_buffer = config.store.store_buffer(store.clone()).build();
    let heartbeat = PeriodicFlush::spawn(
        "store",
        store_buffer.clone(),
        config.store.heartbeat_interval(),
    );

    let transport = Arc::new(PrintingTransport::default());
    let flush_buffer = config.flush.flush_buffer(transport.clone()).build();
    let flusher = PeriodicFlush::spawn("ingest", flush_buffer.clone(), config.flush.interval());

    let clock = TimeSource::System;
    let producers: Vec<_> = ["alpha", "beta", "gamma"]
        .into_iter()
        .enumerate()
        .map(|(i, entity)| {
            let store_buffer = store_buffer.clone();
            let flush_buffer = flush_buffer.clone();
            let clock = clock.clone();
            thread::spawn(move || -> Result<usize, coalesce::BufferError> {
                let mut events = 0;
                for n in 0..60 {
                    let now = clock.now_millis();
                    let metrics = Metrics::new()
                        .with("requests", Metric::aggregate(1))
                        .with("queue_depth", Metric::absolute((n * (i + 1)) as i64));
                    store_buffer.persist(entity, now, metrics.clone())?;
                    flush_buffer.add(entity, now, metrics)?;
                    events += 1;
                    thread::sleep(Duration::from_millis(50));
                }
                Ok(events)
            })
        })
        .collect();

    let mut events = 0;
    for producer in producers {
        events += producer.join().map_err(|_| "producer panicked")??;
    }

    heartbeat.shutdown().await;
    flusher.shutdown().await;

    println!(
        "{events} events per buffer became {} store writes and {} transport sends",
        store.writes.load(Ordering::Relaxed),
        transport.sends.load(Ordering::Relaxed),
    );
    Ok(())
}
