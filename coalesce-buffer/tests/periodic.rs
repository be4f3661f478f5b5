// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::time::{Duration, UNIX_EPOCH};

use assert2::check;
use coalesce_buffer::{
    FlushBuffer, PeriodicFlush, StoreBuffer,
    test_util::{VecDataStore, VecTransport},
};
use coalesce_core::{Bucket, Metric, Metrics};
use coalesce_timesource::TimeSource;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn hits(n: i64) -> Metrics {
    Metrics::new().with("hits", Metric::aggregate(n))
}

#[tokio::test(start_paused = true)]
async fn flush_buffer_tick_sends_one_message_per_entry() {
    init_tracing();
    let transport = VecTransport::default();
    let buffer = FlushBuffer::builder()
        .transport(transport.clone())
        .granularity_millis(60_000)
        .build();
    let flusher = PeriodicFlush::spawn("ingest", buffer.clone(), Duration::from_secs(60));

    buffer.add("one", 1_000, hits(1)).unwrap();
    buffer.add("one", 2_000, hits(2)).unwrap();
    check!(buffer.len() == 1);

    tokio::time::sleep(Duration::from_secs(61)).await;
    check!(buffer.is_empty());
    let sent = transport.messages();
    check!(sent.len() == 1);
    check!(sent[0].entity_id == "one");
    check!(sent[0].timestamp == 0);
    check!(sent[0].metrics.get("hits").unwrap().value() == 3.into());

    // an idle tick sends nothing
    tokio::time::sleep(Duration::from_secs(60)).await;
    check!(transport.len() == 1);

    flusher.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_flushes_what_is_left() {
    init_tracing();
    let transport = VecTransport::default();
    let buffer = FlushBuffer::new(transport.clone());
    let flusher = PeriodicFlush::spawn("ingest", buffer.clone(), Duration::from_secs(60));

    buffer.add("one", 1_000, hits(1)).unwrap();
    buffer.add("two", 1_000, hits(1)).unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    check!(transport.is_empty());

    flusher.shutdown().await;
    check!(transport.len() == 2);
    check!(buffer.is_empty());
}

#[tokio::test(start_paused = true)]
async fn heartbeat_closes_windows_as_the_clock_moves() {
    init_tracing();
    let store = VecDataStore::default();
    let buffer = StoreBuffer::builder()
        .data_store(store.clone())
        .granularity_millis(60_000)
        .time_source(TimeSource::tokio(UNIX_EPOCH + Duration::from_secs(600)))
        .build();
    let flusher = PeriodicFlush::spawn("store", buffer.clone(), Duration::from_secs(10));

    buffer.persist("one", 600_000, hits(1)).unwrap();
    buffer.persist("two", 600_500, hits(1)).unwrap();

    tokio::time::sleep(Duration::from_secs(55)).await;
    check!(store.is_empty());

    // the tick at 60s sees the next bucket
    tokio::time::sleep(Duration::from_secs(10)).await;
    check!(store.len() == 2);
    check!(buffer.current_bucket() == None);

    // an unexpired window is drained on shutdown
    buffer.persist("one", 665_000, hits(5)).unwrap();
    flusher.shutdown().await;
    let written = store.take();
    check!(written.len() == 3);
    let last = written.last().unwrap();
    check!(last.bucket() == Bucket::from_start_millis(660_000));
    check!(last.data().get("hits").unwrap().value() == 5.into());
}
