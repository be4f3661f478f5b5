// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::thread;

use assert2::{check, let_assert};
use coalesce_buffer::{StoreBuffer, test_util::VecDataStore};
use coalesce_core::{Bucket, Granularity, Metric, Metrics, Number};
use coalesce_timesource::{TimeSource, fakes::ManuallyAdvancedTimeSource};

const G: i64 = Granularity::DEFAULT.as_millis();

fn a() -> Metrics {
    Metrics::new()
        .with("fluffies", Metric::aggregate(1))
        .with("bunnies", Metric::aggregate(2))
        .with("growlies", Metric::aggregate(3))
        .with("monkeys", Metric::absolute(999))
}

fn b() -> Metrics {
    Metrics::new()
        .with("fluffies", Metric::aggregate(1))
        .with("growlies", Metric::aggregate(2))
        .with("dinkies", Metric::aggregate(3))
        .with("monkeys", Metric::absolute(888))
        .with("peanuts", Metric::absolute(777))
}

fn value(metrics: &Metrics, name: &str) -> Number {
    let_assert!(Some(metric) = metrics.get(name));
    metric.value()
}

fn store_buffer(
    store: VecDataStore,
    clock: &ManuallyAdvancedTimeSource,
) -> StoreBuffer<VecDataStore> {
    StoreBuffer::builder()
        .data_store(store)
        .time_source(TimeSource::custom(clock.clone()))
        .build()
}

#[test]
fn heartbeat_flushes_once_the_bucket_has_passed() {
    let clock = ManuallyAdvancedTimeSource::at_millis(1_000);
    let store = VecDataStore::default();
    let buffer = store_buffer(store.clone(), &clock);

    buffer.heartbeat();
    buffer.persist("one", 1_000, a()).unwrap();
    buffer.persist("two", 1_000, a()).unwrap();
    buffer.persist("two", 1_000, b()).unwrap();
    check!(store.len() == 0);

    clock.set_millis(1_000 + G);
    buffer.heartbeat();
    check!(store.len() == 2);
}

#[test]
fn forward_write_flushes_merged_window() {
    let clock = ManuallyAdvancedTimeSource::at_millis(0);
    let store = VecDataStore::default();
    let buffer = store_buffer(store.clone(), &clock);
    let ts = 100;

    buffer.persist("one", ts, a()).unwrap();
    buffer.persist("two", ts, a()).unwrap();
    buffer.persist("two", ts, b()).unwrap();
    check!(store.len() == 0);

    buffer.persist("one", ts + G, b()).unwrap();
    check!(store.len() == 2);

    let written = store.written_for("one");
    let_assert!([one] = written.as_slice());
    check!(one.bucket() == Bucket::from_start_millis(0));
    check!(one.data() == &a());

    let written = store.written_for("two");
    let_assert!([two] = written.as_slice());
    let mut ab = a();
    ab.merge(b());
    check!(two.data() == &ab);
    check!(two.data().len() == 6);
    check!(value(two.data(), "fluffies") == 2.into());
    check!(value(two.data(), "growlies") == 5.into());
    check!(value(two.data(), "monkeys") == 888.into());
    check!(value(two.data(), "peanuts") == 777.into());

    // the triggering write opened the next window on its own
    check!(buffer.current_bucket() == Some(Bucket::from_start_millis(G)));
    check!(buffer.pending("one") == Some(b()));
    check!(buffer.pending_entities() == 1);
}

#[test]
fn metrics_from_the_past_and_the_future() {
    let clock = ManuallyAdvancedTimeSource::at_millis(0);
    let store = VecDataStore::default();
    let buffer = store_buffer(store.clone(), &clock);

    buffer.persist("one", G * 2, a()).unwrap();
    buffer.persist("one", G * 2, a()).unwrap();
    check!(store.len() == 0);

    // late writes go straight through, one write each
    buffer.persist("one", G, a()).unwrap();
    check!(store.len() == 1);
    buffer.persist("one", G, a()).unwrap();
    check!(store.len() == 2);
    for late in store.written() {
        check!(late.bucket() == Bucket::from_start_millis(G));
        check!(late.data() == &a());
    }
    check!(buffer.current_bucket() == Some(Bucket::from_start_millis(G * 2)));

    buffer.persist("one", G * 2, a()).unwrap();
    check!(store.len() == 2);
    check!(value(&buffer.pending("one").unwrap(), "fluffies") == 3.into());

    buffer.persist("one", G * 3, a()).unwrap();
    check!(store.len() == 3);
    let flushed = store.take().pop().unwrap();
    check!(flushed.bucket() == Bucket::from_start_millis(G * 2));
    check!(value(flushed.data(), "fluffies") == 3.into());
    check!(value(flushed.data(), "monkeys") == 999.into());
}

#[test]
fn concurrent_writers_lose_nothing() {
    const THREADS: i64 = 8;
    const WRITES: i64 = 500;

    let store = VecDataStore::default();
    let buffer = StoreBuffer::builder()
        .data_store(store.clone())
        .granularity_millis(100)
        .build();

    let handles: Vec<_> = (0..THREADS)
        .map(|worker| {
            let buffer = buffer.clone();
            thread::spawn(move || {
                let entity = format!("entity-{}", worker % 3);
                for i in 0..WRITES {
                    // timestamps move forward, with the occasional late write
                    let ts = 1 + i * 10 - (i % 7) * 40;
                    let one = Metrics::new().with("n", Metric::aggregate(1));
                    buffer.persist(&entity, ts.max(1), one).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    buffer.drain();

    let total: i64 = store
        .written()
        .iter()
        .map(|entry| value(entry.data(), "n").as_i64().unwrap())
        .sum();
    check!(total == THREADS * WRITES);
    check!(buffer.pending_entities() == 0);
}
