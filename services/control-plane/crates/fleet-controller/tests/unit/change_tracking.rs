//! Tests for change marking and the atomic drain.

#![allow(clippy::expect_used)]

use std::sync::Arc;

use fleet_common::{ChangeFlag, ChangeSet};
use fleet_controller::application::ports::ChangeTracker;
use fleet_controller::application::services::changes::{
    drain, mark, mark_config_changed, mark_flags,
};
use fleet_controller::error::ErrorKind;
use fleet_controller::infra::MemoryChangeTracker;
use proptest::prelude::*;

use crate::fixtures::node_id;

#[tokio::test]
async fn drain_without_record_is_not_found() {
    let tracker = MemoryChangeTracker::new();
    let err = drain(&tracker, &node_id("ghost"))
        .await
        .expect_err("no record");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn fresh_record_drains_all_false_and_stays_clear() {
    let tracker = MemoryChangeTracker::new();
    let node = node_id("edge-1");
    tracker.register(&node).await.expect("register");

    for _ in 0..2 {
        let response = drain(&tracker, &node).await.expect("drain");
        assert_eq!(ChangeSet::from(response), ChangeSet::empty());
    }
}

#[tokio::test]
async fn drain_reports_wire_names_once() {
    let tracker = MemoryChangeTracker::new();
    let node = node_id("edge-1");
    mark_flags(
        &tracker,
        &node,
        [
            (ChangeFlag::WorkloadList, true),
            (ChangeFlag::Proxy, true),
            (ChangeFlag::Reboot, false),
        ],
    )
    .await
    .expect("mark");

    let first = drain(&tracker, &node).await.expect("drain");
    assert!(first.microservice_list);
    assert!(first.tunnel);
    assert!(!first.reboot);
    let json = serde_json::to_value(&first).expect("serialize");
    assert_eq!(json["microserviceList"], true);

    let second = drain(&tracker, &node).await.expect("drain");
    assert!(!second.microservice_list && !second.tunnel);
}

#[tokio::test]
async fn false_flag_does_not_clear_pending_change() {
    let tracker = MemoryChangeTracker::new();
    let node = node_id("edge-1");
    mark(&tracker, &node, ChangeFlag::Config.into()).await.expect("mark");
    mark_flags(&tracker, &node, [(ChangeFlag::Config, false)])
        .await
        .expect("mark false");
    assert!(drain(&tracker, &node).await.expect("drain").config);
}

#[tokio::test]
async fn config_change_flag_is_conditional() {
    let tracker = MemoryChangeTracker::new();
    let node = node_id("edge-1");
    tracker.register(&node).await.expect("register");

    mark_config_changed(&tracker, &node, false).await.expect("noop");
    assert!(!drain(&tracker, &node).await.expect("drain").microservice_config);
    assert_eq!(tracker.config_stamp(&node), None);

    mark_config_changed(&tracker, &node, true).await.expect("mark");
    assert!(tracker.config_stamp(&node).is_some());
    assert!(drain(&tracker, &node).await.expect("drain").microservice_config);
}

/// Writers and a polling drainer race on one node; every flag any writer set
/// must show up in some drain.
async fn race(writes: Vec<ChangeSet>) -> (ChangeSet, ChangeSet) {
    let tracker = Arc::new(MemoryChangeTracker::new());
    let node = node_id("edge-1");
    tracker.register(&node).await.expect("register");

    let expected = writes.iter().fold(ChangeSet::empty(), |acc, s| acc.union(*s));
    let writers: Vec<_> = writes
        .into_iter()
        .map(|changes| {
            let tracker = Arc::clone(&tracker);
            let node = node.clone();
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                tracker.mark(&node, changes, None).await.expect("mark");
            })
        })
        .collect();

    let poller = {
        let tracker = Arc::clone(&tracker);
        let node = node.clone();
        tokio::spawn(async move {
            let mut seen = ChangeSet::empty();
            for _ in 0..32 {
                let drained = tracker.drain(&node).await.expect("drain").expect("record");
                seen = seen.union(drained);
                tokio::task::yield_now().await;
            }
            seen
        })
    };

    for writer in writers {
        writer.await.expect("join writer");
    }
    let mut seen = poller.await.expect("join poller");
    seen = seen.union(tracker.drain(&node).await.expect("drain").expect("record"));
    (seen, expected)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_marks_are_never_lost() {
    let (seen, expected) = race(vec![
        ChangeFlag::Config.into(),
        ChangeFlag::Routing.into(),
        ChangeSet::from(ChangeFlag::Version).with(ChangeFlag::Diagnostics),
    ])
    .await;
    assert_eq!(seen, expected);
}

fn change_set() -> impl Strategy<Value = ChangeSet> {
    any::<u16>().prop_map(ChangeSet::from_bits_truncate)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The union of all drains equals the union of all marks.
    #[test]
    fn prop_no_flag_is_lost(writes in prop::collection::vec(change_set(), 1..12)) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .build()
            .expect("runtime");
        let (seen, expected) = runtime.block_on(race(writes));
        prop_assert_eq!(seen, expected);
    }
}
