//! ---
//! gse_section: "11-test-harness"
//! gse_subsection: "01-engine"
//! gse_type: "source"
//! gse_scope: "code"
//! gse_description: "End-to-end wait/assert behaviour against an in-memory link."
//! gse_version: "v0.1.0"
//! gse_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::{Duration, Instant};

use gse_common::WaitConfig;
use gse_msg::{InMemoryTransport, NameDirectory, RawItem, Value};
use gse_testharness::{Category, Expected, HarnessError, Selector, TestApi, Timeout, ANYTHING};

const CMD_NO_OP: u32 = 0x01;

fn harness() -> (TestApi, InMemoryTransport) {
    gse_common::init_test();
    let transport = InMemoryTransport::new();
    let directory = NameDirectory::new()
        .with_event(7, "OpCodeDispatched")
        .with_event(8, "OpCodeCompleted")
        .with_channel(12, "CommandsDispatched")
        .with_command("CMD_NO_OP", CMD_NO_OP);
    let wait = WaitConfig {
        default_timeout: Duration::from_secs(5),
        poll_interval: Duration::from_millis(10),
    };
    let api = TestApi::with_wait_config(Arc::new(transport.clone()), directory, &wait);
    (api, transport)
}

#[tokio::test]
async fn waits_for_two_dispatch_events() {
    let (mut api, transport) = harness();
    transport.extend([RawItem::event(7, ["ok"]), RawItem::event(7, ["ok"])]);

    api.wait_assert_evr_size(2, Some("OpCodeDispatched"), None, Duration::from_secs(5))
        .await
        .expect("both events are queued");
    assert_eq!(transport.pending(), 0);
    assert_eq!(api.history().len(Category::Event), 2);
}

#[tokio::test]
async fn late_arrivals_satisfy_a_pending_wait() {
    let (mut api, transport) = harness();
    let link = transport.clone();
    tokio::spawn(async move {
        for count in 1..=3 {
            tokio::time::sleep(Duration::from_millis(15)).await;
            link.push(RawItem::telemetry(12, count));
        }
    });

    api.wait_assert_tlm_ge(3, Some("CommandsDispatched"), Selector::Any, Timeout::Default)
        .await
        .expect("third sample arrives");
    api.assert_tlm_size(3, Some("CommandsDispatched"), None)
        .expect("three samples recorded");
}

#[tokio::test]
async fn timeout_does_not_leak_into_the_next_wait() {
    let (mut api, transport) = harness();

    let started = Instant::now();
    let err = api
        .wait_assert_evr_size(1, Some("OpCodeCompleted"), None, Timeout::millis(80))
        .await
        .expect_err("nothing arrives");
    assert!(started.elapsed() >= Duration::from_millis(70));
    let failure = err.as_assertion().expect("assertion failure");
    assert!(failure.is_timeout());
    assert!(failure.to_string().contains("Timeout reached"));
    assert!(!api.engine().deadline_armed());

    let link = transport.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        link.push(RawItem::event(8, [CMD_NO_OP]));
    });
    api.wait_assert_evr_size(1, Some("OpCodeCompleted"), None, Timeout::millis(1_000))
        .await
        .expect("second wait outlives the first deadline");
}

#[tokio::test]
async fn immediate_failures_drain_the_backlog_first() {
    let (mut api, transport) = harness();
    transport.extend([RawItem::event(7, [CMD_NO_OP]), RawItem::telemetry(12, 1)]);

    let err = api
        .wait_assert_evr_size(2, Some("OpCodeDispatched"), None, Timeout::Immediate)
        .await
        .expect_err("only one dispatch queued");
    let failure = err.as_assertion().expect("assertion failure");
    assert!(!failure.is_timeout());
    assert!(failure.message().starts_with("Unable to meet assertion."));
    assert!(failure.message().contains("CommandsDispatched"));
    assert_eq!(transport.pending(), 0);
}

#[tokio::test]
async fn reset_discards_stale_items() {
    let (mut api, transport) = harness();
    transport.extend([RawItem::event(7, [1]), RawItem::event(7, [2])]);
    api.update().await.expect("update");

    transport.push(RawItem::event(8, [1]));
    assert_eq!(api.reset().await.expect("reset"), 1);
    assert_eq!(api.update().await.expect("update"), 0);
    assert!(api.history().is_empty());

    transport.extend((0..5).map(|n| RawItem::telemetry(12, n)));
    assert_eq!(api.update().await.expect("update"), 5);
}

#[tokio::test]
async fn index_selectors_are_bounds_checked() {
    let (mut api, transport) = harness();
    transport.push(RawItem::event(8, [CMD_NO_OP]));

    let err = api
        .wait_assert_evr(
            Expected::list([ANYTHING]),
            Some("OpCodeCompleted"),
            Selector::At(1),
            Timeout::Immediate,
        )
        .await
        .expect_err("only one record exists");
    assert!(matches!(err, HarnessError::SelectorOutOfRange { index: 1, len: 1, .. }));
    assert!(err.is_assertion());

    api.assert_evr(
        Expected::list([Value::from(CMD_NO_OP)]),
        Some("OpCodeCompleted"),
        Selector::At(0),
    )
    .expect("first record matches");

    let err = api
        .wait_assert_evr(
            Expected::list([ANYTHING]),
            Some("OpCodeCompleted"),
            Selector::At(1),
            Timeout::millis(40),
        )
        .await
        .expect_err("second record never arrives");
    assert!(matches!(err, HarnessError::SelectorOutOfRange { index: 1, len: 1, .. }));
}

#[tokio::test]
async fn index_selectors_wait_for_queued_records() {
    let (mut api, transport) = harness();
    transport.push(RawItem::event(8, [CMD_NO_OP]));

    api.wait_assert_evr(
        Expected::list([Value::from(CMD_NO_OP)]),
        Some("OpCodeCompleted"),
        Selector::At(0),
        Timeout::secs(1),
    )
    .await
    .expect("queued record is drained before indexing");
    assert_eq!(transport.pending(), 0);
}

#[tokio::test]
async fn index_selectors_wait_for_late_records() {
    let (mut api, transport) = harness();
    let link = transport.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        link.push(RawItem::event(8, [CMD_NO_OP]));
        tokio::time::sleep(Duration::from_millis(30)).await;
        link.push(RawItem::event(8, [2]));
    });

    api.wait_assert_evr(
        Expected::list([Value::from(2)]),
        Some("OpCodeCompleted"),
        Selector::At(1),
        Timeout::secs(1),
    )
    .await
    .expect("second record arrives within the deadline");
    api.assert_evr_size(2, Some("OpCodeCompleted"), None)
        .expect("both completions recorded");
}

#[tokio::test]
async fn send_then_wait_for_completion() {
    let (mut api, transport) = harness();
    transport.respond_to(
        CMD_NO_OP,
        vec![
            RawItem::event(7, [CMD_NO_OP]),
            RawItem::telemetry(12, 1),
            RawItem::event(8, [CMD_NO_OP]),
        ],
    );

    let outcome = api
        .send_wait_evr("CMD_NO_OP", vec![], "OpCodeCompleted", Timeout::secs(1))
        .await
        .expect("no transport error");
    assert!(outcome.found);
    api.assert_evr_eq(
        Expected::list([Value::from(CMD_NO_OP)]),
        Some("OpCodeDispatched"),
        Selector::All,
    )
    .expect("dispatch carries the opcode");
    api.assert_tlm_is(1, Some("CommandsDispatched"), Selector::At(0))
        .expect("counter is an integer 1");
    assert!(api
        .assert_tlm_is(1.0, Some("CommandsDispatched"), Selector::At(0))
        .is_err());
}
