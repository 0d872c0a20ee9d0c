use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use holdfast::page::memory::{MemoryNode, MemoryPage};
use holdfast::{
    Action, AttemptOutcome, DescriptorError, Engine, FailureReason, ResolutionOutcome,
    StatePredicate, Strategy, StrategyDescriptor, WaitPolicy,
};

fn engine_over(page: MemoryPage) -> Engine<MemoryPage> {
    Engine::new(Arc::new(page))
}

fn quick() -> WaitPolicy {
    WaitPolicy::new()
        .with_timeout_ms(400)
        .with_poll_interval(Duration::from_millis(20))
}

fn patient() -> WaitPolicy {
    WaitPolicy::new()
        .with_timeout_ms(2_000)
        .with_poll_interval(Duration::from_millis(20))
}

fn submit_descriptor() -> StrategyDescriptor {
    StrategyDescriptor::new(vec![
        Strategy::TestId("submit-order".into()),
        Strategy::Css(".btn-primary".into()),
    ])
    .unwrap()
}

/// Trading-terminal shaped page: two primary buttons, one carrying the
/// test id.
fn terminal_page() -> (MemoryPage, holdfast::ElementRef) {
    let page = MemoryPage::new().with_url("file:///terminal.html");
    let submit = page.insert(
        MemoryNode::new("button")
            .role("button")
            .class("btn")
            .class("btn-primary")
            .test_id("submit-order")
            .text("Submit Order"),
    );
    page.insert(
        MemoryNode::new("button")
            .role("button")
            .class("btn")
            .class("btn-primary")
            .text("Cancel Order"),
    );
    (page, submit)
}

// ── Resolution ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_priority_strategy_wins_over_ambiguous_fallback() {
    let (page, submit) = terminal_page();
    let engine = engine_over(page);

    let outcome = engine
        .resolve(&submit_descriptor(), &quick(), &CancellationToken::new())
        .await;

    match outcome {
        ResolutionOutcome::Found {
            element,
            strategy_index,
        } => {
            assert_eq!(strategy_index, 0, "test-id must win, never the css fallback");
            assert_eq!(element, submit);
        }
        other => panic!("expected Found, got {other:?}"),
    }
}

#[tokio::test]
async fn test_not_found_records_one_attempt_per_strategy() {
    let page = MemoryPage::new();
    let engine = engine_over(page);
    let descriptor = StrategyDescriptor::new(vec![
        Strategy::TestId("submit-order".into()),
        Strategy::Text("Submit".into()),
        Strategy::Css(".btn-primary".into()),
    ])
    .unwrap();

    let outcome = engine
        .resolve(&descriptor, &quick(), &CancellationToken::new())
        .await;

    let ResolutionOutcome::NotFound(attempts) = outcome else {
        panic!("expected NotFound");
    };
    assert_eq!(attempts.tried.len(), 3);
    assert!(attempts
        .tried
        .iter()
        .all(|a| a.outcome == AttemptOutcome::NoMatch && a.match_count == 0));
    assert!(!attempts.cancelled);
}

#[tokio::test]
async fn test_multi_match_only_is_ambiguous_never_found() {
    let page = MemoryPage::new();
    page.insert(MemoryNode::new("button").class("btn-primary").text("Buy"));
    page.insert(MemoryNode::new("button").class("btn-primary").text("Buy"));
    let engine = engine_over(page);

    let descriptor = StrategyDescriptor::new(vec![
        Strategy::Text("Buy".into()),
        Strategy::Css(".btn-primary".into()),
    ])
    .unwrap();

    let outcome = engine
        .resolve(&descriptor, &quick(), &CancellationToken::new())
        .await;

    match outcome {
        ResolutionOutcome::Ambiguous {
            count,
            strategy_index,
            attempts,
        } => {
            assert_eq!(count, 2);
            assert_eq!(strategy_index, 0, "highest-priority ambiguous strategy");
            assert_eq!(attempts.tried.len(), 2);
            assert!(attempts
                .tried
                .iter()
                .all(|a| a.outcome == AttemptOutcome::Ambiguous));
        }
        other => panic!("expected Ambiguous, got {other:?}"),
    }
}

#[tokio::test]
async fn test_resolution_waits_for_element_to_appear() {
    let page = Arc::new(MemoryPage::new());
    let engine = Engine::new(page.clone());

    let mutator = page.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(120)).await;
        mutator.insert(MemoryNode::new("button").test_id("submit-order").text("Go"));
    });

    let outcome = engine
        .resolve(&submit_descriptor(), &patient(), &CancellationToken::new())
        .await;
    assert!(outcome.is_found(), "auto-wait should pick up the late node");
}

#[tokio::test]
async fn test_visible_gate_defers_hidden_single_match() {
    let page = MemoryPage::new();
    page.insert(
        MemoryNode::new("button")
            .test_id("submit-order")
            .text("Submit")
            .hidden(),
    );
    let engine = engine_over(page);
    let descriptor = StrategyDescriptor::new(vec![Strategy::TestId("submit-order".into())])
        .unwrap();

    let outcome = engine
        .resolve(&descriptor, &quick(), &CancellationToken::new())
        .await;
    let ResolutionOutcome::NotFound(attempts) = outcome else {
        panic!("hidden element must not resolve under require_visible");
    };
    assert_eq!(attempts.tried[0].outcome, AttemptOutcome::NotActionable);
    assert_eq!(attempts.tried[0].match_count, 1);

    let relaxed = quick().with_require_visible(false).with_require_enabled(false);
    let outcome = engine
        .resolve(&descriptor, &relaxed, &CancellationToken::new())
        .await;
    assert!(outcome.is_found());
}

#[tokio::test]
async fn test_cancellation_aborts_well_before_timeout() {
    let page = MemoryPage::new();
    let engine = engine_over(page);
    let descriptor = submit_descriptor();

    let policy = WaitPolicy::new()
        .with_timeout_ms(5_000)
        .with_poll_interval(Duration::from_millis(20));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let outcome = engine.resolve(&descriptor, &policy, &cancel).await;
    let elapsed = started.elapsed();

    assert!(outcome.was_cancelled(), "expected the cancelled flag");
    assert!(
        elapsed < Duration::from_millis(1_500),
        "cancellation took {elapsed:?}, should abort promptly"
    );
}

// ── Actions ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_click_on_resolved_element() {
    let (page, submit) = terminal_page();
    let page = Arc::new(page);
    let engine = Engine::new(page.clone());

    let result = engine
        .perform(
            &submit_descriptor(),
            &Action::Click,
            &quick(),
            &CancellationToken::new(),
        )
        .await;
    assert!(result.is_ok(), "click failed: {result:?}");
    assert_eq!(page.click_count(&submit), 1);
}

#[tokio::test]
async fn test_fill_then_read_round_trip() {
    let page = MemoryPage::new();
    page.insert(
        MemoryNode::new("input")
            .test_id("symbol-input")
            .placeholder("Symbol"),
    );
    let engine = engine_over(page);
    let descriptor =
        StrategyDescriptor::new(vec![Strategy::TestId("symbol-input".into())]).unwrap();

    let cancel = CancellationToken::new();
    let filled = engine
        .perform(&descriptor, &Action::Fill("AAPL".into()), &quick(), &cancel)
        .await;
    assert!(filled.is_ok(), "fill failed: {filled:?}");

    let read = engine
        .perform(&descriptor, &Action::Read, &quick(), &cancel)
        .await;
    assert_eq!(read.value(), Some("AAPL"));
}

#[tokio::test]
async fn test_transforming_input_raises_value_mismatch() {
    let page = MemoryPage::new();
    page.insert(MemoryNode::new("input").test_id("symbol-input"));
    page.set_input_transform(|s| s.to_uppercase());
    let engine = engine_over(page);
    let descriptor =
        StrategyDescriptor::new(vec![Strategy::TestId("symbol-input".into())]).unwrap();

    let result = engine
        .perform(
            &descriptor,
            &Action::Fill("aapl".into()),
            &quick(),
            &CancellationToken::new(),
        )
        .await;

    match result.reason() {
        Some(FailureReason::ValueMismatch { expected, actual }) => {
            assert_eq!(expected, "aapl");
            assert_eq!(actual, "AAPL");
        }
        other => panic!("expected ValueMismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn test_act_on_not_found_short_circuits_with_diagnostics() {
    let page = MemoryPage::new().with_url("file:///terminal.html");
    let engine = engine_over(page);
    let descriptor = submit_descriptor();

    let result = engine
        .perform(
            &descriptor,
            &Action::Click,
            &quick(),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.reason(), Some(&FailureReason::NotFound));
    let diagnostics = result.diagnostics().unwrap();
    assert_eq!(diagnostics.page_url, "file:///terminal.html");
    assert_eq!(diagnostics.attempts.len(), 2);
    assert!(diagnostics.elapsed_ms >= 400);
}

#[tokio::test]
async fn test_act_on_ambiguous_refuses_to_guess() {
    let page = MemoryPage::new();
    page.insert(MemoryNode::new("button").class("btn-primary").text("Buy"));
    page.insert(MemoryNode::new("button").class("btn-primary").text("Buy"));
    let engine = engine_over(page);
    let descriptor = StrategyDescriptor::new(vec![
        Strategy::Text("Buy".into()),
        Strategy::Css(".btn-primary".into()),
    ])
    .unwrap();

    let result = engine
        .perform(
            &descriptor,
            &Action::Click,
            &quick(),
            &CancellationToken::new(),
        )
        .await;
    assert_eq!(
        result.reason(),
        Some(&FailureReason::Ambiguous { count: 2 })
    );
}

#[tokio::test]
async fn test_stale_handle_recovers_through_one_re_resolution() {
    let (page, submit) = terminal_page();
    let page = Arc::new(page);
    let engine = Engine::new(page.clone());
    let descriptor = submit_descriptor();
    let cancel = CancellationToken::new();

    let outcome = engine.resolve(&descriptor, &quick(), &cancel).await;
    assert!(outcome.is_found());

    // Simulate a feed-driven re-render: the node is rebuilt between
    // resolution and action.
    page.remove(&submit);
    let rebuilt = page.insert(
        MemoryNode::new("button")
            .role("button")
            .class("btn-primary")
            .test_id("submit-order")
            .text("Submit Order"),
    );

    let result = engine
        .act(&descriptor, outcome, &Action::Click, &quick(), &cancel)
        .await;
    assert!(result.is_ok(), "expected recovery, got {result:?}");
    assert_eq!(page.click_count(&rebuilt), 1);
}

#[tokio::test]
async fn test_stale_handle_escalates_when_gone_for_good() {
    let (page, submit) = terminal_page();
    let page = Arc::new(page);
    let engine = Engine::new(page.clone());
    // Only the test id addresses the submit button; once removed, nothing
    // else single-matches.
    let descriptor =
        StrategyDescriptor::new(vec![Strategy::TestId("submit-order".into())]).unwrap();
    let cancel = CancellationToken::new();

    let outcome = engine.resolve(&descriptor, &quick(), &cancel).await;
    assert!(outcome.is_found());

    page.remove(&submit);

    let result = engine
        .act(&descriptor, outcome, &Action::Click, &quick(), &cancel)
        .await;
    assert_eq!(result.reason(), Some(&FailureReason::StaleElement));
}

#[tokio::test]
async fn test_obscured_element_blocks_then_recovers() {
    let (page, submit) = terminal_page();
    let page = Arc::new(page);
    let engine = Engine::new(page.clone());
    let descriptor = submit_descriptor();
    let cancel = CancellationToken::new();

    page.set_obscured(&submit, true);
    let result = engine
        .perform(&descriptor, &Action::Click, &quick(), &cancel)
        .await;
    assert_eq!(result.reason(), Some(&FailureReason::StaleElement));
    assert_eq!(page.click_count(&submit), 0);

    page.set_obscured(&submit, false);
    let result = engine
        .perform(&descriptor, &Action::Click, &quick(), &cancel)
        .await;
    assert!(result.is_ok());
    assert_eq!(page.click_count(&submit), 1);
}

// ── Assertions ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_hidden_assertion_succeeds_on_absence() {
    let page = MemoryPage::new();
    let engine = engine_over(page);
    let descriptor =
        StrategyDescriptor::new(vec![Strategy::TestId("order-confirmation".into())]).unwrap();

    let result = engine
        .assert_state(
            &descriptor,
            &StatePredicate::Hidden,
            &quick(),
            &CancellationToken::new(),
        )
        .await;
    assert!(
        result.is_ok(),
        "absence must satisfy the hidden predicate: {result:?}"
    );
}

#[tokio::test]
async fn test_visible_then_hidden_round_trip_tracks_toggles() {
    let page = Arc::new(MemoryPage::new());
    let banner = page.insert(
        MemoryNode::new("div")
            .test_id("order-confirmation")
            .text("Order placed"),
    );
    let engine = Engine::new(page.clone());
    let descriptor =
        StrategyDescriptor::new(vec![Strategy::TestId("order-confirmation".into())]).unwrap();
    let cancel = CancellationToken::new();

    let visible = engine
        .assert_state(&descriptor, &StatePredicate::Visible, &patient(), &cancel)
        .await;
    assert!(visible.is_ok());

    let mutator = page.clone();
    let handle = banner.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(120)).await;
        mutator.set_visible(&handle, false);
    });

    let hidden = engine
        .assert_state(&descriptor, &StatePredicate::Hidden, &patient(), &cancel)
        .await;
    assert!(hidden.is_ok(), "hide toggle not observed: {hidden:?}");
}

#[tokio::test]
async fn test_hidden_assertion_fails_while_element_stays_visible() {
    let (page, _submit) = terminal_page();
    let engine = engine_over(page);
    let descriptor = submit_descriptor();

    let result = engine
        .assert_state(
            &descriptor,
            &StatePredicate::Hidden,
            &quick(),
            &CancellationToken::new(),
        )
        .await;
    match result.reason() {
        Some(FailureReason::ValueMismatch { expected, actual }) => {
            assert_eq!(expected, "hidden");
            assert_eq!(actual, "visible");
        }
        other => panic!("expected ValueMismatch, got {other:?}"),
    }
    assert!(!result.diagnostics().unwrap().attempts.is_empty());
}

#[tokio::test]
async fn test_text_assertion_polls_until_feed_updates() {
    let page = Arc::new(MemoryPage::new());
    let price = page.insert(MemoryNode::new("span").test_id("price-display").text("—"));
    let engine = Engine::new(page.clone());
    let descriptor =
        StrategyDescriptor::new(vec![Strategy::TestId("price-display".into())]).unwrap();

    let mutator = page.clone();
    let handle = price.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(120)).await;
        mutator.set_text(&handle, "189.42");
    });

    let result = engine
        .assert_state(
            &descriptor,
            &StatePredicate::TextEquals("189.42".into()),
            &patient(),
            &CancellationToken::new(),
        )
        .await;
    assert!(result.is_ok(), "feed update not observed: {result:?}");
    assert_eq!(result.value(), Some("189.42"));
}

#[tokio::test]
async fn test_text_assertion_reports_actual_on_mismatch() {
    let page = MemoryPage::new();
    page.insert(MemoryNode::new("span").test_id("price-display").text("188.00"));
    let engine = engine_over(page);
    let descriptor =
        StrategyDescriptor::new(vec![Strategy::TestId("price-display".into())]).unwrap();

    let result = engine
        .assert_state(
            &descriptor,
            &StatePredicate::TextEquals("189.42".into()),
            &quick(),
            &CancellationToken::new(),
        )
        .await;
    match result.reason() {
        Some(FailureReason::ValueMismatch { expected, actual }) => {
            assert_eq!(expected, "189.42");
            assert_eq!(actual, "188.00");
        }
        other => panic!("expected ValueMismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn test_attribute_assertion() {
    let page = MemoryPage::new();
    page.insert(
        MemoryNode::new("button")
            .test_id("submit-order")
            .attr("aria-busy", "false")
            .text("Submit"),
    );
    let engine = engine_over(page);
    let descriptor =
        StrategyDescriptor::new(vec![Strategy::TestId("submit-order".into())]).unwrap();

    let result = engine
        .assert_state(
            &descriptor,
            &StatePredicate::AttributeEquals {
                name: "aria-busy".into(),
                value: "false".into(),
            },
            &quick(),
            &CancellationToken::new(),
        )
        .await;
    assert!(result.is_ok());
}

// ── Descriptor validation (the nth-child trap) ──────────────────────────

#[test]
fn test_single_structural_descriptor_rejected_at_construction() {
    let err = StrategyDescriptor::new(vec![Strategy::Css(".nav-links a:nth-child(2)".into())])
        .unwrap_err();
    assert_eq!(err, DescriptorError::StructuralOnly);
}

// ── Diagnostics ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_failure_report_carries_breakdown_and_markup() {
    let (page, _submit) = terminal_page();
    let engine = engine_over(page);
    // Wrong test id, ambiguous fallback: report must show both rows.
    let descriptor = StrategyDescriptor::new(vec![
        Strategy::TestId("place-order".into()),
        Strategy::Css(".btn-primary".into()),
    ])
    .unwrap();

    let outcome = engine
        .resolve(&descriptor, &quick(), &CancellationToken::new())
        .await;
    let report = engine.diagnose(&outcome).await;

    assert_eq!(report.page_url, "file:///terminal.html");
    assert_eq!(report.attempts.len(), 2);
    assert_eq!(report.attempts[0].match_count, 0);
    assert_eq!(report.attempts[1].match_count, 2);
    assert!(report.markup_excerpt.is_some());

    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("place-order"));
    assert!(json.contains(".btn-primary"));
}
