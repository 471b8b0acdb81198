mod common;

use common::{button, MockSurface};
use formpilot::{Diagnostics, LocatorResolver, Resolution, Selector, SessionState, TextPattern};
use std::time::Duration;

fn candidates() -> Vec<Selector> {
    vec![
        Selector::role("button", TextPattern::contains("New App")),
        Selector::role("button", TextPattern::contains("Add App")),
        Selector::role("button", TextPattern::contains("Create App")),
    ]
}

fn resolver() -> LocatorResolver {
    LocatorResolver::new(Duration::from_millis(50))
}

#[tokio::test]
async fn test_first_matching_candidate_wins_without_over_traversal() {
    let candidates = candidates();
    let surface = MockSurface::new()
        .with_element(&candidates[1], button("add", "Add App"))
        .with_element(&candidates[2], button("create", "Create App"));
    let mut session = SessionState::new(Diagnostics::disabled());

    let resolution = resolver()
        .resolve(&surface, "the New App button", &candidates, &mut session)
        .await
        .unwrap();

    match resolution {
        Resolution::Found {
            element,
            strategy_index,
            selector,
        } => {
            assert_eq!(strategy_index, 1);
            assert_eq!(element.id, "add");
            assert_eq!(selector, candidates[1]);
        }
        other => panic!("expected a match, got {other:?}"),
    }

    // The third candidate is never looked at.
    assert_eq!(
        surface.calls(),
        vec![
            format!("find:{}", candidates[0]),
            format!("find:{}", candidates[1]),
        ]
    );
}

#[tokio::test]
async fn test_exhaustion_is_not_an_error() {
    let candidates = candidates();
    let surface = MockSurface::new();
    let mut session = SessionState::new(Diagnostics::disabled());

    let resolution = resolver()
        .resolve(&surface, "the New App button", &candidates, &mut session)
        .await
        .unwrap();

    let Resolution::Exhausted { attempts } = resolution else {
        panic!("expected exhaustion");
    };
    assert_eq!(attempts.len(), 3);
    assert_eq!(surface.calls_starting_with("find:").len(), 3);
    assert!(surface.calls_starting_with("click:").is_empty());
}

#[tokio::test]
async fn test_empty_candidate_list_exhausts_immediately() {
    let surface = MockSurface::new();
    let mut session = SessionState::new(Diagnostics::disabled());

    let resolution = resolver()
        .resolve(&surface, "nothing", &[], &mut session)
        .await
        .unwrap();

    assert!(!resolution.is_found());
    assert!(surface.calls().is_empty());
}

#[tokio::test]
async fn test_surface_fault_stops_resolution() {
    let candidates = candidates();
    let surface = MockSurface::new()
        .with_broken_selector(&candidates[0])
        .with_element(&candidates[1], button("add", "Add App"));
    let mut session = SessionState::new(Diagnostics::disabled());

    let err = resolver()
        .resolve(&surface, "the New App button", &candidates, &mut session)
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert_eq!(surface.calls().len(), 1);
}

#[tokio::test]
async fn test_stale_match_counts_as_a_miss() {
    let candidates = candidates();
    let surface = MockSurface::new()
        .with_stale_selector(&candidates[0])
        .with_element(&candidates[1], button("add", "Add App"));
    let mut session = SessionState::new(Diagnostics::disabled());

    let resolution = resolver()
        .resolve(&surface, "the New App button", &candidates, &mut session)
        .await
        .unwrap();

    let Resolution::Found { strategy_index, .. } = resolution else {
        panic!("expected the second candidate to match");
    };
    assert_eq!(strategy_index, 1);
    assert_eq!(surface.calls().len(), 2);
}

#[tokio::test]
async fn test_attempts_are_traced() {
    let tmp = tempfile::tempdir().unwrap();
    let candidates = candidates();
    let surface = MockSurface::new().with_element(&candidates[2], button("create", "Create App"));
    let mut session = SessionState::new(Diagnostics::new(Some(tmp.path().to_path_buf())));
    session.diagnostics.start("resolver", 1);

    resolver()
        .resolve(&surface, "the New App button", &candidates, &mut session)
        .await
        .unwrap();
    let trace = session.diagnostics.finalize("succeeded").unwrap();

    let attempts: Vec<(u64, bool)> = common::read_trace(&trace.path)
        .into_iter()
        .filter(|e| e["event"] == "resolve_attempt")
        .map(|e| (e["attempt"].as_u64().unwrap(), e["found"].as_bool().unwrap()))
        .collect();
    assert_eq!(attempts, vec![(1, false), (2, false), (3, true)]);
}
