mod common;

use common::{button, control, Fault, MockSurface, ScriptedCheckpoint};
use formpilot::{
    ActionOutcome, CheckpointKind, ClickAttempt, Diagnostics, EngineState, LocatorResolver,
    Selector, SessionState, StepExecutor, TextPattern,
};
use std::time::Duration;

fn executor<'a>(surface: &'a MockSurface, checkpoint: &'a ScriptedCheckpoint) -> StepExecutor<'a> {
    StepExecutor::new(
        surface,
        checkpoint,
        LocatorResolver::new(Duration::from_millis(50)),
        Duration::from_millis(500),
    )
}

fn session() -> SessionState {
    SessionState::new(Diagnostics::disabled())
}

fn save() -> Vec<Selector> {
    vec![Selector::role("button", TextPattern::exact("Save"))]
}

fn name_field() -> Vec<Selector> {
    vec![
        Selector::Label(TextPattern::contains("Name")),
        Selector::Placeholder(TextPattern::contains("Name")),
    ]
}

#[tokio::test]
async fn test_click_unresolved_asks_the_human_once() {
    let surface = MockSurface::new();
    let checkpoint = ScriptedCheckpoint::new();
    let mut session = session();

    let outcome = executor(&surface, &checkpoint)
        .click(&save(), "the Save button", &mut session)
        .await
        .unwrap();

    assert_eq!(outcome, ActionOutcome::Manual);
    let requests = checkpoint.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].kind, CheckpointKind::Fallback);
    assert!(requests[0].reason.as_deref().unwrap().contains("the Save button"));
    assert_eq!(session.interventions(), 1);
    assert_eq!(session.state(), EngineState::Running);
    assert!(surface.calls_starting_with("click:").is_empty());
}

#[tokio::test]
async fn test_click_stall_is_escalated_like_a_miss() {
    let surface = MockSurface::new()
        .with_element(&save()[0], button("save", "Save"))
        .with_click_faults("save", &[Fault::Stalled]);
    let checkpoint = ScriptedCheckpoint::new();
    let mut session = session();

    let outcome = executor(&surface, &checkpoint)
        .click(&save(), "the Save button", &mut session)
        .await
        .unwrap();

    assert_eq!(outcome, ActionOutcome::Manual);
    assert_eq!(checkpoint.requests().len(), 1);
}

#[tokio::test]
async fn test_click_crash_is_fatal() {
    let surface = MockSurface::new()
        .with_element(&save()[0], button("save", "Save"))
        .with_click_faults("save", &[Fault::Crashed]);
    let checkpoint = ScriptedCheckpoint::new();
    let mut session = session();

    let err = executor(&surface, &checkpoint)
        .click(&save(), "the Save button", &mut session)
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(checkpoint.requests().is_empty());
}

#[tokio::test]
async fn test_try_click_reports_stall_without_escalating() {
    let surface = MockSurface::new()
        .with_element(&save()[0], button("save", "Save"))
        .with_click_faults("save", &[Fault::Stalled]);
    let checkpoint = ScriptedCheckpoint::new();
    let mut session = session();

    let attempt = executor(&surface, &checkpoint)
        .try_click(&save(), "the Save button", &mut session)
        .await
        .unwrap();

    assert!(matches!(attempt, ClickAttempt::TimedOut { .. }));
    assert!(checkpoint.requests().is_empty());
    assert_eq!(session.interventions(), 0);
}

#[tokio::test]
async fn test_fill_types_and_validates() {
    let surface = MockSurface::new().with_element(
        &name_field()[1],
        control("name", "input", "textbox"),
    );
    let checkpoint = ScriptedCheckpoint::new();
    let mut session = session();

    let outcome = executor(&surface, &checkpoint)
        .fill(&name_field(), "Pocket Atlas", "the Name field", &mut session)
        .await
        .unwrap();

    assert!(outcome.is_automated());
    assert_eq!(surface.value_of("name").as_deref(), Some("Pocket Atlas"));
    assert_eq!(surface.calls_starting_with("clear:"), vec!["clear:name"]);
    assert!(checkpoint.requests().is_empty());
}

#[tokio::test]
async fn test_fill_mismatch_asks_for_correction() {
    let surface = MockSurface::new()
        .with_element(&name_field()[0], control("name", "input", "textbox"))
        .with_sticky_value("name", "Pocket Atl");
    let checkpoint = ScriptedCheckpoint::new();
    let mut session = session();

    let outcome = executor(&surface, &checkpoint)
        .fill(&name_field(), "Pocket Atlas", "the Name field", &mut session)
        .await
        .unwrap();

    assert_eq!(outcome, ActionOutcome::Manual);
    let requests = checkpoint.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].reason.as_deref().unwrap().contains("Pocket Atl"));
}

#[tokio::test]
async fn test_choose_native_select() {
    let field = vec![Selector::Label(TextPattern::contains("Primary Language"))];
    let surface = MockSurface::new()
        .with_element(&field[0], control("language", "select", "combobox"))
        .with_native_options("language", &["English (U.K.)", "English (U.S.)"]);
    let checkpoint = ScriptedCheckpoint::new();
    let mut session = session();

    let outcome = executor(&surface, &checkpoint)
        .choose(&field, "English (U.S.)", "Primary Language", &mut session)
        .await
        .unwrap();

    assert!(outcome.is_automated());
    assert_eq!(surface.value_of("language").as_deref(), Some("English (U.S.)"));
    assert!(surface.calls_starting_with("click:").is_empty());
}

#[tokio::test]
async fn test_choose_overlay_opens_then_picks_option() {
    let field = vec![Selector::Label(TextPattern::contains("Bundle ID"))];
    let option_text = Selector::Text(TextPattern::contains("com.example.atlas"));
    let surface = MockSurface::new()
        .with_element(&field[0], control("bundle", "div", "combobox"))
        .with_element(&option_text, control("bundle-option", "span", "generic"));
    let checkpoint = ScriptedCheckpoint::new();
    let mut session = session();

    let outcome = executor(&surface, &checkpoint)
        .choose(&field, "com.example.atlas", "Bundle ID", &mut session)
        .await
        .unwrap();

    assert!(outcome.is_automated());
    assert_eq!(
        surface.calls_starting_with("click:"),
        vec!["click:bundle", "click:bundle-option"]
    );
    // role:option and role:menuitem were tried before the visible text
    let option_lookups = surface.calls_starting_with("find:").len();
    assert_eq!(option_lookups, 4);
}

#[tokio::test]
async fn test_choose_missing_option_falls_back() {
    let field = vec![Selector::Label(TextPattern::contains("Bundle ID"))];
    let surface = MockSurface::new().with_element(&field[0], control("bundle", "div", "combobox"));
    let checkpoint = ScriptedCheckpoint::new();
    let mut session = session();

    let outcome = executor(&surface, &checkpoint)
        .choose(&field, "com.example.atlas", "Bundle ID", &mut session)
        .await
        .unwrap();

    assert_eq!(outcome, ActionOutcome::Manual);
    assert_eq!(checkpoint.requests().len(), 1);
    assert_eq!(session.interventions(), 1);
}

#[tokio::test]
async fn test_closed_terminal_is_fatal() {
    let surface = MockSurface::new();
    let checkpoint = ScriptedCheckpoint::hung_up();
    let mut session = session();

    let err = executor(&surface, &checkpoint)
        .click(&save(), "the Save button", &mut session)
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert_eq!(session.state(), EngineState::AwaitingHuman);
}
