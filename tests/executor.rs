mod common;

use common::*;
use ui_workflow_capture::{
    ActionExecutor, Config, ErrorKind, Intent, Interaction, SignatureExtractor,
};

fn surface_at_home() -> ScriptedSurface {
    let surface = ScriptedSurface::new();
    surface.set_current(home());
    surface
}

#[tokio::test]
async fn missing_target_reports_element_not_found() {
    let surface = surface_at_home();
    let executor = ActionExecutor::new(Config::immediate());
    let extractor = SignatureExtractor::new();

    let result = executor
        .apply(&Intent::click("Billing settings"), &surface, &extractor)
        .await
        .unwrap();

    assert!(!result.succeeded);
    assert_eq!(result.error, Some(ErrorKind::ElementNotFound));
    assert!(result.detail.unwrap().contains("Billing settings"));
    assert!(surface.interactions().is_empty());
    // three resolution attempts plus the closing observation
    assert_eq!(surface.snapshots(), 4);
    assert_eq!(result.observation.url, HOME_URL);
}

#[tokio::test]
async fn transient_failures_are_retried_then_reported() {
    let surface = surface_at_home().transient_failures(10);
    let executor = ActionExecutor::new(Config::immediate());

    let result = executor
        .apply(&Intent::click("Refresh"), &surface, &SignatureExtractor::new())
        .await
        .unwrap();

    assert!(!result.succeeded);
    assert_eq!(result.error, Some(ErrorKind::ActionFailed));
    assert_eq!(surface.interactions().len(), 3);
}

#[tokio::test]
async fn single_transient_failure_recovers() {
    let surface = surface_at_home().transient_failures(1).on_interact("e1", home_with_dialog());
    let executor = ActionExecutor::new(Config::immediate());

    let result = executor
        .apply(&Intent::click("New issue"), &surface, &SignatureExtractor::new())
        .await
        .unwrap();

    assert!(result.succeeded);
    assert_eq!(result.error, None);
    assert_eq!(surface.interactions().len(), 2);
    assert!(result.observation.roles.has_dialog());
}

#[tokio::test]
async fn rejected_interaction_is_not_retried() {
    let surface = surface_at_home().reject("e2");
    let executor = ActionExecutor::new(Config::immediate());

    let result = executor
        .apply(&Intent::click("Refresh"), &surface, &SignatureExtractor::new())
        .await
        .unwrap();

    assert!(!result.succeeded);
    assert_eq!(result.error, Some(ErrorKind::ActionFailed));
    assert_eq!(surface.interactions().len(), 1);
}

#[tokio::test]
async fn unreadable_page_after_click_is_reobserved() {
    let surface = surface_at_home()
        .on_interact("e1", home_with_dialog())
        .unreadable_after_interact(1);
    let executor = ActionExecutor::new(Config::immediate());

    let result = executor
        .apply(&Intent::click("New issue"), &surface, &SignatureExtractor::new())
        .await
        .unwrap();

    assert!(result.succeeded);
    assert!(result.observation.roles.has_dialog());
    assert_eq!(surface.interactions().len(), 1);
}

#[tokio::test]
async fn page_that_never_settles_is_unavailable() {
    let surface = surface_at_home()
        .on_interact("e1", home_with_dialog())
        .unreadable_after_interact(10);
    let executor = ActionExecutor::new(Config::immediate());

    let err = executor
        .apply(&Intent::click("New issue"), &surface, &SignatureExtractor::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SurfaceUnavailable);
    assert!(err.to_string().contains("unreadable after 3 attempts"));
    assert_eq!(surface.interactions().len(), 1);
}

#[tokio::test]
async fn wait_intent_only_observes() {
    let surface = surface_at_home();
    let executor = ActionExecutor::new(Config::immediate());

    let result = executor
        .apply(&Intent::wait("page to load"), &surface, &SignatureExtractor::new())
        .await
        .unwrap();

    assert!(result.succeeded);
    assert!(surface.interactions().is_empty());
    assert!(surface.navigations().is_empty());
    assert_eq!(surface.snapshots(), 1);
}

#[tokio::test]
async fn navigate_intent_with_url_loads_it() {
    let surface = surface_at_home();
    let executor = ActionExecutor::new(Config::immediate());

    let result = executor
        .apply(
            &Intent::navigate("https://tracker.test/settings"),
            &surface,
            &SignatureExtractor::new(),
        )
        .await
        .unwrap();

    assert!(result.succeeded);
    assert_eq!(surface.navigations(), vec!["https://tracker.test/settings".to_string()]);
    assert_eq!(result.observation.url, "https://tracker.test/settings");
}

#[tokio::test]
async fn fill_passes_its_payload() {
    let surface = ScriptedSurface::new();
    surface.set_current(home_with_dialog());
    let executor = ActionExecutor::new(Config::immediate());

    let result = executor
        .apply(
            &Intent::fill("Issue title", "Broken login"),
            &surface,
            &SignatureExtractor::new(),
        )
        .await
        .unwrap();

    assert!(result.succeeded);
    assert_eq!(
        surface.interactions(),
        vec![("e3".to_string(), Interaction::Fill("Broken login".into()))]
    );
}

#[tokio::test]
async fn unreachable_surface_is_an_error() {
    let surface = surface_at_home();
    surface.inner.lock().unwrap().unavailable = true;
    let executor = ActionExecutor::new(Config::immediate());

    let err = executor
        .apply(&Intent::click("Refresh"), &surface, &SignatureExtractor::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SurfaceUnavailable);
}

#[tokio::test]
async fn navigate_to_returns_no_detail_on_success() {
    let surface = surface_at_home();
    let executor = ActionExecutor::new(Config::immediate());

    let detail = executor
        .navigate_to("https://tracker.test", &surface)
        .await
        .unwrap();

    assert_eq!(detail, None);
    assert_eq!(surface.navigations(), vec![HOME_URL.to_string()]);
}
