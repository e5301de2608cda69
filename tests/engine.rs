//! Decision engine behavior against a real store

mod helper;

use depwatch::config::Policy;
use depwatch::engine::{CheckRequest, DecisionEngine, LibraryCheck, Outcome, SuppressReason, UpdateEvent};
use depwatch::types::{ComponentKind, FutureStatus, NotifyPreference, UpdateCategory};

use helper::{
    create_test_store, future_analysis, released_analysis, seed_project_with_component,
    seed_unnotified_future,
};

fn request<'a>(
    project_id: i64,
    library_id: i64,
    installed: &'a str,
    preference: &'a NotifyPreference,
) -> CheckRequest<'a> {
    CheckRequest {
        project_id,
        library_id,
        installed_version: installed,
        preference,
        kind: ComponentKind::Library,
    }
}

#[test]
fn released_update_emits_event_and_advances_watermark() {
    let (_tmp, store) = create_test_store();
    let (project_id, library_id) =
        seed_project_with_component(&store, "storefront", "major, minor", "django", "4.2");
    let policy = Policy::default();
    let engine = DecisionEngine::new(&store, &policy);
    let preference = NotifyPreference::parse("major, minor");

    // Seed the watermark at 4.2, as if the project was told about it before
    let outcome = engine
        .evaluate(
            &request(project_id, library_id, "4.1", &preference),
            &released_analysis("django", "4.2", UpdateCategory::Minor),
        )
        .unwrap();
    assert!(matches!(outcome, Outcome::Notify(_)));

    // The oracle now reports 5.0 while the project runs 4.2
    let outcome = engine
        .evaluate(
            &request(project_id, library_id, "4.2", &preference),
            &released_analysis("django", "5.0", UpdateCategory::Major),
        )
        .unwrap();

    let Outcome::Notify(UpdateEvent::Released(event)) = outcome else {
        panic!("expected released event, got {outcome:?}");
    };
    assert_eq!(event.version, "5.0");
    assert_eq!(event.category, UpdateCategory::Major);

    let mark = store.watermark(project_id, library_id).unwrap().unwrap();
    assert_eq!(mark.version, "5.0");
    assert_eq!(mark.category, UpdateCategory::Major);
}

#[test]
fn exact_repeat_of_watermarked_version_is_a_no_op() {
    let (_tmp, store) = create_test_store();
    let (project_id, library_id) =
        seed_project_with_component(&store, "storefront", "major, minor", "django", "4.2");
    let policy = Policy::default();
    let engine = DecisionEngine::new(&store, &policy);
    let preference = NotifyPreference::parse("major, minor");
    let analysis = released_analysis("django", "5.0", UpdateCategory::Major);

    let first = engine
        .evaluate(&request(project_id, library_id, "4.2", &preference), &analysis)
        .unwrap();
    assert!(matches!(first, Outcome::Notify(_)));

    // Same version, same category: nothing new to say
    let second = engine
        .evaluate(&request(project_id, library_id, "4.2", &preference), &analysis)
        .unwrap();
    assert_eq!(
        second,
        Outcome::Suppressed(SuppressReason::NoNewVersion)
    );
}

#[test]
fn preference_filter_suppresses_unwanted_category() {
    let (_tmp, store) = create_test_store();
    let (project_id, library_id) =
        seed_project_with_component(&store, "storefront", "major", "numpy", "1.26.0");
    let policy = Policy::default();
    let engine = DecisionEngine::new(&store, &policy);
    let preference = NotifyPreference::parse("major");

    let outcome = engine
        .evaluate(
            &request(project_id, library_id, "1.26.0", &preference),
            &released_analysis("numpy", "1.26.4", UpdateCategory::Minor),
        )
        .unwrap();

    assert_eq!(
        outcome,
        Outcome::Suppressed(SuppressReason::PreferenceFiltered {
            category: UpdateCategory::Minor
        })
    );
    // Suppression mutates nothing
    assert!(store.watermark(project_id, library_id).unwrap().is_none());
}

#[test]
fn monotonicity_guard_suppresses_non_newer_versions() {
    let (_tmp, store) = create_test_store();
    let (project_id, library_id) =
        seed_project_with_component(&store, "storefront", "major, minor", "react", "19.0.0");
    let policy = Policy::default();
    let engine = DecisionEngine::new(&store, &policy);
    let preference = NotifyPreference::parse("major, minor");

    let outcome = engine
        .evaluate(
            &request(project_id, library_id, "19.0.0", &preference),
            &released_analysis("react", "18.3.1", UpdateCategory::Major),
        )
        .unwrap();

    assert!(matches!(
        outcome,
        Outcome::Suppressed(SuppressReason::NotNewer { .. })
    ));
}

#[test]
fn monotonicity_guard_does_not_fire_on_unparseable_installed_version() {
    let (_tmp, store) = create_test_store();
    let (project_id, library_id) =
        seed_project_with_component(&store, "storefront", "major, minor", "react", "latest");
    let policy = Policy::default();
    let engine = DecisionEngine::new(&store, &policy);
    let preference = NotifyPreference::parse("major, minor");

    // "latest" cannot be ordered against 19.1.0: the guard must fall
    // through instead of suppressing
    let outcome = engine
        .evaluate(
            &request(project_id, library_id, "latest", &preference),
            &released_analysis("react", "19.1.0", UpdateCategory::Minor),
        )
        .unwrap();

    assert!(matches!(outcome, Outcome::Notify(_)));
}

#[test]
fn first_future_detection_creates_notified_record_and_event() {
    let (_tmp, store) = create_test_store();
    let (project_id, library_id) =
        seed_project_with_component(&store, "storefront", "major, future", "vue", "3.4.0");
    let policy = Policy::default();
    let engine = DecisionEngine::new(&store, &policy);
    let preference = NotifyPreference::parse("major, future");

    let outcome = engine
        .evaluate(
            &request(project_id, library_id, "3.4.0", &preference),
            &future_analysis("vue", "4.0.0", 92),
        )
        .unwrap();

    let Outcome::Notify(UpdateEvent::Future(event)) = outcome else {
        panic!("expected future event, got {outcome:?}");
    };
    assert_eq!(event.confidence, 92);

    let record = store.future_update(library_id, "4.0.0").unwrap().unwrap();
    assert!(record.notification_sent);
    // Invariant: a sent notification always carries its timestamp
    assert!(record.notification_sent_at.is_some());
    assert_eq!(record.status, FutureStatus::Detected);
}

#[test]
fn future_detection_without_opt_in_mutates_nothing() {
    let (_tmp, store) = create_test_store();
    let (project_id, library_id) =
        seed_project_with_component(&store, "storefront", "major, minor", "vue", "3.4.0");
    let policy = Policy::default();
    let engine = DecisionEngine::new(&store, &policy);
    let preference = NotifyPreference::parse("major, minor");

    let outcome = engine
        .evaluate(
            &request(project_id, library_id, "3.4.0", &preference),
            &future_analysis("vue", "4.0.0", 92),
        )
        .unwrap();

    assert_eq!(outcome, Outcome::Suppressed(SuppressReason::FutureOptOut));
    assert!(store.future_update(library_id, "4.0.0").unwrap().is_none());
}

#[test]
fn future_confidence_threshold_is_inclusive_at_seventy() {
    let (_tmp, store) = create_test_store();
    let (project_id, library_id) =
        seed_project_with_component(&store, "storefront", "future", "vue", "3.4.0");
    let policy = Policy::default();
    let engine = DecisionEngine::new(&store, &policy);
    let preference = NotifyPreference::parse("future");

    let rejected = engine
        .evaluate(
            &request(project_id, library_id, "3.4.0", &preference),
            &future_analysis("vue", "4.0.0", 69),
        )
        .unwrap();
    assert!(matches!(
        rejected,
        Outcome::Suppressed(SuppressReason::LowConfidence { confidence: 69, .. })
    ));
    assert!(store.future_update(library_id, "4.0.0").unwrap().is_none());

    let accepted = engine
        .evaluate(
            &request(project_id, library_id, "3.4.0", &preference),
            &future_analysis("vue", "4.0.0", 70),
        )
        .unwrap();
    assert!(matches!(accepted, Outcome::Notify(UpdateEvent::Future(_))));
}

#[test]
fn notified_future_update_is_terminal_even_with_higher_confidence() {
    let (_tmp, store) = create_test_store();
    let (project_id, library_id) =
        seed_project_with_component(&store, "storefront", "future", "vue", "3.4.0");
    let policy = Policy::default();
    let engine = DecisionEngine::new(&store, &policy);
    let preference = NotifyPreference::parse("future");

    let first = engine
        .evaluate(
            &request(project_id, library_id, "3.4.0", &preference),
            &future_analysis("vue", "4.0.0", 75),
        )
        .unwrap();
    assert!(matches!(first, Outcome::Notify(_)));

    // Confidence jumps by far more than the escalation threshold, but the
    // first-detection notification already went out for this version
    let again = engine
        .evaluate(
            &request(project_id, library_id, "3.4.0", &preference),
            &future_analysis("vue", "4.0.0", 98),
        )
        .unwrap();
    assert_eq!(again, Outcome::Suppressed(SuppressReason::AlreadyNotified));

    let record = store.future_update(library_id, "4.0.0").unwrap().unwrap();
    assert_eq!(record.confidence, 75);
}

#[test]
fn confidence_escalation_emits_event_on_unnotified_record() {
    let (_tmp, store) = create_test_store();
    let (project_id, library_id) =
        seed_project_with_component(&store, "storefront", "future", "python", "3.12.0");
    seed_unnotified_future(
        &store,
        library_id,
        "3.14.0",
        75,
        "https://www.reddit.com/r/python/planned",
    );
    let policy = Policy::default();
    let engine = DecisionEngine::new(&store, &policy);
    let preference = NotifyPreference::parse("future");

    let mut analysis = future_analysis("python", "3.14.0", 93);
    analysis.source = "https://docs.python.org/3.14/whatsnew".to_string();

    let outcome = engine
        .evaluate(&request(project_id, library_id, "3.12.0", &preference), &analysis)
        .unwrap();

    let Outcome::Notify(UpdateEvent::ConfidenceUpdate(event)) = outcome else {
        panic!("expected confidence event, got {outcome:?}");
    };
    assert_eq!(event.old_confidence, 75);
    assert_eq!(event.new_confidence, 93);
    assert_eq!(
        event.change_reason,
        "Featured on official site (docs.python.org); Release date now available: 2026-09-01"
    );

    let record = store.future_update(library_id, "3.14.0").unwrap().unwrap();
    assert_eq!(record.confidence, 93);
    assert_eq!(record.previous_confidence, Some(75));
    assert_eq!(record.status, FutureStatus::Confirmed);
}

#[test]
fn small_confidence_increase_updates_record_without_event() {
    let (_tmp, store) = create_test_store();
    let (project_id, library_id) =
        seed_project_with_component(&store, "storefront", "future", "python", "3.12.0");
    seed_unnotified_future(
        &store,
        library_id,
        "3.14.0",
        75,
        "https://docs.python.org/3.14/whatsnew",
    );
    let policy = Policy::default();
    let engine = DecisionEngine::new(&store, &policy);
    let preference = NotifyPreference::parse("future");

    let mut analysis = future_analysis("python", "3.14.0", 80);
    analysis.source = "https://docs.python.org/3.14/whatsnew".to_string();

    let outcome = engine
        .evaluate(&request(project_id, library_id, "3.12.0", &preference), &analysis)
        .unwrap();
    assert_eq!(outcome, Outcome::Suppressed(SuppressReason::NoMaterialChange));

    // The delta was below threshold but the record still absorbed it
    let record = store.future_update(library_id, "3.14.0").unwrap().unwrap();
    assert_eq!(record.confidence, 80);
    assert_eq!(record.previous_confidence, Some(75));
    assert!(!record.notification_sent);
}

#[test]
fn released_path_promotes_matching_future_record() {
    let (_tmp, store) = create_test_store();
    let (project_id, library_id) =
        seed_project_with_component(&store, "storefront", "major, minor, future", "vue", "3.4.0");
    let policy = Policy::default();
    let engine = DecisionEngine::new(&store, &policy);
    let preference = NotifyPreference::parse("major, minor, future");

    // Track 4.0.0 as a future update first
    let tracked = engine
        .evaluate(
            &request(project_id, library_id, "3.4.0", &preference),
            &future_analysis("vue", "4.0.0", 90),
        )
        .unwrap();
    assert!(matches!(tracked, Outcome::Notify(_)));

    // The same version later ships through the released path
    let shipped = engine
        .evaluate(
            &request(project_id, library_id, "3.4.0", &preference),
            &released_analysis("vue", "4.0.0", UpdateCategory::Major),
        )
        .unwrap();
    assert!(matches!(shipped, Outcome::Notify(UpdateEvent::Released(_))));

    let record = store.future_update(library_id, "4.0.0").unwrap().unwrap();
    assert_eq!(record.status, FutureStatus::Released);
    let release = store.release_record(library_id, "4.0.0").unwrap().unwrap();
    assert_eq!(record.promoted_release_id, Some(release.id));
}

#[test]
fn cancelled_future_record_is_not_promoted() {
    let (_tmp, store) = create_test_store();
    let (project_id, library_id) =
        seed_project_with_component(&store, "storefront", "major, minor, future", "vue", "3.4.0");
    let policy = Policy::default();
    let engine = DecisionEngine::new(&store, &policy);
    let preference = NotifyPreference::parse("major, minor, future");

    engine
        .evaluate(
            &request(project_id, library_id, "3.4.0", &preference),
            &future_analysis("vue", "4.0.0", 90),
        )
        .unwrap();
    assert!(store.cancel_future(library_id, "4.0.0").unwrap());

    engine
        .evaluate(
            &request(project_id, library_id, "3.4.0", &preference),
            &released_analysis("vue", "4.0.0", UpdateCategory::Major),
        )
        .unwrap();

    let record = store.future_update(library_id, "4.0.0").unwrap().unwrap();
    assert_eq!(record.status, FutureStatus::Cancelled);
    assert_eq!(record.promoted_release_id, None);
}

#[test]
fn record_library_check_advances_only_on_strictly_newer_versions() {
    let (_tmp, store) = create_test_store();
    let (_project_id, _library_id) =
        seed_project_with_component(&store, "storefront", "major, minor", "django", "4.2");
    let policy = Policy::default();
    let engine = DecisionEngine::new(&store, &policy);

    let library = store.library_by_key("django").unwrap().unwrap();
    let check = engine
        .record_library_check(&library, &released_analysis("django", "5.0", UpdateCategory::Major))
        .unwrap();
    assert_eq!(check, LibraryCheck::Updated { version: "5.0".to_string() });

    let library = store.library_by_key("django").unwrap().unwrap();
    assert_eq!(library.latest_known_version.as_deref(), Some("5.0"));
    assert!(library.last_checked_at.is_some());

    // Re-detecting the same version refreshes nothing on the registry row
    let check = engine
        .record_library_check(&library, &released_analysis("django", "5.0", UpdateCategory::Major))
        .unwrap();
    assert_eq!(check, LibraryCheck::SameVersion);

    // An older version never rolls the registry back
    let check = engine
        .record_library_check(&library, &released_analysis("django", "4.1", UpdateCategory::Minor))
        .unwrap();
    assert_eq!(check, LibraryCheck::Older);
    let library = store.library_by_key("django").unwrap().unwrap();
    assert_eq!(library.latest_known_version.as_deref(), Some("5.0"));
}

#[test]
fn release_record_refreshes_summary_on_redetection() {
    let (_tmp, store) = create_test_store();
    let (project_id, library_id) =
        seed_project_with_component(&store, "storefront", "major, minor", "django", "4.0");
    let policy = Policy::default();
    let engine = DecisionEngine::new(&store, &policy);
    let preference = NotifyPreference::parse("major, minor");

    let mut analysis = released_analysis("django", "5.0", UpdateCategory::Major);
    analysis.summary = "Initial short note".to_string();
    engine
        .evaluate(&request(project_id, library_id, "4.0", &preference), &analysis)
        .unwrap();

    // A later pass for another project sees a richer summary for the same
    // version; the history row absorbs it
    let other_project = store
        .add_project("warehouse", "Bo", "bo@example.com", "major, minor")
        .unwrap();
    analysis.summary = "Full release notes with migration guidance".to_string();
    engine
        .evaluate(&request(other_project, library_id, "4.0", &preference), &analysis)
        .unwrap();

    let release = store.release_record(library_id, "5.0").unwrap().unwrap();
    assert_eq!(release.summary, "Full release notes with migration guidance");
}
