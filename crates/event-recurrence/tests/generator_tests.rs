//! Tests for occurrence generation against a store.

use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Duration, TimeZone, Utc};
use event_recurrence::generator::persisted;
use event_recurrence::{
    generate, GenerateRequest, MemoryStore, Occurrence, OccurrenceStore, Recurrence,
    RecurrenceError, RecurrenceParams, Specification,
};
use serde_json::json;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Midnight of the day the fixtures are anchored on.
fn day0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
}

/// "Walk the dog": daily, anchored mid-morning on day 0.
fn walking_the_dog() -> Specification {
    Specification::new(day0() + Duration::hours(9), Recurrence::daily(1))
        .unwrap()
        .with_description("walk the dog")
}

fn instants(occurrences: &[Occurrence]) -> Vec<DateTime<Utc>> {
    occurrences.iter().map(Occurrence::at).collect()
}

fn week() -> GenerateRequest {
    GenerateRequest::new(day0()).to(day0() + Duration::days(7))
}

// ---------------------------------------------------------------------------
// Windows and counts
// ---------------------------------------------------------------------------

#[test]
fn generates_recurring_occurrences_for_the_window() {
    let store = MemoryStore::new();
    let spec = walking_the_dog();

    let occurrences = generate(&store, &spec, &week()).unwrap();

    assert_eq!(occurrences.len(), 7);
    assert_eq!(store.count().unwrap(), 7);
    assert!(occurrences.iter().all(|o| o.specification() == spec.id()));
}

#[test]
fn does_not_generate_before_from() {
    let store = MemoryStore::new();
    let request = GenerateRequest::new(day0() + Duration::days(1)).to(day0() + Duration::days(7));

    generate(&store, &walking_the_dog(), &request).unwrap();

    assert_eq!(store.count().unwrap(), 6);
}

#[test]
fn does_not_generate_after_to() {
    let store = MemoryStore::new();
    let request = GenerateRequest::new(day0() + Duration::days(1)).to(day0() + Duration::days(6));

    generate(&store, &walking_the_dog(), &request).unwrap();

    assert_eq!(store.count().unwrap(), 5);
}

#[test]
fn does_not_generate_more_than_count() {
    let store = MemoryStore::new();

    let occurrences = generate(&store, &walking_the_dog(), &week().count(3)).unwrap();

    assert_eq!(occurrences.len(), 3);
    assert_eq!(store.count().unwrap(), 3);
}

#[test]
fn results_are_chronological() {
    let store = MemoryStore::new();
    let spec = Specification::new(
        day0(),
        Recurrence::try_from(
            &RecurrenceParams::new()
                .repeat("weekly")
                .on(json!(["fr", "mo", "we"])),
        )
        .unwrap(),
    )
    .unwrap();

    let occurrences = generate(&store, &spec, &GenerateRequest::new(day0()).count(9)).unwrap();

    let times = instants(&occurrences);
    assert_eq!(times.len(), 9);
    assert!(times.windows(2).all(|w| w[0] < w[1]));
}

// ---------------------------------------------------------------------------
// Idempotence
// ---------------------------------------------------------------------------

#[test]
fn returns_but_does_not_persist_duplicates() {
    let store = MemoryStore::new();
    let spec = walking_the_dog();

    let first = generate(&store, &spec, &week()).unwrap();
    assert_eq!(store.count().unwrap(), 7);

    let second = generate(&store, &spec, &week()).unwrap();
    assert_eq!(store.count().unwrap(), 7);
    assert_eq!(second.len(), 7);
    assert_eq!(first, second, "the same rows should come back, ids included");
}

#[test]
fn widening_the_window_only_adds_new_instants() {
    let store = MemoryStore::new();
    let spec = walking_the_dog();

    let narrow = generate(&store, &spec, &week()).unwrap();
    let wide = generate(
        &store,
        &spec,
        &GenerateRequest::new(day0()).to(day0() + Duration::days(10)),
    )
    .unwrap();

    assert_eq!(wide.len(), 10);
    assert_eq!(store.count().unwrap(), 10);
    assert_eq!(&wide[..7], &narrow[..]);
}

#[test]
fn overlapping_windows_share_rows() {
    let store = MemoryStore::new();
    let spec = walking_the_dog();

    generate(
        &store,
        &spec,
        &GenerateRequest::new(day0()).to(day0() + Duration::days(4)),
    )
    .unwrap();
    let later = generate(
        &store,
        &spec,
        &GenerateRequest::new(day0() + Duration::days(2)).to(day0() + Duration::days(8)),
    )
    .unwrap();

    assert_eq!(later.len(), 6);
    assert_eq!(store.count().unwrap(), 8);
}

// ---------------------------------------------------------------------------
// Single-shot specifications
// ---------------------------------------------------------------------------

#[test]
fn single_shot_generates_exactly_one_occurrence() {
    let store = MemoryStore::new();
    let anchor = day0() + Duration::hours(14);
    let spec = Specification::new(anchor, Recurrence::None).unwrap();

    let occurrences = generate(&store, &spec, &GenerateRequest::new(day0())).unwrap();

    assert_eq!(instants(&occurrences), vec![anchor]);
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn single_shot_ignores_the_window_and_stays_unique() {
    let store = MemoryStore::new();
    let anchor = day0() + Duration::hours(14);
    let spec = Specification::new(anchor, Recurrence::None).unwrap();
    let far_away = GenerateRequest::new(day0() + Duration::days(100)).to(day0() + Duration::days(101));

    let first = generate(&store, &spec, &far_away).unwrap();
    let second = generate(&store, &spec, &GenerateRequest::new(day0())).unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(first, second);
    assert_eq!(store.count().unwrap(), 1);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn racing_generators_never_duplicate_rows() {
    let store = Arc::new(MemoryStore::new());
    let spec = Arc::new(walking_the_dog());
    let request = GenerateRequest::new(day0()).to(day0() + Duration::days(30));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            let spec = Arc::clone(&spec);
            thread::spawn(move || generate(store.as_ref(), spec.as_ref(), &request).unwrap())
        })
        .collect();

    let results: Vec<Vec<Occurrence>> = handles
        .into_iter()
        .map(|h| h.join().expect("generator thread panicked"))
        .collect();

    assert_eq!(store.count().unwrap(), 30);
    for result in &results {
        assert_eq!(result, &results[0]);
    }
}

// ---------------------------------------------------------------------------
// Errors and lookups
// ---------------------------------------------------------------------------

#[test]
fn inverted_window_is_a_caller_error() {
    let store = MemoryStore::new();
    let request = GenerateRequest::new(day0() + Duration::days(2)).to(day0());

    let err = generate(&store, &walking_the_dog(), &request).unwrap_err();

    assert!(matches!(err, RecurrenceError::InvalidWindow { .. }));
    assert_eq!(store.count().unwrap(), 0);
}

#[test]
fn invalid_descriptor_never_reaches_generation() {
    let err = Specification::from_params(day0(), &RecurrenceParams::new().repeat("yearly"))
        .unwrap_err();

    match err {
        RecurrenceError::Validation(errors) => assert_eq!(errors.fields(), vec!["on"]),
        other => panic!("expected a validation error, got {:?}", other),
    }
}

#[test]
fn accepted_frequencies_always_generate() {
    let store = MemoryStore::new();
    let anchor = day0() + Duration::hours(9);

    let err = Specification::new(anchor, Recurrence::daily(70_000)).unwrap_err();
    assert!(matches!(err, RecurrenceError::Validation(_)));

    let spec = Specification::new(anchor, Recurrence::daily(u32::from(u16::MAX))).unwrap();
    let occurrences = generate(&store, &spec, &GenerateRequest::new(day0()).count(1)).unwrap();
    assert_eq!(instants(&occurrences), vec![anchor]);
}

#[test]
fn persisted_reads_without_generating() {
    let store = MemoryStore::new();
    let spec = walking_the_dog();
    assert!(persisted(&store, &spec, day0(), None).unwrap().is_empty());

    generate(&store, &spec, &week()).unwrap();

    let stored = persisted(&store, &spec, day0(), Some(day0() + Duration::days(3))).unwrap();
    assert_eq!(stored.len(), 3);
    assert_eq!(store.count().unwrap(), 7);
}
