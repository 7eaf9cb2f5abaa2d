//! Property-based tests for rule compilation, expansion and generation.
//!
//! These check invariants that must hold for *any* valid descriptor and window,
//! not just the literal scenarios in the other test files.

use chrono::{DateTime, Duration, TimeZone, Utc};
use event_recurrence::{
    compile, expand, generate, DaySymbol, GenerateRequest, MemoryStore, MonthlySelector,
    OccurrenceStore, Ordinal, Position, Recurrence, RecurrenceRule, Specification, Target, Window,
};
use proptest::prelude::*;
use proptest::sample::subsequence;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

const ALL_DAYS: [DaySymbol; 7] = [
    DaySymbol::Mo,
    DaySymbol::Tu,
    DaySymbol::We,
    DaySymbol::Th,
    DaySymbol::Fr,
    DaySymbol::Sa,
    DaySymbol::Su,
];

fn arb_frequency() -> impl Strategy<Value = u32> {
    1u32..=4
}

fn arb_days() -> impl Strategy<Value = Vec<DaySymbol>> {
    subsequence(ALL_DAYS.to_vec(), 1..=7).prop_shuffle()
}

fn arb_ordinal() -> impl Strategy<Value = Ordinal> {
    prop_oneof![
        Just(Ordinal::First),
        Just(Ordinal::Second),
        Just(Ordinal::Third),
        Just(Ordinal::Fourth),
        Just(Ordinal::Last),
    ]
}

fn arb_target() -> impl Strategy<Value = Target> {
    prop_oneof![
        Just(Target::AnyWeekday),
        Just(Target::AnyWeekendDay),
        arb_days().prop_map(Target::Days),
    ]
}

fn arb_position() -> impl Strategy<Value = Position> {
    (arb_ordinal(), arb_target()).prop_map(|(on_the, target)| Position::new(on_the, target))
}

/// Days 29..=31 are left out so sparse rules cannot starve the window.
fn arb_month_days() -> impl Strategy<Value = Vec<u8>> {
    subsequence((1u8..=28).collect::<Vec<_>>(), 1..=4).prop_shuffle()
}

fn arb_months() -> impl Strategy<Value = Vec<u8>> {
    subsequence((1u8..=12).collect::<Vec<_>>(), 1..=3).prop_shuffle()
}

fn arb_recurrence() -> impl Strategy<Value = Recurrence> {
    prop_oneof![
        Just(Recurrence::None),
        arb_frequency().prop_map(Recurrence::daily),
        (arb_frequency(), proptest::option::of(arb_days()))
            .prop_map(|(f, on)| Recurrence::weekly(f, on)),
        (
            arb_frequency(),
            proptest::option::of(prop_oneof![
                arb_month_days().prop_map(MonthlySelector::On),
                arb_position().prop_map(MonthlySelector::OnThe),
            ])
        )
            .prop_map(|(f, selector)| Recurrence::monthly(f, selector)),
        (arb_frequency(), arb_months(), proptest::option::of(arb_position()))
            .prop_map(|(f, months, position)| Recurrence::yearly(f, months, position)),
    ]
}

/// Recurrences dense enough to land several instants in a two-month window.
fn arb_dense_recurrence() -> impl Strategy<Value = Recurrence> {
    prop_oneof![
        arb_frequency().prop_map(Recurrence::daily),
        (arb_frequency(), proptest::option::of(arb_days()))
            .prop_map(|(f, on)| Recurrence::weekly(f, on)),
    ]
}

fn arb_anchor() -> impl Strategy<Value = DateTime<Utc>> {
    (2025i32..=2027, 1u32..=12, 1u32..=28, 0u32..=23, 0u32..=59)
        .prop_map(|(y, m, d, h, min)| Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap())
}

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: 64,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Rule compilation
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config())]

    #[test]
    fn compilation_is_deterministic(recurrence in arb_recurrence()) {
        let a = compile(&recurrence).unwrap();
        let b = compile(&recurrence.clone()).unwrap();
        prop_assert_eq!(a.clone(), b);
        prop_assert_eq!(a.is_none(), !recurrence.is_recurring());
    }

    #[test]
    fn canonical_rules_roundtrip(recurrence in arb_recurrence()) {
        if let Some(rule) = compile(&recurrence).unwrap() {
            let parsed = RecurrenceRule::parse(rule.as_str()).unwrap();
            let again = compile(&parsed).unwrap().unwrap();
            prop_assert_eq!(again.as_str(), rule.as_str());
        }
    }
}

// ---------------------------------------------------------------------------
// Expansion
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config())]

    #[test]
    fn expansion_is_strictly_increasing_and_in_window(
        recurrence in arb_recurrence(),
        anchor in arb_anchor(),
        offset_days in 0i64..30,
        span_days in 1i64..90,
        count in proptest::option::of(1u32..40),
    ) {
        let rule = compile(&recurrence).unwrap();
        let from = anchor + Duration::days(offset_days);
        let window = Window::between(from, from + Duration::days(span_days)).unwrap();
        let instants = expand(rule.as_ref(), anchor, window, count).unwrap().to_vec();

        for pair in instants.windows(2) {
            prop_assert!(pair[0] < pair[1], "not increasing: {:?}", pair);
        }
        if let Some(count) = count {
            prop_assert!(instants.len() <= count as usize);
        }
        if rule.is_some() {
            prop_assert!(instants.iter().all(|i| window.contains(*i)));
        } else {
            prop_assert_eq!(instants, vec![anchor]);
        }
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config())]

    #[test]
    fn generation_is_idempotent(
        recurrence in arb_recurrence(),
        anchor in arb_anchor(),
        span_days in 1i64..60,
    ) {
        let store = MemoryStore::new();
        let spec = Specification::new(anchor, recurrence).unwrap();
        let request = GenerateRequest::new(anchor).to(anchor + Duration::days(span_days));

        let first = generate(&store, &spec, &request).unwrap();
        let persisted = store.count().unwrap();
        let second = generate(&store, &spec, &request).unwrap();

        prop_assert_eq!(store.count().unwrap(), persisted);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn generation_respects_count(
        recurrence in arb_dense_recurrence(),
        anchor in arb_anchor(),
        count in 1u32..15,
    ) {
        let store = MemoryStore::new();
        let spec = Specification::new(anchor, recurrence).unwrap();
        let request = GenerateRequest::new(anchor)
            .to(anchor + Duration::days(60))
            .count(count);

        let occurrences = generate(&store, &spec, &request).unwrap();

        prop_assert!(occurrences.len() <= count as usize);
        prop_assert_eq!(store.count().unwrap(), occurrences.len());
    }

    #[test]
    fn widening_the_window_is_monotonic(
        recurrence in arb_dense_recurrence(),
        anchor in arb_anchor(),
        to1_days in 1i64..30,
        extra_days in 1i64..30,
    ) {
        let store = MemoryStore::new();
        let spec = Specification::new(anchor, recurrence).unwrap();
        let to1 = anchor + Duration::days(to1_days);
        let to2 = to1 + Duration::days(extra_days);

        let narrow = generate(&store, &spec, &GenerateRequest::new(anchor).to(to1)).unwrap();
        let wide = generate(&store, &spec, &GenerateRequest::new(anchor).to(to2)).unwrap();

        prop_assert_eq!(&wide[..narrow.len()], &narrow[..]);
        prop_assert!(wide[narrow.len()..].iter().all(|o| o.at() > to1 && o.at() <= to2));
        prop_assert_eq!(store.count().unwrap(), wide.len());
    }
}
