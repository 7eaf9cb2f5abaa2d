//! Recurrence descriptors -- the validated parameters a specification repeats by.
//!
//! [`Recurrence`] is the typed form: one variant per `repeat` value, each carrying
//! only the fields that are legal for it. Combinations such as "daily on the
//! third Tuesday" cannot be expressed at all, so the only checks left at runtime
//! are numeric ranges and set contents ([`Recurrence::validate`]).
//!
//! [`RecurrenceParams`] is the loose attribute bag accepted from callers that
//! build descriptors dynamically (forms, JSON payloads). Converting it into a
//! [`Recurrence`] reports every offending field at once.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationErrors;

/// A weekday symbol as used in `on` and `target` selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DaySymbol {
    Mo,
    Tu,
    We,
    Th,
    Fr,
    Sa,
    Su,
}

impl DaySymbol {
    /// Monday through Friday.
    pub const WEEKDAYS: [DaySymbol; 5] = [
        DaySymbol::Mo,
        DaySymbol::Tu,
        DaySymbol::We,
        DaySymbol::Th,
        DaySymbol::Fr,
    ];

    /// Sunday then Saturday, the order the rule string lists them in.
    pub const WEEKEND: [DaySymbol; 2] = [DaySymbol::Su, DaySymbol::Sa];

    /// Uppercase two-letter RFC 5545 code (`MO`, `TU`, ...).
    pub fn code(self) -> &'static str {
        match self {
            DaySymbol::Mo => "MO",
            DaySymbol::Tu => "TU",
            DaySymbol::We => "WE",
            DaySymbol::Th => "TH",
            DaySymbol::Fr => "FR",
            DaySymbol::Sa => "SA",
            DaySymbol::Su => "SU",
        }
    }

    /// Parse a two-letter code, case-insensitively.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "MO" => Some(DaySymbol::Mo),
            "TU" => Some(DaySymbol::Tu),
            "WE" => Some(DaySymbol::We),
            "TH" => Some(DaySymbol::Th),
            "FR" => Some(DaySymbol::Fr),
            "SA" => Some(DaySymbol::Sa),
            "SU" => Some(DaySymbol::Su),
            _ => None,
        }
    }

    pub fn to_weekday(self) -> chrono::Weekday {
        match self {
            DaySymbol::Mo => chrono::Weekday::Mon,
            DaySymbol::Tu => chrono::Weekday::Tue,
            DaySymbol::We => chrono::Weekday::Wed,
            DaySymbol::Th => chrono::Weekday::Thu,
            DaySymbol::Fr => chrono::Weekday::Fri,
            DaySymbol::Sa => chrono::Weekday::Sat,
            DaySymbol::Su => chrono::Weekday::Sun,
        }
    }
}

/// Position of the selected day within each period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ordinal {
    First,
    Second,
    Third,
    Fourth,
    Last,
}

impl Ordinal {
    /// BYSETPOS value: 1..=4, or -1 for `Last`.
    pub fn set_position(self) -> i8 {
        match self {
            Ordinal::First => 1,
            Ordinal::Second => 2,
            Ordinal::Third => 3,
            Ordinal::Fourth => 4,
            Ordinal::Last => -1,
        }
    }

    pub fn from_set_position(pos: i8) -> Option<Self> {
        match pos {
            1 => Some(Ordinal::First),
            2 => Some(Ordinal::Second),
            3 => Some(Ordinal::Third),
            4 => Some(Ordinal::Fourth),
            -1 => Some(Ordinal::Last),
            _ => None,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "first" => Some(Ordinal::First),
            "second" => Some(Ordinal::Second),
            "third" => Some(Ordinal::Third),
            "fourth" => Some(Ordinal::Fourth),
            "last" => Some(Ordinal::Last),
            _ => None,
        }
    }
}

/// Which days an ordinal selector counts over.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// Monday through Friday.
    AnyWeekday,
    /// Saturday and Sunday.
    AnyWeekendDay,
    /// An explicit weekday set, kept in the order supplied.
    Days(Vec<DaySymbol>),
}

impl Target {
    /// The weekday codes this target expands to, in rule order.
    pub fn days(&self) -> Vec<DaySymbol> {
        match self {
            Target::AnyWeekday => DaySymbol::WEEKDAYS.to_vec(),
            Target::AnyWeekendDay => DaySymbol::WEEKEND.to_vec(),
            Target::Days(days) => days.clone(),
        }
    }

    /// Inverse of [`Target::days`]; the two well-known sets collapse back to
    /// their symbolic form.
    pub fn from_days(days: Vec<DaySymbol>) -> Self {
        if days == DaySymbol::WEEKDAYS {
            Target::AnyWeekday
        } else if days == DaySymbol::WEEKEND {
            Target::AnyWeekendDay
        } else {
            Target::Days(days)
        }
    }
}

/// "The `on_the` `target` of the period", e.g. the third weekday.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub on_the: Ordinal,
    pub target: Target,
}

impl Position {
    pub fn new(on_the: Ordinal, target: Target) -> Self {
        Self { on_the, target }
    }
}

/// How a monthly recurrence picks its days.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthlySelector {
    /// Fixed days of the month (1..=31).
    On(Vec<u8>),
    /// An ordinal position over a weekday target.
    OnThe(Position),
}

/// Largest interval the expansion engine can represent (RRULE INTERVAL is 16-bit there).
pub const MAX_FREQUENCY: u32 = u16::MAX as u32;

fn default_frequency() -> u32 {
    1
}

/// A typed recurrence descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "repeat", rename_all = "snake_case")]
pub enum Recurrence {
    /// A single-shot event.
    #[default]
    None,
    Daily {
        #[serde(default = "default_frequency")]
        frequency: u32,
    },
    Weekly {
        #[serde(default = "default_frequency")]
        frequency: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        on: Option<Vec<DaySymbol>>,
    },
    Monthly {
        #[serde(default = "default_frequency")]
        frequency: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<MonthlySelector>,
    },
    Yearly {
        #[serde(default = "default_frequency")]
        frequency: u32,
        /// Months of the year (1..=12); required.
        months: Vec<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<Position>,
    },
}

impl Recurrence {
    pub fn daily(frequency: u32) -> Self {
        Recurrence::Daily { frequency }
    }

    pub fn weekly(frequency: u32, on: Option<Vec<DaySymbol>>) -> Self {
        Recurrence::Weekly { frequency, on }
    }

    pub fn monthly(frequency: u32, selector: Option<MonthlySelector>) -> Self {
        Recurrence::Monthly {
            frequency,
            selector,
        }
    }

    pub fn yearly(frequency: u32, months: Vec<u8>, position: Option<Position>) -> Self {
        Recurrence::Yearly {
            frequency,
            months,
            position,
        }
    }

    pub fn is_recurring(&self) -> bool {
        !matches!(self, Recurrence::None)
    }

    /// The interval multiplier, or `None` for a single-shot event.
    pub fn frequency(&self) -> Option<u32> {
        match self {
            Recurrence::None => None,
            Recurrence::Daily { frequency }
            | Recurrence::Weekly { frequency, .. }
            | Recurrence::Monthly { frequency, .. }
            | Recurrence::Yearly { frequency, .. } => Some(*frequency),
        }
    }

    /// Check the numeric ranges and set contents the type system cannot express.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Some(frequency) = self.frequency() {
            if frequency == 0 {
                errors.add("frequency", "must be a positive integer");
            } else if frequency > MAX_FREQUENCY {
                errors.add("frequency", format!("must not exceed {MAX_FREQUENCY}"));
            }
        }

        match self {
            Recurrence::None | Recurrence::Daily { .. } => {}
            Recurrence::Weekly { on, .. } => {
                if let Some(days) = on {
                    check_day_set(&mut errors, "on", days);
                }
            }
            Recurrence::Monthly { selector, .. } => match selector {
                Some(MonthlySelector::On(days)) => {
                    check_number_set(&mut errors, "on", days, 1..=31, "days of the month");
                }
                Some(MonthlySelector::OnThe(position)) => check_position(&mut errors, position),
                None => {}
            },
            Recurrence::Yearly {
                months, position, ..
            } => {
                check_number_set(&mut errors, "on", months, 1..=12, "months");
                if let Some(position) = position {
                    check_position(&mut errors, position);
                }
            }
        }

        errors.into_result(())
    }
}

fn check_day_set(errors: &mut ValidationErrors, field: &'static str, days: &[DaySymbol]) {
    if days.is_empty() {
        errors.add(field, "must contain at least one weekday");
    }
    if has_duplicates(days) {
        errors.add(field, "must not repeat a weekday");
    }
}

fn check_number_set(
    errors: &mut ValidationErrors,
    field: &'static str,
    values: &[u8],
    range: std::ops::RangeInclusive<u8>,
    what: &str,
) {
    if values.is_empty() {
        errors.add(field, format!("must list at least one of the {what}"));
        return;
    }
    if let Some(bad) = values.iter().find(|v| !range.contains(*v)) {
        errors.add(
            field,
            format!(
                "{bad} is outside {}..={} ({what})",
                range.start(),
                range.end()
            ),
        );
    }
    if has_duplicates(values) {
        errors.add(field, format!("must not repeat any of the {what}"));
    }
}

fn check_position(errors: &mut ValidationErrors, position: &Position) {
    if let Target::Days(days) = &position.target {
        check_day_set(errors, "target", days);
    }
}

fn has_duplicates<T: PartialEq>(values: &[T]) -> bool {
    values
        .iter()
        .enumerate()
        .any(|(i, v)| values[..i].contains(v))
}

// ---------------------------------------------------------------------------
// Loose attribute bag
// ---------------------------------------------------------------------------

/// Untyped recurrence parameters, as they arrive from dynamic callers.
///
/// Every field is optional and may hold any JSON value; [`Recurrence::try_from`]
/// decides whether the combination is legal.
///
/// ```
/// use event_recurrence::{Recurrence, RecurrenceParams};
/// use serde_json::json;
///
/// let params = RecurrenceParams::new().repeat("weekly").on(json!(["mo", "we", "fr"]));
/// let recurrence = Recurrence::try_from(&params).unwrap();
/// assert!(recurrence.is_recurring());
///
/// let bad = RecurrenceParams::new().repeat("weekly").on("2");
/// assert!(Recurrence::try_from(&bad).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecurrenceParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_the: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Value>,
}

impl RecurrenceParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repeat(mut self, value: impl Into<Value>) -> Self {
        self.repeat = Some(value.into());
        self
    }

    pub fn frequency(mut self, value: impl Into<Value>) -> Self {
        self.frequency = Some(value.into());
        self
    }

    pub fn on(mut self, value: impl Into<Value>) -> Self {
        self.on = Some(value.into());
        self
    }

    pub fn on_the(mut self, value: impl Into<Value>) -> Self {
        self.on_the = Some(value.into());
        self
    }

    pub fn target(mut self, value: impl Into<Value>) -> Self {
        self.target = Some(value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RepeatKind {
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

fn parse_repeat(value: Option<&Value>) -> Option<RepeatKind> {
    let Some(value) = value else {
        return Some(RepeatKind::None);
    };
    match value.as_str()?.to_ascii_lowercase().as_str() {
        "none" => Some(RepeatKind::None),
        "daily" => Some(RepeatKind::Daily),
        "weekly" => Some(RepeatKind::Weekly),
        "monthly" => Some(RepeatKind::Monthly),
        "yearly" => Some(RepeatKind::Yearly),
        _ => None,
    }
}

/// Numbers and numeric strings coerce; anything else does not.
fn parse_frequency(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_day_symbols(value: &Value) -> Option<Vec<DaySymbol>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_str().and_then(DaySymbol::from_code))
        .collect()
}

fn parse_small_integers(value: &Value) -> Option<Vec<u8>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_u64().and_then(|n| u8::try_from(n).ok()))
        .collect()
}

fn parse_target(value: &Value) -> Option<Target> {
    match value {
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "any_weekday" | "wkday" => Some(Target::AnyWeekday),
            "any_weekend_day" | "any_weekend" | "wkend" => Some(Target::AnyWeekendDay),
            _ => None,
        },
        Value::Array(_) => parse_day_symbols(value).map(Target::Days),
        _ => None,
    }
}

/// Parse the `on_the`/`target` pair; both or neither must be present.
fn parse_position(params: &RecurrenceParams, errors: &mut ValidationErrors) -> Option<Position> {
    let on_the = params.on_the.as_ref().and_then(|v| {
        let parsed = v.as_str().and_then(Ordinal::from_name);
        if parsed.is_none() {
            errors.add("on_the", "must be one of first, second, third, fourth, last");
        }
        parsed
    });
    let target = params.target.as_ref().and_then(|v| {
        let parsed = parse_target(v);
        if parsed.is_none() {
            errors.add(
                "target",
                "must be any_weekday, any_weekend_day or a list of weekday symbols",
            );
        }
        parsed
    });

    match (&params.on_the, &params.target) {
        (Some(_), None) => errors.add("target", "is required when on_the is given"),
        (None, Some(_)) => errors.add("on_the", "is required when target is given"),
        _ => {}
    }

    Some(Position::new(on_the?, target?))
}

fn forbid(errors: &mut ValidationErrors, field: &'static str, value: &Option<Value>, repeat: &str) {
    if value.is_some() {
        errors.add(field, format!("is not allowed for {repeat} recurrence"));
    }
}

impl TryFrom<&RecurrenceParams> for Recurrence {
    type Error = ValidationErrors;

    fn try_from(params: &RecurrenceParams) -> Result<Self, Self::Error> {
        let mut errors = ValidationErrors::new();

        let Some(kind) = parse_repeat(params.repeat.as_ref()) else {
            errors.add("repeat", "must be one of none, daily, weekly, monthly, yearly");
            return Err(errors);
        };

        if kind == RepeatKind::None {
            forbid(&mut errors, "frequency", &params.frequency, "non-repeating");
            forbid(&mut errors, "on", &params.on, "non-repeating");
            forbid(&mut errors, "on_the", &params.on_the, "non-repeating");
            forbid(&mut errors, "target", &params.target, "non-repeating");
            return errors.into_result(Recurrence::None);
        }

        let frequency = match &params.frequency {
            None => Some(1),
            Some(value) => {
                let parsed = parse_frequency(value);
                if parsed.is_none() {
                    errors.add("frequency", "must be a positive integer");
                }
                parsed
            }
        };

        let recurrence = match kind {
            RepeatKind::None => Some(Recurrence::None),
            RepeatKind::Daily => {
                forbid(&mut errors, "on", &params.on, "daily");
                forbid(&mut errors, "on_the", &params.on_the, "daily");
                forbid(&mut errors, "target", &params.target, "daily");
                frequency.map(Recurrence::daily)
            }
            RepeatKind::Weekly => {
                forbid(&mut errors, "on_the", &params.on_the, "weekly");
                forbid(&mut errors, "target", &params.target, "weekly");
                let on = match &params.on {
                    None => Some(None),
                    Some(value) => {
                        let parsed = parse_day_symbols(value);
                        if parsed.is_none() {
                            errors.add("on", "must be a list of weekday symbols");
                        }
                        parsed.map(Some)
                    }
                };
                frequency
                    .zip(on)
                    .map(|(frequency, on)| Recurrence::weekly(frequency, on))
            }
            RepeatKind::Monthly => {
                let selector = match (&params.on, params.on_the.is_some() || params.target.is_some()) {
                    (Some(_), true) => {
                        errors.add("on_the", "cannot be combined with on");
                        None
                    }
                    (Some(value), false) => {
                        let parsed = parse_small_integers(value);
                        if parsed.is_none() {
                            errors.add("on", "must be a list of days of the month");
                        }
                        parsed.map(|days| Some(MonthlySelector::On(days)))
                    }
                    (None, true) => parse_position(params, &mut errors)
                        .map(|position| Some(MonthlySelector::OnThe(position))),
                    (None, false) => Some(None),
                };
                frequency
                    .zip(selector)
                    .map(|(frequency, selector)| Recurrence::monthly(frequency, selector))
            }
            RepeatKind::Yearly => {
                let months = match &params.on {
                    None => {
                        errors.add("on", "is required for yearly recurrence");
                        None
                    }
                    Some(value) => {
                        let parsed = parse_small_integers(value);
                        if parsed.is_none() {
                            errors.add("on", "must be a list of months");
                        }
                        parsed
                    }
                };
                let position = if params.on_the.is_some() || params.target.is_some() {
                    parse_position(params, &mut errors).map(Some)
                } else {
                    Some(None)
                };
                match (frequency, months, position) {
                    (Some(frequency), Some(months), Some(position)) => {
                        Some(Recurrence::yearly(frequency, months, position))
                    }
                    _ => None,
                }
            }
        };

        if !errors.is_empty() {
            return Err(errors);
        }
        let Some(recurrence) = recurrence else {
            errors.add("repeat", "could not be interpreted");
            return Err(errors);
        };
        recurrence.validate()?;
        Ok(recurrence)
    }
}

impl TryFrom<RecurrenceParams> for Recurrence {
    type Error = ValidationErrors;

    fn try_from(params: RecurrenceParams) -> Result<Self, Self::Error> {
        Recurrence::try_from(&params)
    }
}

impl From<&Recurrence> for RecurrenceParams {
    fn from(recurrence: &Recurrence) -> Self {
        let days = |list: &[DaySymbol]| -> Value {
            Value::Array(
                list.iter()
                    .map(|d| Value::String(d.code().to_ascii_lowercase()))
                    .collect(),
            )
        };
        let numbers = |values: &[u8]| -> Value {
            Value::Array(values.iter().map(|v| Value::from(*v)).collect())
        };
        let position = |params: RecurrenceParams, position: &Position| -> RecurrenceParams {
            let ordinal = match position.on_the {
                Ordinal::First => "first",
                Ordinal::Second => "second",
                Ordinal::Third => "third",
                Ordinal::Fourth => "fourth",
                Ordinal::Last => "last",
            };
            let target = match &position.target {
                Target::AnyWeekday => Value::from("any_weekday"),
                Target::AnyWeekendDay => Value::from("any_weekend_day"),
                Target::Days(d) => days(d),
            };
            params.on_the(ordinal).target(target)
        };

        match recurrence {
            Recurrence::None => RecurrenceParams::new(),
            Recurrence::Daily { frequency } => {
                RecurrenceParams::new().repeat("daily").frequency(*frequency)
            }
            Recurrence::Weekly { frequency, on } => {
                let params = RecurrenceParams::new().repeat("weekly").frequency(*frequency);
                match on {
                    Some(d) => params.on(days(d)),
                    None => params,
                }
            }
            Recurrence::Monthly {
                frequency,
                selector,
            } => {
                let params = RecurrenceParams::new().repeat("monthly").frequency(*frequency);
                match selector {
                    Some(MonthlySelector::On(d)) => params.on(numbers(d)),
                    Some(MonthlySelector::OnThe(p)) => position(params, p),
                    None => params,
                }
            }
            Recurrence::Yearly {
                frequency,
                months,
                position: pos,
            } => {
                let params = RecurrenceParams::new()
                    .repeat("yearly")
                    .frequency(*frequency)
                    .on(numbers(months));
                match pos {
                    Some(p) => position(params, p),
                    None => params,
                }
            }
        }
    }
}
