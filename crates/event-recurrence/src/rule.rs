//! Rule compilation -- typed recurrence descriptors to canonical RRULE text.
//!
//! The canonical string is the persisted and interchange form of a recurrence:
//!
//! ```text
//! FREQ=<DAILY|WEEKLY|MONTHLY|YEARLY>;INTERVAL=<n>
//!     [;BYDAY=<codes>]                     weekly
//!     [;BYMONTHDAY=<days>]                 monthly, fixed days
//!     [;BYSETPOS=<pos>;BYDAY=<codes>]      monthly, ordinal position
//!     ;BYMONTH=<months>[;BYSETPOS=<pos>;BYDAY=<codes>]   yearly
//! ```
//!
//! Lists keep the order the descriptor supplied them in. [`RecurrenceRule::parse`]
//! reads this grammar back, so `compile(parse(s)) == s` for every canonical `s`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::descriptor::{
    DaySymbol, MonthlySelector, Ordinal, Position, Recurrence, RecurrenceParams, Target,
};
use crate::error::{RecurrenceError, Result, ValidationErrors};

/// A compiled, canonical recurrence rule (the RRULE body, without `RRULE:`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecurrenceRule(String);

impl RecurrenceRule {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse canonical rule text back into the descriptor it was compiled from.
    ///
    /// # Errors
    /// Returns `RecurrenceError::InvalidRule` for unknown parts, malformed values
    /// or text that is not in canonical form, and `RecurrenceError::Validation`
    /// when the values are out of range.
    pub fn parse(text: &str) -> Result<Recurrence> {
        let recurrence = parse_parts(text)?;
        recurrence.validate()?;

        let canonical = render(&recurrence);
        if canonical != text {
            return Err(RecurrenceError::InvalidRule(format!(
                "'{}' is not canonical (expected '{}')",
                text, canonical
            )));
        }
        Ok(recurrence)
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RecurrenceRule {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<RecurrenceRule> for String {
    fn from(rule: RecurrenceRule) -> Self {
        rule.0
    }
}

impl TryFrom<String> for RecurrenceRule {
    type Error = RecurrenceError;

    fn try_from(text: String) -> Result<Self> {
        RecurrenceRule::parse(&text)?;
        Ok(RecurrenceRule(text))
    }
}

impl std::str::FromStr for RecurrenceRule {
    type Err = RecurrenceError;

    fn from_str(text: &str) -> Result<Self> {
        RecurrenceRule::try_from(text.to_string())
    }
}

/// Compile a typed descriptor into its canonical rule.
///
/// Returns `Ok(None)` for a non-recurring descriptor.
///
/// # Errors
/// Returns the range and set-content failures reported by
/// [`Recurrence::validate`].
///
/// # Examples
///
/// ```
/// use event_recurrence::{compile, Recurrence};
///
/// let rule = compile(&Recurrence::daily(1)).unwrap().unwrap();
/// assert_eq!(rule.as_str(), "FREQ=DAILY;INTERVAL=1");
/// assert!(compile(&Recurrence::None).unwrap().is_none());
/// ```
pub fn compile(recurrence: &Recurrence) -> std::result::Result<Option<RecurrenceRule>, ValidationErrors> {
    recurrence.validate()?;
    if !recurrence.is_recurring() {
        return Ok(None);
    }
    Ok(Some(RecurrenceRule(render(recurrence))))
}

/// Validate a loose attribute bag and compile it in one step.
pub fn compile_params(
    params: &RecurrenceParams,
) -> std::result::Result<Option<RecurrenceRule>, ValidationErrors> {
    let recurrence = Recurrence::try_from(params)?;
    compile(&recurrence)
}

fn join<T>(values: &[T], f: impl Fn(&T) -> String) -> String {
    values.iter().map(f).collect::<Vec<_>>().join(",")
}

fn render_position(out: &mut String, position: &Position) {
    out.push_str(&format!(
        ";BYSETPOS={};BYDAY={}",
        position.on_the.set_position(),
        join(&position.target.days(), |d| d.code().to_string())
    ));
}

/// Render without validating; the single-shot descriptor renders as "".
fn render(recurrence: &Recurrence) -> String {
    let mut out = String::new();
    match recurrence {
        Recurrence::None => {}
        Recurrence::Daily { frequency } => {
            out.push_str(&format!("FREQ=DAILY;INTERVAL={}", frequency));
        }
        Recurrence::Weekly { frequency, on } => {
            out.push_str(&format!("FREQ=WEEKLY;INTERVAL={}", frequency));
            if let Some(days) = on {
                out.push_str(&format!(";BYDAY={}", join(days, |d| d.code().to_string())));
            }
        }
        Recurrence::Monthly {
            frequency,
            selector,
        } => {
            out.push_str(&format!("FREQ=MONTHLY;INTERVAL={}", frequency));
            match selector {
                Some(MonthlySelector::On(days)) => {
                    out.push_str(&format!(";BYMONTHDAY={}", join(days, u8::to_string)));
                }
                Some(MonthlySelector::OnThe(position)) => render_position(&mut out, position),
                None => {}
            }
        }
        Recurrence::Yearly {
            frequency,
            months,
            position,
        } => {
            out.push_str(&format!(
                "FREQ=YEARLY;INTERVAL={};BYMONTH={}",
                frequency,
                join(months, u8::to_string)
            ));
            if let Some(position) = position {
                render_position(&mut out, position);
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn invalid(message: impl Into<String>) -> RecurrenceError {
    RecurrenceError::InvalidRule(message.into())
}

fn parse_list<T>(key: &str, value: &str, f: impl Fn(&str) -> Option<T>) -> Result<Vec<T>> {
    value
        .split(',')
        .map(|item| f(item).ok_or_else(|| invalid(format!("bad {} value '{}'", key, item))))
        .collect()
}

fn parse_days(value: &str) -> Result<Vec<DaySymbol>> {
    // Codes are uppercase in canonical text; from_code alone would accept "mo".
    parse_list("BYDAY", value, |item| {
        if item.len() == 2 && item.chars().all(|c| c.is_ascii_uppercase()) {
            DaySymbol::from_code(item)
        } else {
            None
        }
    })
}

fn parse_numbers(key: &str, value: &str) -> Result<Vec<u8>> {
    parse_list(key, value, |item| item.parse().ok())
}

fn take_position(parts: &mut BTreeMap<&str, &str>) -> Result<Option<Position>> {
    match (parts.remove("BYSETPOS"), parts.remove("BYDAY")) {
        (None, None) => Ok(None),
        (Some(pos), Some(days)) => {
            let on_the = pos
                .parse::<i8>()
                .ok()
                .and_then(Ordinal::from_set_position)
                .ok_or_else(|| invalid(format!("unsupported BYSETPOS '{}'", pos)))?;
            let target = Target::from_days(parse_days(days)?);
            Ok(Some(Position::new(on_the, target)))
        }
        (Some(_), None) => Err(invalid("BYSETPOS requires BYDAY")),
        (None, Some(_)) => Err(invalid("BYDAY requires BYSETPOS for this frequency")),
    }
}

fn parse_parts(text: &str) -> Result<Recurrence> {
    if text.is_empty() {
        return Err(invalid("empty RRULE string"));
    }

    let mut parts: BTreeMap<&str, &str> = BTreeMap::new();
    for part in text.split(';') {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| invalid(format!("expected KEY=VALUE, found '{}'", part)))?;
        if parts.insert(key, value).is_some() {
            return Err(invalid(format!("duplicate {}", key)));
        }
    }

    let freq = parts.remove("FREQ").ok_or_else(|| invalid("missing FREQ"))?;
    let frequency: u32 = parts
        .remove("INTERVAL")
        .ok_or_else(|| invalid("missing INTERVAL"))?
        .parse()
        .map_err(|_| invalid("INTERVAL must be a positive integer"))?;

    let recurrence = match freq {
        "DAILY" => Recurrence::daily(frequency),
        "WEEKLY" => {
            let on = parts.remove("BYDAY").map(parse_days).transpose()?;
            Recurrence::weekly(frequency, on)
        }
        "MONTHLY" => {
            let selector = match parts.remove("BYMONTHDAY") {
                Some(days) => Some(MonthlySelector::On(parse_numbers("BYMONTHDAY", days)?)),
                None => take_position(&mut parts)?.map(MonthlySelector::OnThe),
            };
            Recurrence::monthly(frequency, selector)
        }
        "YEARLY" => {
            let months = parts
                .remove("BYMONTH")
                .ok_or_else(|| invalid("YEARLY requires BYMONTH"))?;
            let months = parse_numbers("BYMONTH", months)?;
            Recurrence::yearly(frequency, months, take_position(&mut parts)?)
        }
        other => return Err(invalid(format!("unsupported FREQ '{}'", other))),
    };

    if let Some(key) = parts.keys().next() {
        return Err(invalid(format!("{} is not allowed with FREQ={}", key, freq)));
    }
    Ok(recurrence)
}
