//! Occurrence expansion -- compiled rules into concrete instants within a window.
//!
//! Wraps the `rrule` crate (v0.13). Expansion is pure: an [`Expansion`] holds the
//! parsed rule set plus the query bounds, and every call to [`Expansion::iter`]
//! starts a fresh, lazy walk from the anchor. Nothing here touches storage.

use chrono::{DateTime, SubsecRound, Utc};
use rrule::RRuleSet;

use crate::error::{RecurrenceError, Result};
use crate::rule::RecurrenceRule;

/// Cap applied when a query has neither an upper bound nor a count.
pub const DEFAULT_EXPANSION_LIMIT: u32 = 500;

/// A query window. `from` is inclusive; `to`, when present, is inclusive too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    from: DateTime<Utc>,
    to: Option<DateTime<Utc>>,
}

impl Window {
    /// # Errors
    /// Returns `RecurrenceError::InvalidWindow` if `to` is before `from`.
    pub fn new(from: DateTime<Utc>, to: Option<DateTime<Utc>>) -> Result<Self> {
        if let Some(to) = to {
            if to < from {
                return Err(RecurrenceError::InvalidWindow { from, to });
            }
        }
        Ok(Self { from, to })
    }

    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self> {
        Self::new(from, Some(to))
    }

    /// An open-ended window.
    pub fn starting(from: DateTime<Utc>) -> Self {
        Self { from, to: None }
    }

    pub fn from(&self) -> DateTime<Utc> {
        self.from
    }

    pub fn to(&self) -> Option<DateTime<Utc>> {
        self.to
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.from && self.to.is_none_or(|to| instant <= to)
    }
}

enum Source {
    /// Non-recurring: the anchor itself, ignoring the window.
    Single(DateTime<Utc>),
    Rule(Box<RRuleSet>),
}

/// A restartable expansion of one rule (or single instant) over a window.
pub struct Expansion {
    source: Source,
    window: Window,
    max_count: Option<u32>,
}

impl Expansion {
    pub fn window(&self) -> Window {
        self.window
    }

    /// The effective cap on emitted instants, if any.
    pub fn max_count(&self) -> Option<u32> {
        self.max_count
    }

    /// Start a new lazy walk over the instants. Each call restarts from the anchor.
    pub fn iter(&self) -> Instants<'_> {
        let state = match &self.source {
            Source::Single(anchor) => State::Single(Some(*anchor)),
            Source::Rule(set) => State::Rule(Box::new(set.as_ref().into_iter())),
        };
        Instants {
            state,
            window: self.window,
            remaining: self.max_count,
        }
    }

    /// Collect every instant of this expansion.
    pub fn to_vec(&self) -> Vec<DateTime<Utc>> {
        self.iter().collect()
    }
}

impl<'a> IntoIterator for &'a Expansion {
    type Item = DateTime<Utc>;
    type IntoIter = Instants<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

enum State<'a> {
    Single(Option<DateTime<Utc>>),
    Rule(Box<dyn Iterator<Item = DateTime<rrule::Tz>> + 'a>),
    Done,
}

/// Iterator returned by [`Expansion::iter`]. Strictly increasing, finite, fused.
pub struct Instants<'a> {
    state: State<'a>,
    window: Window,
    remaining: Option<u32>,
}

impl Iterator for Instants<'_> {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == Some(0) {
            self.state = State::Done;
        }

        let instant = match &mut self.state {
            State::Done => return None,
            State::Single(slot) => slot.take(),
            State::Rule(dates) => loop {
                let Some(dt) = dates.next() else {
                    break None;
                };
                let dt = dt.with_timezone(&Utc);
                // Skipped instants consume no budget.
                if dt < self.window.from {
                    continue;
                }
                if self.window.to.is_some_and(|to| dt > to) {
                    break None;
                }
                break Some(dt);
            },
        };

        match instant {
            Some(dt) => {
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining -= 1;
                }
                Some(dt)
            }
            None => {
                self.state = State::Done;
                None
            }
        }
    }
}

impl std::iter::FusedIterator for Instants<'_> {}

/// Build the `rrule` set for a compiled rule anchored at `anchor` (UTC).
fn rule_set(rule: &RecurrenceRule, anchor: DateTime<Utc>) -> Result<RRuleSet> {
    let text = format!(
        "DTSTART:{}\nRRULE:{}",
        anchor.format("%Y%m%dT%H%M%SZ"),
        rule.as_str()
    );
    text.parse::<RRuleSet>()
        .map_err(|e| RecurrenceError::InvalidRule(format!("{}", e)))
}

/// Expand a compiled rule (or a single-shot anchor) over a window.
///
/// # Arguments
/// - `rule` -- Canonical rule, or `None` for a non-recurring specification
/// - `anchor` -- The instant the recurrence is defined relative to (truncated to whole seconds)
/// - `window` -- Instants before `window.from()` are skipped; enumeration stops past `window.to()`
/// - `max_count` -- Maximum number of in-window instants to emit
///
/// Without a rule the expansion is exactly `[anchor]`, whatever the window.
/// When the window is open-ended and no count is given, [`DEFAULT_EXPANSION_LIMIT`]
/// bounds the walk.
///
/// # Errors
/// Returns `RecurrenceError::InvalidRule` if the `rrule` crate rejects the rule.
pub fn expand(
    rule: Option<&RecurrenceRule>,
    anchor: DateTime<Utc>,
    window: Window,
    max_count: Option<u32>,
) -> Result<Expansion> {
    let anchor = anchor.trunc_subsecs(0);

    let source = match rule {
        None => Source::Single(anchor),
        Some(rule) => Source::Rule(Box::new(rule_set(rule, anchor)?)),
    };

    let max_count = match (window.to, max_count) {
        (None, None) if matches!(source, Source::Rule(_)) => Some(DEFAULT_EXPANSION_LIMIT),
        (_, count) => count,
    };

    Ok(Expansion {
        source,
        window,
        max_count,
    })
}

/// Expand canonical rule text straight into a list of instants.
///
/// Convenience over [`expand`] for callers holding the serialized rule.
///
/// # Errors
/// Returns `RecurrenceError::InvalidRule` for non-canonical or unparseable rules
/// and `RecurrenceError::InvalidWindow` if `to` is before `from`.
pub fn expand_rule(
    rule: &str,
    anchor: DateTime<Utc>,
    from: DateTime<Utc>,
    to: Option<DateTime<Utc>>,
    count: Option<u32>,
) -> Result<Vec<DateTime<Utc>>> {
    let rule: RecurrenceRule = rule.parse()?;
    let window = Window::new(from, to)?;
    Ok(expand(Some(&rule), anchor, window, count)?.to_vec())
}
