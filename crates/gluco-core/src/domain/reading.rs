//! Glucose reading domain entity.
//!
//! A [`Reading`] is one sensor value as reported by the Share service: the
//! concentration in mg/dL (or an out-of-range marker), the trend arrow, and
//! the time the sensor recorded it.
//!
//! # Freshness
//!
//! The Share service returns "the latest value" on every poll, so most polls
//! return the same reading as the previous one.  [`Reading::freshness_against`]
//! decides whether a fetched reading supersedes the last accepted one:
//!
//! - A strictly newer timestamp is always [`ReadingFreshness::New`].
//! - An older timestamp is always [`ReadingFreshness::Duplicate`].
//! - An equal timestamp is `Duplicate` only when the value is also equal.
//!   Upstream clocks have coarse granularity, so a changed value at the same
//!   timestamp is treated as a correction and forwarded.

use std::fmt;

use chrono::{DateTime, Utc};

/// Lowest value the sensor reports as a number; anything below is `Low`.
pub const MIN_REPORTABLE_MG_DL: i64 = 40;

/// Highest value the sensor reports as a number; anything above is `High`.
pub const MAX_REPORTABLE_MG_DL: i64 = 400;

/// A glucose concentration, or one of the sensor's out-of-range markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlucoseValue {
    /// In-range value in mg/dL (40..=400).
    MgDl(u16),
    /// Below the sensor's measurable range.
    Low,
    /// Above the sensor's measurable range.
    High,
}

impl GlucoseValue {
    /// Classifies a raw mg/dL value from the upstream service.
    pub fn from_mg_dl(raw: i64) -> Self {
        if raw < MIN_REPORTABLE_MG_DL {
            GlucoseValue::Low
        } else if raw > MAX_REPORTABLE_MG_DL {
            GlucoseValue::High
        } else {
            // In range, so the cast cannot truncate.
            GlucoseValue::MgDl(raw as u16)
        }
    }

    /// Returns the numeric value, or `None` for the out-of-range markers.
    pub fn as_mg_dl(&self) -> Option<u16> {
        match self {
            GlucoseValue::MgDl(v) => Some(*v),
            GlucoseValue::Low | GlucoseValue::High => None,
        }
    }
}

impl fmt::Display for GlucoseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlucoseValue::MgDl(v) => write!(f, "{v}"),
            GlucoseValue::Low => write!(f, "LOW"),
            GlucoseValue::High => write!(f, "HIGH"),
        }
    }
}

/// Discretized rate-of-change indicator supplied by the upstream service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Trend {
    DoubleUp,
    Rising,
    RisingSlow,
    Flat,
    FallingSlow,
    Falling,
    DoubleDown,
    /// No trend, not computable, or rate out of range.
    #[default]
    Unknown,
}

impl Trend {
    /// Parses the Share service's trend name (`"FortyFiveUp"`, `"Flat"`, ...).
    ///
    /// Matching ignores case, underscores, hyphens and spaces.  Unrecognised
    /// names (including `"NotComputable"` and `"RateOutOfRange"`) map to
    /// [`Trend::Unknown`].
    pub fn from_share_name(name: &str) -> Self {
        let normalized: String = name
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "doubleup" => Trend::DoubleUp,
            "singleup" => Trend::Rising,
            "fortyfiveup" => Trend::RisingSlow,
            "flat" => Trend::Flat,
            "fortyfivedown" => Trend::FallingSlow,
            "singledown" => Trend::Falling,
            "doubledown" => Trend::DoubleDown,
            _ => Trend::Unknown,
        }
    }

    /// Parses the numeric trend code used by older Share API responses.
    pub fn from_share_code(code: u8) -> Self {
        match code {
            1 => Trend::DoubleUp,
            2 => Trend::Rising,
            3 => Trend::RisingSlow,
            4 => Trend::Flat,
            5 => Trend::FallingSlow,
            6 => Trend::Falling,
            7 => Trend::DoubleDown,
            _ => Trend::Unknown,
        }
    }

    /// Arrow glyph shown in the chatbox.  Empty for [`Trend::Unknown`].
    pub fn arrow(&self) -> &'static str {
        match self {
            Trend::DoubleUp => "↑↑",
            Trend::Rising => "↑",
            Trend::RisingSlow => "↗",
            Trend::Flat => "→",
            Trend::FallingSlow => "↘",
            Trend::Falling => "↓",
            Trend::DoubleDown => "↓↓",
            Trend::Unknown => "",
        }
    }
}

/// Outcome of comparing a fetched reading with the last accepted one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingFreshness {
    /// The reading supersedes the last accepted one and should be delivered.
    New,
    /// The reading carries nothing the chatbox has not already shown.
    Duplicate,
}

/// One sensor reading.  Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    pub value: GlucoseValue,
    pub trend: Trend,
    /// When the sensor recorded the value.
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    pub fn new(value: GlucoseValue, trend: Trend, timestamp: DateTime<Utc>) -> Self {
        Self {
            value,
            trend,
            timestamp,
        }
    }

    /// Decides whether `self` supersedes `last`.  See the module docs.
    pub fn freshness_against(&self, last: Option<&Reading>) -> ReadingFreshness {
        let Some(last) = last else {
            return ReadingFreshness::New;
        };

        if self.timestamp > last.timestamp {
            ReadingFreshness::New
        } else if self.timestamp == last.timestamp && self.value != last.value {
            ReadingFreshness::New
        } else {
            ReadingFreshness::Duplicate
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
