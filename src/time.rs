use std::borrow::Cow;

use chrono::{DateTime, Utc};

/// A `from`/`until` bound of a Graphite render query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimeBound {
    /// Passed to Graphite verbatim: `-10min`, `now`, `yesterday`, etc.
    Relative(String),
    Absolute(DateTime<Utc>),
}

impl TimeBound {
    pub fn default_from() -> TimeBound {
        TimeBound::Relative("-10min".to_owned())
    }

    pub fn default_until() -> TimeBound {
        TimeBound::Relative("now".to_owned())
    }

    pub fn format(&self) -> Cow<'_, str> {
        match self {
            TimeBound::Relative(value) => Cow::Borrowed(value),
            TimeBound::Absolute(time) => Cow::Owned(time.format("%H:%M_%Y%m%d").to_string()),
        }
    }
}

impl From<&str> for TimeBound {
    fn from(value: &str) -> TimeBound {
        TimeBound::Relative(value.to_owned())
    }
}

impl From<DateTime<Utc>> for TimeBound {
    fn from(time: DateTime<Utc>) -> TimeBound {
        TimeBound::Absolute(time)
    }
}
