//! Graphite `/render?format=json` payloads.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer, IgnoredAny, SeqAccess, Visitor};
use serde::ser::{self, SerializeTuple, Serializer};
use serde_derive::{Deserialize, Serialize};

use crate::error::{self, Result};

/// A single sample. `value` is `None` where the backend reported a gap.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Datapoint {
    pub timestamp: DateTime<Utc>,
    pub value: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Timeseries {
    pub target: String,
    pub datapoints: Vec<Datapoint>,
}

impl Timeseries {
    pub fn is_empty(&self) -> bool {
        self.datapoints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.datapoints.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DateTime<Utc>, Option<f64>)> + use<'_> {
        self.datapoints.iter().map(|point| (point.timestamp, point.value))
    }

    /// Present values only, gaps skipped.
    pub fn values(&self) -> impl Iterator<Item = f64> + use<'_> {
        self.datapoints.iter().filter_map(|point| point.value)
    }
}

/// Decodes a JSON array of `{"target", "datapoints"}` objects.
pub fn decode(data: &[u8]) -> Result<Vec<Timeseries>> {
    serde_json::from_slice(data).map_err(error::malformed)
}

pub(crate) fn timestamp_from_seconds<E: de::Error>(seconds: i64) -> std::result::Result<DateTime<Utc>, E> {
    DateTime::from_timestamp(seconds, 0).ok_or_else(|| E::custom(format_args!(
        "timestamp {seconds} is out of range")))
}

// On the wire a datapoint is `[value-or-null, unix-seconds]`.
impl<'de> de::Deserialize<'de> for Datapoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct DatapointVisitor;

        impl<'de> Visitor<'de> for DatapointVisitor {
            type Value = Datapoint;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a [value, timestamp] pair")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Datapoint, A::Error> {
                let value: Option<f64> = seq.next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;

                let seconds: i64 = seq.next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;

                if seq.next_element::<IgnoredAny>()?.is_some() {
                    return Err(de::Error::invalid_length(3, &self));
                }

                Ok(Datapoint {
                    timestamp: timestamp_from_seconds(seconds)?,
                    value,
                })
            }
        }

        deserializer.deserialize_seq(DatapointVisitor)
    }
}

impl ser::Serialize for Datapoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut pair = serializer.serialize_tuple(2)?;
        pair.serialize_element(&self.value)?;
        pair.serialize_element(&self.timestamp.timestamp())?;
        pair.end()
    }
}
