//! Prometheus HTTP API payloads (`/api/v1/query_range`), as proxied by Grafana.

use std::collections::HashMap;
use std::fmt::{self, Write};

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer, IgnoredAny, SeqAccess, Visitor};
use serde::ser::{self, SerializeTuple, Serializer};
use serde_derive::{Deserialize, Serialize};

use crate::error::{self, Error, Result};
use crate::graphite::{Datapoint, Timeseries};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PrometheusResponse {
    pub status: Status,
    pub data: ResponseData,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResponseData {
    #[serde(rename = "resultType")]
    pub result_type: ResultType,
    pub result: Vec<MatrixResult>,
}

/// Only range vectors are supported: instant vectors, scalars and strings are rejected on decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    Matrix,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct MatrixResult {
    pub metric: HashMap<String, String>,
    pub values: Vec<Sample>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl MatrixResult {
    pub fn name(&self) -> Option<&str> {
        self.metric.get("__name__").map(String::as_str)
    }

    pub fn label(&self, name: &str) -> &str {
        self.metric.get(name).map(String::as_str).unwrap_or_default()
    }

    /// Formats the series as a selector: `name{label="value", ...}` with labels sorted by name.
    pub fn format_metric(&self) -> String {
        let mut metric = self.name().unwrap_or_default().to_owned();

        let mut labels: Vec<_> = self.metric.iter().filter(|(name, _value)| *name != "__name__").collect();
        labels.sort();

        for (index, (name, value)) in labels.iter().enumerate() {
            if index == 0 {
                metric.push('{');
            } else {
                metric.push_str(", ");
            }

            _ = write!(&mut metric, "{name}={value:?}");

            if index == labels.len() - 1 {
                metric.push('}');
            }
        }

        metric
    }

    pub fn to_timeseries(&self) -> Timeseries {
        Timeseries {
            target: self.format_metric(),
            datapoints: self.values.iter().map(|sample| Datapoint {
                timestamp: sample.timestamp,
                value: Some(sample.value),
            }).collect(),
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    status: Option<String>,
    data: Option<RawData>,
    #[serde(rename = "errorType")]
    error_type: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct RawData {
    #[serde(rename = "resultType")]
    result_type: String,
    result: serde_json::Value,
}

/// Decodes a `{"status", "data": {"resultType", "result"}}` envelope holding a matrix.
pub fn decode(data: &[u8]) -> Result<PrometheusResponse> {
    // Only an object is an envelope: derived struct decoding would also take a positional array.
    let envelope: serde_json::Value = serde_json::from_slice(data).map_err(error::malformed)?;
    if !envelope.is_object() {
        return Err(Error::MalformedPayload("the response is not a JSON object".to_owned()));
    }

    let envelope: Envelope = serde_json::from_value(envelope).map_err(error::malformed)?;

    match envelope.status.as_deref() {
        Some("success") => {},
        Some("error") => return Err(Error::QueryFailed {
            error_type: envelope.error_type.unwrap_or_default(),
            message: envelope.error.unwrap_or_default(),
        }),
        Some(status) => return Err(Error::MalformedPayload(format!(
            "unexpected response status: {status:?}"))),
        None => return Err(Error::MalformedPayload("missing response status".to_owned())),
    }

    let data = envelope.data.ok_or_else(|| Error::MalformedPayload(
        "missing response data".to_owned()))?;

    if data.result_type != "matrix" {
        return Err(Error::UnsupportedResultType(data.result_type));
    }

    let result = serde_json::from_value(data.result).map_err(error::malformed)?;

    Ok(PrometheusResponse {
        status: Status::Success,
        data: ResponseData {
            result_type: ResultType::Matrix,
            result,
        },
    })
}

fn timestamp_from_float<E: de::Error>(seconds: f64) -> std::result::Result<DateTime<Utc>, E> {
    if !seconds.is_finite() {
        return Err(E::custom(format_args!("invalid timestamp: {seconds}")));
    }

    let whole = seconds.floor();
    let micros = ((seconds - whole) * 1e6).round().min(999_999.0) as u32;

    DateTime::from_timestamp(whole as i64, micros * 1000).ok_or_else(|| E::custom(format_args!(
        "timestamp {seconds} is out of range")))
}

fn timestamp_to_float(timestamp: &DateTime<Utc>) -> f64 {
    timestamp.timestamp() as f64 + f64::from(timestamp.timestamp_subsec_nanos()) / 1e9
}

fn format_value(value: f64) -> String {
    if value.is_infinite() {
        if value.is_sign_positive() { "+Inf" } else { "-Inf" }.to_owned()
    } else {
        value.to_string()
    }
}

// On the wire a sample is `[unix-seconds, "value"]`.
impl<'de> de::Deserialize<'de> for Sample {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct SampleVisitor;

        impl<'de> Visitor<'de> for SampleVisitor {
            type Value = Sample;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str(r#"a [timestamp, "value"] pair"#)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Sample, A::Error> {
                let seconds: f64 = seq.next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;

                let value: String = seq.next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;

                if seq.next_element::<IgnoredAny>()?.is_some() {
                    return Err(de::Error::invalid_length(3, &self));
                }

                let value: f64 = value.parse().map_err(|_| de::Error::invalid_value(
                    de::Unexpected::Str(&value), &"a number"))?;

                Ok(Sample {
                    timestamp: timestamp_from_float(seconds)?,
                    value,
                })
            }
        }

        deserializer.deserialize_seq(SampleVisitor)
    }
}

impl ser::Serialize for Sample {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut pair = serializer.serialize_tuple(2)?;
        pair.serialize_element(&timestamp_to_float(&self.timestamp))?;
        pair.serialize_element(&format_value(self.value))?;
        pair.end()
    }
}
