use serde_derive::Serialize;

use crate::error::{Error, ErrorKind, Result};
use crate::graphite::{self, Timeseries};
use crate::prometheus::{self, PrometheusResponse};

/// A decoded query result. The variant is chosen by which backend format the payload parsed as.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TimeseriesResponse {
    Graphite(Vec<Timeseries>),
    Prometheus(PrometheusResponse),
}

impl TimeseriesResponse {
    pub fn is_graphite(&self) -> bool {
        matches!(self, TimeseriesResponse::Graphite(_))
    }

    pub fn is_prometheus(&self) -> bool {
        matches!(self, TimeseriesResponse::Prometheus(_))
    }

    /// Flattens either variant into plain series. Prometheus series are named after their selector.
    pub fn into_timeseries(self) -> Vec<Timeseries> {
        match self {
            TimeseriesResponse::Graphite(series) => series,
            TimeseriesResponse::Prometheus(response) => {
                response.data.result.iter().map(prometheus::MatrixResult::to_timeseries).collect()
            },
        }
    }
}

/// Decodes a query endpoint response.
///
/// The payload carries no backend marker, so the Prometheus envelope is tried first (its `status` object is the more
/// specific shape) and the Graphite series array only if that fails. If the Prometheus envelope was recognized but
/// rejected (an unsupported result type or a query error), that error is returned. Otherwise the Graphite error is
/// returned with the Prometheus one attached.
pub fn decode(data: &[u8]) -> Result<TimeseriesResponse> {
    let prometheus_err = match prometheus::decode(data) {
        Ok(response) => return Ok(TimeseriesResponse::Prometheus(response)),
        Err(err) => err,
    };

    match graphite::decode(data) {
        Ok(series) => Ok(TimeseriesResponse::Graphite(series)),
        Err(graphite_err) => Err(match prometheus_err.kind() {
            ErrorKind::UnsupportedResultType | ErrorKind::QueryFailed => prometheus_err,
            _ => Error::MalformedPayload(format!(
                "{graphite_err} (as Graphite); {prometheus_err} (as Prometheus)")),
        }),
    }
}
