//! A client for Graphite and for Prometheus behind Grafana's data source proxy.
//!
//! Both backends' query results decode into [`TimeseriesResponse`]. Dashboard metadata decodes into
//! [`DashboardResponse`]. The decoders are pure functions over response bodies and can be used without the client.

mod client;
mod config;
mod error;
mod time;

pub mod dashboard;
pub mod graphite;
pub mod prometheus;
pub mod response;

pub use crate::client::{BlockingClient, Client};
pub use crate::config::{AuthHeader, ClientConfig};
pub use crate::dashboard::{CurrentValue, Dashboard, DashboardResponse, Panel, TemplateValue};
pub use crate::error::{Error, ErrorKind, Result, TransportError};
pub use crate::graphite::{Datapoint, Timeseries};
pub use crate::prometheus::{MatrixResult, PrometheusResponse};
pub use crate::response::TimeseriesResponse;
pub use crate::time::TimeBound;
