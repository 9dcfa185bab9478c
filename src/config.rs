use std::time::Duration;

use serde::de::{self, Deserializer};
use serde_derive::Deserialize;
use url::Url;

/// Connection settings for a Grafana (or bare Graphite) server.
///
/// Deserializable, so it can be embedded into the caller's own configuration file.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub server: Url,

    #[serde(default)]
    pub auth_header: Option<AuthHeader>,

    #[serde(default = "default_render_path")]
    pub render_path: String,

    /// Request timeout, given in (possibly fractional) seconds in configuration files.
    #[serde(default, deserialize_with = "deserialize_timeout")]
    pub timeout: Option<Duration>,
}

/// An arbitrary header attached to every request, e.g. `Authorization: Bearer <token>`.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthHeader {
    pub name: String,
    pub value: String,
}

impl ClientConfig {
    pub fn new(server: Url) -> ClientConfig {
        ClientConfig {
            server,
            auth_header: None,
            render_path: default_render_path(),
            timeout: None,
        }
    }

    pub fn with_auth_header(mut self, name: &str, value: &str) -> ClientConfig {
        self.auth_header = Some(AuthHeader {
            name: name.to_owned(),
            value: value.to_owned(),
        });
        self
    }

    pub fn with_render_path(mut self, path: &str) -> ClientConfig {
        path.clone_into(&mut self.render_path);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> ClientConfig {
        self.timeout = Some(timeout);
        self
    }
}

fn default_render_path() -> String {
    "/render".to_owned()
}

fn deserialize_timeout<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
    let Some(seconds): Option<f64> = de::Deserialize::deserialize(deserializer)? else {
        return Ok(None);
    };

    Duration::try_from_secs_f64(seconds).map(Some).map_err(|_| de::Error::invalid_value(
        de::Unexpected::Float(seconds), &"a non-negative number of seconds"))
}
