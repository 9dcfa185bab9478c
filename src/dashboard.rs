//! Grafana dashboard metadata (`/api/dashboards/uid/:uid` and `/api/search`).

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{self, Error, Result};

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct DashboardResponse {
    pub dashboard: Dashboard,
    pub meta: Meta,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub version: Option<i64>,
    pub slug: Option<String>,
    pub url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub id: i64,
    pub uid: String,
    pub title: String,
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub tags: BTreeSet<String>,
    pub is_starred: Option<bool>,
    pub panels: Option<Vec<Panel>>,
    pub templating: Option<Templates>,
}

impl Dashboard {
    pub fn panels(&self) -> &[Panel] {
        self.panels.as_deref().unwrap_or_default()
    }

    pub fn templates(&self) -> &[Template] {
        self.templating.as_ref().map(|templating| templating.list.as_slice()).unwrap_or_default()
    }

    /// All queries configured on the dashboard's panels, in panel order.
    pub fn queries(&self) -> impl Iterator<Item = &str> + use<'_> {
        self.panels().iter().flat_map(Panel::queries)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Panel {
    #[serde(rename = "type")]
    pub kind: PanelType,
    pub title: String,
    pub description: Option<String>,
    pub datasource: Option<Datasource>,
    pub targets: Option<Vec<Target>>,
}

impl Panel {
    pub fn targets(&self) -> &[Target] {
        self.targets.as_deref().unwrap_or_default()
    }

    pub fn queries(&self) -> impl Iterator<Item = &str> + use<'_> {
        self.targets().iter().filter_map(Target::query)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelType {
    Row,
    Graph,
    Table,
    Singlestat,
    /// Any panel plugin not listed above.
    #[serde(other)]
    Other,
}

/// Grafana refers to data sources either by name (older dashboards) or by a `{"type", "uid"}` reference.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Datasource {
    Name(String),
    Reference {
        #[serde(rename = "type")]
        kind: Option<String>,
        uid: Option<String>,
    },
}

/// A panel query. Graphite panels keep it in `target`, Prometheus ones in `expr`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub ref_id: Option<String>,
    pub target: Option<String>,
    pub expr: Option<String>,
}

impl Target {
    pub fn query(&self) -> Option<&str> {
        [&self.target, &self.expr].into_iter().flatten().map(String::as_str).find(|query| !query.is_empty())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Templates {
    pub list: Vec<Template>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub name: String,
    pub query: String,
    pub datasource: Option<Datasource>,
    pub all_format: Option<AllFormat>,
    pub all_value: Option<String>,
    pub current: CurrentValue,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AllFormat {
    Glob,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct CurrentValue {
    pub text: String,
    pub value: TemplateValue,
}

impl CurrentValue {
    pub fn single(&self) -> Option<&str> {
        match &self.value {
            TemplateValue::Single(value) => Some(value),
            TemplateValue::Multi(_) => None,
        }
    }

    pub fn multi(&self) -> Option<&[String]> {
        match &self.value {
            TemplateValue::Single(_) => None,
            TemplateValue::Multi(values) => Some(values),
        }
    }
}

/// Multi-select variables hold a list of values, the others a single one. Decoding tries the scalar first.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TemplateValue {
    Single(String),
    Multi(Vec<String>),
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSearchHit {
    pub id: i64,
    pub uid: String,
    pub title: String,
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub is_starred: Option<bool>,
}

/// Decodes the `{"dashboard", "meta"}` object returned by the dashboard API.
pub fn decode(data: &[u8]) -> Result<DashboardResponse> {
    decode_templated(data, |value| value.get("dashboard")?.get("templating"))
}

/// Decodes a bare dashboard model (as exported to JSON).
pub fn decode_dashboard(data: &[u8]) -> Result<Dashboard> {
    decode_templated(data, |value| value.get("templating"))
}

pub fn decode_search(data: &[u8]) -> Result<Vec<DashboardSearchHit>> {
    serde_json::from_slice(data).map_err(error::malformed)
}

fn decode_templated<T, F>(data: &[u8], templating: F) -> Result<T>
    where T: DeserializeOwned, F: Fn(&Value) -> Option<&Value>
{
    let value: Value = serde_json::from_slice(data).map_err(error::malformed)?;

    <T as serde::Deserialize>::deserialize(&value).map_err(|err| {
        match templating(&value).and_then(find_ambiguous_value) {
            Some(variable) => Error::AmbiguousValueShape {variable},
            None => error::malformed(err),
        }
    })
}

// Returns the name of the first template variable whose current value is neither a string nor a list of strings.
fn find_ambiguous_value(templating: &Value) -> Option<String> {
    templating.get("list")?.as_array()?.iter().find_map(|template| {
        let valid = match template.get("current")?.get("value")? {
            Value::String(_) => true,
            Value::Array(values) => values.iter().all(Value::is_string),
            _ => false,
        };

        (!valid).then(|| template.get("name").and_then(Value::as_str).unwrap_or_default().to_owned())
    })
}
