use std::time::Duration;

use chrono::{DateTime, Utc};
use log::debug;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::ClientBuilder;
use tokio::runtime::{self, Runtime};
use url::Url;

use crate::config::ClientConfig;
use crate::dashboard::{self, DashboardResponse, DashboardSearchHit};
use crate::error::{Error, Result, TransportError};
use crate::response::{self, TimeseriesResponse};
use crate::time::TimeBound;

/// Asynchronous client. Cloning is cheap: clones share the connection pool.
#[derive(Clone)]
pub struct Client {
    server: Url,
    render_path: String,
    http: reqwest::Client,
}

impl Client {
    pub fn new(config: &ClientConfig) -> Result<Client> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(auth) = &config.auth_header {
            let name = HeaderName::from_bytes(auth.name.as_bytes()).map_err(|e| Error::InvalidConfig(format!(
                "Invalid auth header name ({e}): {:?}", auth.name)))?;

            let mut value = HeaderValue::from_str(&auth.value).map_err(|e| Error::InvalidConfig(format!(
                "Invalid {:?} auth header value: {e}", auth.name)))?;
            value.set_sensitive(true);

            headers.insert(name, value);
        }

        let mut builder = ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .default_headers(headers);

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        if config.server.cannot_be_a_base() {
            return Err(Error::InvalidUrl(format!("{} can't be used as a server URL", config.server)));
        }

        Ok(Client {
            server: config.server.clone(),
            render_path: config.render_path.clone(),
            http: builder.build()?,
        })
    }

    /// Queries Graphite's render API for `target` over `[from, until]`.
    pub async fn render(&self, target: &str, from: &TimeBound, until: &TimeBound) -> Result<TimeseriesResponse> {
        let mut url = self.endpoint(self.render_path.split('/'))?;

        url.query_pairs_mut()
            .append_pair("format", "json")
            .append_pair("target", target)
            .append_pair("from", &from.format())
            .append_pair("until", &until.format());

        self.fetch(url, response::decode).await
    }

    /// Runs a Prometheus range query through Grafana's data source proxy.
    pub async fn query_range(
        &self, datasource_id: u64, expr: &str, start: DateTime<Utc>, end: DateTime<Utc>, step: Duration,
    ) -> Result<TimeseriesResponse> {
        let datasource_id = datasource_id.to_string();
        let mut url = self.endpoint(["api", "datasources", "proxy", datasource_id.as_str(), "api", "v1", "query_range"])?;

        url.query_pairs_mut()
            .append_pair("query", expr)
            .append_pair("start", &start.timestamp().to_string())
            .append_pair("end", &end.timestamp().to_string())
            .append_pair("step", &step.as_secs_f64().to_string());

        self.fetch(url, response::decode).await
    }

    pub async fn dashboard(&self, uid: &str) -> Result<DashboardResponse> {
        let url = self.endpoint(["api", "dashboards", "uid", uid])?;
        self.fetch(url, dashboard::decode).await
    }

    pub async fn search_dashboards(&self, query: &str) -> Result<Vec<DashboardSearchHit>> {
        let mut url = self.endpoint(["api", "search"])?;
        url.query_pairs_mut().append_pair("query", query);
        self.fetch(url, dashboard::decode_search).await
    }

    // Appends the path segments to the server URL, keeping its own path prefix if any.
    fn endpoint<'a, I: IntoIterator<Item = &'a str>>(&self, segments: I) -> Result<Url> {
        let mut url = self.server.clone();

        url.path_segments_mut()
            .map_err(|_| Error::InvalidUrl(format!("{} can't be used as a server URL", self.server)))?
            .pop_if_empty()
            .extend(segments.into_iter().filter(|segment| !segment.is_empty()));

        Ok(url)
    }

    async fn fetch<T>(&self, url: Url, decode: fn(&[u8]) -> Result<T>) -> Result<T> {
        debug!("GET {url}...");

        let response = self.http.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|e| e.to_string());
            debug!("{url} returned an error ({status}).");
            return Err(TransportError::Status {status, message: message.trim().to_owned()}.into());
        }

        let body = response.bytes().await?;
        debug!("{url}: got {} bytes.", body.len());

        if body.is_empty() {
            return Err(Error::EmptyResponse);
        }

        decode(&body)
    }
}

/// Synchronous client: runs [`Client`] on a private single-threaded runtime.
///
/// Must not be used from within an async context.
pub struct BlockingClient {
    client: Client,
    runtime: Runtime,
}

impl BlockingClient {
    pub fn new(config: &ClientConfig) -> Result<BlockingClient> {
        let runtime = runtime::Builder::new_current_thread().enable_all().build().map_err(Error::Runtime)?;
        Ok(BlockingClient {
            client: Client::new(config)?,
            runtime,
        })
    }

    pub fn render(&self, target: &str, from: &TimeBound, until: &TimeBound) -> Result<TimeseriesResponse> {
        self.runtime.block_on(self.client.render(target, from, until))
    }

    pub fn query_range(
        &self, datasource_id: u64, expr: &str, start: DateTime<Utc>, end: DateTime<Utc>, step: Duration,
    ) -> Result<TimeseriesResponse> {
        self.runtime.block_on(self.client.query_range(datasource_id, expr, start, end, step))
    }

    pub fn dashboard(&self, uid: &str) -> Result<DashboardResponse> {
        self.runtime.block_on(self.client.dashboard(uid))
    }

    pub fn search_dashboards(&self, query: &str) -> Result<Vec<DashboardSearchHit>> {
        self.runtime.block_on(self.client.search_dashboards(query))
    }
}

#[cfg(test)]
mod tests {
    use httpmock::{Method::GET, MockServer};

    use crate::error::ErrorKind;
    use super::*;

    const GRAPHITE: &str = r#"[{"target":"a","datapoints":[[1.5,1000],[null,1010]]}]"#;

    fn config(server: &MockServer) -> ClientConfig {
        ClientConfig::new(Url::parse(&server.base_url()).unwrap())
    }

    #[test]
    fn render() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/render")
                .query_param("format", "json")
                .query_param("target", "servers.*.load")
                .query_param("from", "-10min")
                .query_param("until", "now")
                .header("accept", "application/json")
                .header("x-api-key", "secret");
            then.status(200).header("Content-Type", "application/json").body(GRAPHITE);
        });

        let client = BlockingClient::new(&config(&server).with_auth_header("X-Api-Key", "secret")).unwrap();
        let response = client.render("servers.*.load", &TimeBound::default_from(), &TimeBound::default_until()).unwrap();

        mock.assert();
        assert!(response.is_graphite());
        assert_eq!(response.into_timeseries()[0].len(), 2);
    }

    #[test]
    fn query_range() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/grafana/api/datasources/proxy/3/api/v1/query_range")
                .query_param("query", "up")
                .query_param("start", "1000")
                .query_param("end", "1600")
                .query_param("step", "15");
            then.status(200).body(r#"{"status":"success","data":{"resultType":"matrix","result":[
                {"metric":{"__name__":"up","job":"node"},"values":[[1000,"1"],[1015,"1"]]}
            ]}}"#);
        });

        let config = ClientConfig::new(Url::parse(&server.url("/grafana/")).unwrap());
        let client = BlockingClient::new(&config).unwrap();

        let response = client.query_range(
            3, "up", DateTime::from_timestamp(1000, 0).unwrap(), DateTime::from_timestamp(1600, 0).unwrap(),
            Duration::from_secs(15)).unwrap();

        mock.assert();
        assert!(response.is_prometheus());
    }

    #[test]
    fn query_range_fractional_step() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/datasources/proxy/1/api/v1/query_range").query_param("step", "1.5");
            then.status(200).body(r#"{"status":"success","data":{"resultType":"matrix","result":[]}}"#);
        });

        let client = BlockingClient::new(&config(&server)).unwrap();
        let response = client.query_range(
            1, "up", DateTime::from_timestamp(1000, 0).unwrap(), DateTime::from_timestamp(1600, 0).unwrap(),
            Duration::from_millis(1500)).unwrap();

        mock.assert();
        assert!(response.is_prometheus());
    }

    #[test]
    fn dashboard() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/dashboards/uid/cIBgcSjkk");
            then.status(200).body(r#"{
                "dashboard": {"id": 1, "uid": "cIBgcSjkk", "title": "Hosts", "tags": ["prod"],
                              "panels": [{"type": "graph", "title": "Load", "targets": [{"target": "servers.*.load"}]}]},
                "meta": {"slug": "hosts"}
            }"#);
        });

        let client = BlockingClient::new(&config(&server)).unwrap();
        let response = client.dashboard("cIBgcSjkk").unwrap();

        mock.assert();
        assert_eq!(response.dashboard.title, "Hosts");
        assert_eq!(response.dashboard.queries().collect::<Vec<_>>(), ["servers.*.load"]);
    }

    #[test]
    fn search_dashboards() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/search").query_param("query", "prod hosts");
            then.status(200).body(r#"[{"id": 1, "uid": "cIBgcSjkk", "title": "Prod hosts", "tags": []}]"#);
        });

        let client = BlockingClient::new(&config(&server)).unwrap();
        let hits = client.search_dashboards("prod hosts").unwrap();

        mock.assert();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].uid, "cIBgcSjkk");
    }

    #[test]
    fn server_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/dashboards/uid/missing");
            then.status(404).body("{\"message\":\"Dashboard not found\"}\n");
        });

        let client = BlockingClient::new(&config(&server)).unwrap();
        let err = client.dashboard("missing").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(matches!(
            err, Error::Transport(TransportError::Status {status, ref message})
            if status == 404 && message == r#"{"message":"Dashboard not found"}"#
        ), "{err}");
    }

    #[test]
    fn empty_response() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/render");
            then.status(200);
        });

        let client = BlockingClient::new(&config(&server)).unwrap();
        let err = client.render("a", &TimeBound::default_from(), &TimeBound::default_until()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyResponse);
    }

    #[test]
    fn connection_error() {
        let config = ClientConfig::new(Url::parse("http://127.0.0.1:1/").unwrap());
        let client = BlockingClient::new(&config).unwrap();

        let err = client.search_dashboards("a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn invalid_config() {
        let config = ClientConfig::new(Url::parse("http://localhost/").unwrap()).with_auth_header("X Api Key", "a");
        assert_eq!(Client::new(&config).err().unwrap().kind(), ErrorKind::InvalidConfig);

        let config = ClientConfig::new(Url::parse("mailto:grafana@example.com").unwrap());
        assert_eq!(Client::new(&config).err().unwrap().kind(), ErrorKind::InvalidUrl);
    }

    #[tokio::test]
    async fn concurrent_requests() {
        let server = MockServer::start_async().await;
        let mock = server.mock_async(|when, then| {
            when.method(GET).path("/render");
            then.status(200).body(GRAPHITE);
        }).await;

        let client = Client::new(&config(&server)).unwrap();
        let (from, last_hour, until) = (TimeBound::default_from(), TimeBound::from("-1h"), TimeBound::default_until());

        let (a, b) = tokio::join!(
            client.render("a", &from, &until),
            client.render("b", &last_hour, &until),
        );

        assert!(a.unwrap().is_graphite());
        assert!(b.unwrap().is_graphite());
        mock.assert_hits_async(2).await;
    }
}
