use std::{collections::BTreeMap, fs, future::Future, path::Path, pin::Pin, time::Duration};

use bytes::Bytes;
use color_eyre::{Result, eyre::WrapErr as _};
use log::debug;
use reqwest::{
    Client, RequestBuilder,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use serde_json::Value;

use crate::error::BoxError;

pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<HttpResponse, BoxError>> + Send + 'a>>;

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The two calls the inference client needs. A non-2xx status is a successful call here.
pub trait Transport {
    fn post_json<'a>(&'a self, url: &'a str, body: &'a Value) -> TransportFuture<'a>;
    fn get<'a>(&'a self, url: &'a str) -> TransportFuture<'a>;
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub user_agent: String,
    pub headers: BTreeMap<String, String>,
    /// No deadline unless set.
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("tti/", env!("CARGO_PKG_VERSION")).into(),
            headers: BTreeMap::new(),
            timeout: None,
        }
    }
}

impl ClientConfig {
    /// Merges a json object of header names to string values into the config.
    pub fn load_headers(&mut self, path: &Path) -> Result<()> {
        let src = fs::read_to_string(path)
            .wrap_err_with(|| format!("Reading headers file {}", path.display()))?;
        let headers: BTreeMap<String, Value> = serde_json::from_str(&src)
            .wrap_err_with(|| format!("Parsing headers file {}", path.display()))?;

        for (name, value) in headers {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            if name.eq_ignore_ascii_case("user-agent") {
                self.user_agent = value;
            } else {
                self.headers.insert(name, value);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    /// Sent with the inference call only, never to the hosts named in its response.
    headers: HeaderMap,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes())
                    .wrap_err_with(|| format!("Invalid header name {name:?}"))?,
                HeaderValue::from_str(value)
                    .wrap_err_with(|| format!("Invalid value for header {name}"))?,
            );
        }

        let mut builder = Client::builder().user_agent(&config.user_agent);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            headers,
        })
    }

    fn post_request(&self, url: &str, body: &Value) -> RequestBuilder {
        self.client.post(url).headers(self.headers.clone()).json(body)
    }

    fn get_request(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    async fn send(request: RequestBuilder) -> Result<HttpResponse, BoxError> {
        debug!("request: {request:#?}");
        let resp = request.send().await?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await?;
        Ok(HttpResponse { status, body })
    }
}

impl Transport for HttpTransport {
    fn post_json<'a>(&'a self, url: &'a str, body: &'a Value) -> TransportFuture<'a> {
        Box::pin(Self::send(self.post_request(url, body)))
    }

    fn get<'a>(&'a self, url: &'a str) -> TransportFuture<'a> {
        Box::pin(Self::send(self.get_request(url)))
    }
}
