use std::time::Duration;

use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE},
    multipart::Form,
    Client, Method, RequestBuilder, Response,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult};

const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Encodes a server-assigned identifier for use as one path segment.
pub fn encode_segment(raw: &str) -> String {
    utf8_percent_encode(raw, PATH_SEGMENT).to_string()
}

/// The single configured request client every endpoint group goes through.
///
/// JSON content-type and the request timeout are applied to every call;
/// multipart uploads replace the content-type with their own boundary.
/// Nothing is retried here.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: Client,
    base_url: Url,
    timeout: Duration,
    default_headers: HeaderMap,
}

impl HttpClient {
    pub fn new(config: &ClientConfig) -> ApiResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(default_headers.clone())
            .timeout(config.timeout)
            .build()
            .map_err(ApiError::Network)?;

        Ok(Self {
            client,
            base_url: config.api_url.clone(),
            timeout: config.timeout,
            default_headers,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }

    pub fn url(&self, path: &str) -> ApiResult<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let request = self.request(Method::GET, path)?;
        decode(self.send(request).await?).await
    }

    /// `None` entries of `query` are dropped rather than sent empty.
    pub async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> ApiResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let request = self.request(Method::GET, path)?.query(query);
        decode(self.send(request).await?).await
    }

    pub async fn get_bytes(&self, path: &str) -> ApiResult<Bytes> {
        let request = self.request(Method::GET, path)?;
        let response = self.send(request).await?;
        Ok(response.bytes().await?)
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = self.request(Method::POST, path)?.json(body);
        decode(self.send(request).await?).await
    }

    pub async fn patch<T, B>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = self.request(Method::PATCH, path)?.json(body);
        decode(self.send(request).await?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let request = self.request(Method::DELETE, path)?;
        decode(self.send(request).await?).await
    }

    pub async fn post_multipart<T: DeserializeOwned>(&self, path: &str, form: Form) -> ApiResult<T> {
        let request = self.request(Method::POST, path)?.multipart(form);
        decode(self.send(request).await?).await
    }

    fn request(&self, method: Method, path: &str) -> ApiResult<RequestBuilder> {
        let url = self.url(path)?;
        Ok(self.client.request(method, url))
    }

    async fn send(&self, request: RequestBuilder) -> ApiResult<Response> {
        let request = request.build().map_err(ApiError::Network)?;
        let method = request.method().clone();
        let url = request.url().clone();
        debug!(method = %method, url = %url, "sending request");

        let response = self.client.execute(request).await.map_err(|err| {
            warn!(method = %method, url = %url, error = %err, "request failed");
            ApiError::from(err)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(method = %method, url = %url, status = %status, "request rejected");
            return Err(ApiError::from_status(status, body));
        }

        debug!(method = %method, url = %url, status = %status, "request succeeded");
        Ok(response)
    }
}

/// Empty bodies (e.g. `204 No Content` on delete) decode as JSON `null`, so
/// callers can ask for `()` or `Option<T>`.
async fn decode<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let text = response.text().await?;
    let body = if text.trim().is_empty() { "null" } else { text.as_str() };
    Ok(serde_json::from_str(body)?)
}
