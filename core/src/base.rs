//! Collection handle and its six operations.
//!
//! # Design
//! Each operation is split into a pure `build_*` method that produces an
//! `HttpRequest` and a pure `parse_*` method that consumes an
//! `HttpResponse`. The async methods (`put`, `get`, ...) simply run
//! `build_*`, hand the request to the client's `Transport`, and `parse_*`
//! the result: one round trip, no retries.
//!
//! Status codes are only inspected by `parse_get` (non-success means "no
//! item") and, as a fallback, by `parse_query`. Everything else returns the
//! service's JSON verbatim, error payloads included.

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::client::Deta;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{InsertItem, PutItems, QueryRequest, QueryResponse, Updates};

/// Handle bound to one named collection of a project.
///
/// `T` describes the item shape for (de)serialization; `serde_json::Value`
/// accepts anything.
pub struct Base<T = Value> {
    deta: Deta,
    name: String,
    url: String,
    _item: PhantomData<fn() -> T>,
}

impl<T> Clone for Base<T> {
    fn clone(&self) -> Self {
        Self {
            deta: self.deta.clone(),
            name: self.name.clone(),
            url: self.url.clone(),
            _item: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Base<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Base")
            .field("name", &self.name)
            .field("url", &self.url)
            .finish()
    }
}

impl<T> Base<T>
where
    T: Serialize + DeserializeOwned,
{
    pub(crate) fn new(deta: Deta, name: &str) -> Self {
        let url = format!("{}{name}", deta.root_url());
        Self {
            deta,
            name: name.to_string(),
            url,
            _item: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Root URL of the client followed by the collection name.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn client(&self) -> &Deta {
        &self.deta
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Store `items` in one request, overwriting existing keys.
    ///
    /// Returns the service's JSON as-is, including any per-item failures.
    pub async fn put(&self, items: &[T]) -> Result<Value, ApiError> {
        let req = self.build_put(items)?;
        self.parse_put(self.send(req).await?)
    }

    /// Fetch one item. `None` whenever the service answers with a
    /// non-success status.
    pub async fn get(&self, key: &str) -> Result<Option<T>, ApiError> {
        let req = self.build_get(key);
        self.parse_get(self.send(req).await?)
    }

    /// Delete one item. Deleting an absent key is not an error.
    pub async fn delete(&self, key: &str) -> Result<Value, ApiError> {
        let req = self.build_delete(key);
        self.parse_delete(self.send(req).await?)
    }

    /// Create an item only if its key is not taken. A conflict comes back
    /// as the service's error JSON, not as `Err`.
    pub async fn insert(&self, item: &T) -> Result<Value, ApiError> {
        let req = self.build_insert(item)?;
        self.parse_insert(self.send(req).await?)
    }

    /// Apply `updates` to an existing item. A missing key comes back as the
    /// service's error JSON, not as `Err`.
    pub async fn update(&self, key: &str, updates: &Updates) -> Result<Value, ApiError> {
        let req = self.build_update(key, updates)?;
        self.parse_update(self.send(req).await?)
    }

    /// Fetch one page of items matching any of `query`.
    ///
    /// Pass the previous page's `paging.last` as `last` to continue a scan.
    pub async fn query(
        &self,
        query: Vec<Value>,
        limit: Option<u32>,
        last: Option<&str>,
    ) -> Result<QueryResponse<T>, ApiError> {
        let request = QueryRequest {
            query,
            limit,
            last: last.map(str::to_string),
        };
        self.query_with(&request).await
    }

    pub async fn query_with(&self, request: &QueryRequest) -> Result<QueryResponse<T>, ApiError> {
        let req = self.build_query(request)?;
        self.parse_query(self.send(req).await?)
    }

    async fn send(&self, req: HttpRequest) -> Result<HttpResponse, ApiError> {
        debug!(base = %self.name, method = %req.method, url = %req.url, "sending request");
        let response = self.deta.transport().execute(req).await?;
        debug!(base = %self.name, status = response.status, "received response");
        Ok(response)
    }

    // -----------------------------------------------------------------------
    // Request builders
    // -----------------------------------------------------------------------

    pub fn build_put(&self, items: &[T]) -> Result<HttpRequest, ApiError> {
        let body = to_body(&PutItems { items })?;
        Ok(self.request(HttpMethod::Put, self.items_url(), Some(body)))
    }

    pub fn build_get(&self, key: &str) -> HttpRequest {
        self.request(HttpMethod::Get, self.item_url(key), None)
    }

    pub fn build_delete(&self, key: &str) -> HttpRequest {
        self.request(HttpMethod::Delete, self.item_url(key), None)
    }

    pub fn build_insert(&self, item: &T) -> Result<HttpRequest, ApiError> {
        let body = to_body(&InsertItem { item })?;
        Ok(self.request(HttpMethod::Post, self.items_url(), Some(body)))
    }

    pub fn build_update(&self, key: &str, updates: &Updates) -> Result<HttpRequest, ApiError> {
        let body = to_body(updates)?;
        Ok(self.request(HttpMethod::Patch, self.item_url(key), Some(body)))
    }

    pub fn build_query(&self, query: &QueryRequest) -> Result<HttpRequest, ApiError> {
        let body = to_body(query)?;
        Ok(self.request(HttpMethod::Post, format!("{}/query", self.url), Some(body)))
    }

    fn request(&self, method: HttpMethod, url: String, body: Option<String>) -> HttpRequest {
        HttpRequest {
            method,
            url,
            headers: self.deta.headers().to_vec(),
            body,
        }
    }

    fn items_url(&self) -> String {
        format!("{}/items", self.url)
    }

    /// Keys are escaped as one path segment so `/`, `?` or spaces stay
    /// inside the key.
    fn item_url(&self, key: &str) -> String {
        format!("{}/items/{}", self.url, urlencoding::encode(key))
    }

    // -----------------------------------------------------------------------
    // Response parsers
    // -----------------------------------------------------------------------

    pub fn parse_put(&self, response: HttpResponse) -> Result<Value, ApiError> {
        parse_raw(&response)
    }

    pub fn parse_get(&self, response: HttpResponse) -> Result<Option<T>, ApiError> {
        if !response.is_success() {
            return Ok(None);
        }
        from_body(&response.body).map(Some)
    }

    pub fn parse_delete(&self, response: HttpResponse) -> Result<Value, ApiError> {
        parse_raw(&response)
    }

    pub fn parse_insert(&self, response: HttpResponse) -> Result<Value, ApiError> {
        parse_raw(&response)
    }

    pub fn parse_update(&self, response: HttpResponse) -> Result<Value, ApiError> {
        parse_raw(&response)
    }

    /// A non-success body that is not a query page turns into
    /// `ApiError::HttpError` so the service's message is not lost.
    pub fn parse_query(&self, response: HttpResponse) -> Result<QueryResponse<T>, ApiError> {
        match from_body(&response.body) {
            Ok(page) => Ok(page),
            Err(_) if !response.is_success() => Err(ApiError::HttpError {
                status: response.status,
                body: response.body,
            }),
            Err(e) => Err(e),
        }
    }
}

fn to_body<B: Serialize + ?Sized>(body: &B) -> Result<String, ApiError> {
    serde_json::to_string(body).map_err(|e| ApiError::SerializationError(e.to_string()))
}

fn from_body<R: DeserializeOwned>(body: &str) -> Result<R, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

fn parse_raw(response: &HttpResponse) -> Result<Value, ApiError> {
    from_body(&response.body)
}
