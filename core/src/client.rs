//! Project-level client holding credentials and the shared transport.
//!
//! # Design
//! `Deta` is immutable after construction. The root URL and the
//! auth/content-type header pair are computed once and shared through an
//! `Arc` with every `Base` derived from the client, so handles are cheap to
//! clone and safe to use from many tasks at once. Nothing here validates
//! the credentials or touches the network; a bad project id or key only
//! surfaces when the service rejects the first request.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::base::Base;
use crate::error::ApiError;
use crate::transport::Transport;

/// Service endpoint used unless `DetaBuilder::endpoint` overrides it.
pub const DEFAULT_ENDPOINT: &str = "https://database.deta.sh";

pub const API_KEY_HEADER: &str = "X-API-Key";
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";

struct Shared {
    project_id: String,
    root_url: String,
    headers: Vec<(String, String)>,
    transport: Arc<dyn Transport>,
}

/// Client for one Deta project.
#[derive(Clone)]
pub struct Deta {
    shared: Arc<Shared>,
}

impl Deta {
    /// Client against the public endpoint using the default `ureq`
    /// transport.
    #[cfg(feature = "ureq")]
    pub fn new(project_id: &str, project_key: &str) -> Self {
        Self::from_parts(
            project_id,
            project_key,
            DEFAULT_ENDPOINT,
            Arc::new(crate::transport::UreqTransport::new()),
        )
    }

    /// Client against the public endpoint using a caller-supplied transport.
    pub fn with_transport<T: Transport + 'static>(
        project_id: &str,
        project_key: &str,
        transport: T,
    ) -> Self {
        Self::from_parts(project_id, project_key, DEFAULT_ENDPOINT, Arc::new(transport))
    }

    pub fn builder(project_id: &str, project_key: &str) -> DetaBuilder {
        DetaBuilder {
            project_id: project_id.to_string(),
            project_key: project_key.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            transport: None,
        }
    }

    fn from_parts(
        project_id: &str,
        project_key: &str,
        endpoint: &str,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let root_url = format!("{}/v1/{project_id}/", endpoint.trim_end_matches('/'));
        let headers = vec![
            (API_KEY_HEADER.to_string(), project_key.to_string()),
            (CONTENT_TYPE_HEADER.to_string(), "application/json".to_string()),
        ];
        Self {
            shared: Arc::new(Shared {
                project_id: project_id.to_string(),
                root_url,
                headers,
                transport,
            }),
        }
    }

    /// Handle for the collection `name`. `T` only drives (de)serialization;
    /// nothing checks that stored items actually have that shape.
    pub fn base<T>(&self, name: &str) -> Base<T>
    where
        T: Serialize + DeserializeOwned,
    {
        Base::new(self.clone(), name)
    }

    /// Schema-less handle yielding raw JSON items.
    pub fn base_json(&self, name: &str) -> Base<Value> {
        self.base(name)
    }

    pub fn project_id(&self) -> &str {
        &self.shared.project_id
    }

    /// `{endpoint}/v1/{project_id}/`, always with the trailing slash.
    pub fn root_url(&self) -> &str {
        &self.shared.root_url
    }

    /// The header pair attached to every request.
    pub fn headers(&self) -> &[(String, String)] {
        &self.shared.headers
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.shared.transport.as_ref()
    }
}

impl fmt::Debug for Deta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deta")
            .field("project_id", &self.shared.project_id)
            .field("root_url", &self.shared.root_url)
            .finish_non_exhaustive()
    }
}

/// Configures a `Deta` client before construction.
pub struct DetaBuilder {
    project_id: String,
    project_key: String,
    endpoint: String,
    transport: Option<Arc<dyn Transport>>,
}

impl DetaBuilder {
    /// Scheme and host of the service, e.g. `http://127.0.0.1:3000`.
    /// Trailing slashes are ignored.
    pub fn endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn build(self) -> Result<Deta, ApiError> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport()?,
        };
        Ok(Deta::from_parts(
            &self.project_id,
            &self.project_key,
            &self.endpoint,
            transport,
        ))
    }
}

#[cfg(feature = "ureq")]
fn default_transport() -> Result<Arc<dyn Transport>, ApiError> {
    Ok(Arc::new(crate::transport::UreqTransport::new()))
}

#[cfg(not(feature = "ureq"))]
fn default_transport() -> Result<Arc<dyn Transport>, ApiError> {
    Err(ApiError::MissingTransport)
}
