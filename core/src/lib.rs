//! Async client for the Deta Base key-value document store.
//!
//! # Overview
//! `Deta` holds a project id and key; `Deta::base` derives a `Base` handle
//! for one named collection, which exposes `put`, `get`, `delete`,
//! `insert`, `update` and `query`. Each operation is exactly one HTTP round
//! trip against `https://database.deta.sh/v1/{project}/{base}/...`.
//!
//! # Design
//! - Host-does-IO: every operation is a pure `build_*` (produces an
//!   `HttpRequest`) and a pure `parse_*` (consumes an `HttpResponse`), glued
//!   together by a pluggable `Transport`.
//! - The client is a shim, not a resilience layer: no retries, no caching,
//!   no status-to-error mapping beyond `get` returning `None`.
//! - `Deta` and `Base` are immutable and cheap to clone; concurrent calls
//!   share nothing mutable.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod base;
pub mod client;
pub mod error;
pub mod http;
pub mod transport;
pub mod types;

pub use base::Base;
pub use client::{Deta, DetaBuilder, DEFAULT_ENDPOINT};
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use transport::Transport;
#[cfg(feature = "ureq")]
pub use transport::UreqTransport;
pub use types::{Paging, QueryRequest, QueryResponse, Updates};
