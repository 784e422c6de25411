#![forbid(unsafe_code)]
//! # digest-interceptor
//!
//! This crate allows users of the Reqwest crate to talk to servers protected by HTTP Digest
//! authentication without handling the challenge themselves. It is a `reqwest-middleware`
//! middleware: requests to a configured set of origins are watched for a `401` carrying a
//! `WWW-Authenticate: Digest ...` challenge, which is answered by repeating the request once
//! with a computed `Authorization` header. Usage example:
//!
//! ```no_run
//! use digest_interceptor::DigestInterceptor;
//! # async fn make_authenticated_request() {
//! let interceptor = DigestInterceptor::from_default_file().unwrap();
//! let client = interceptor.client();
//! match client.get("https://camera.example.com/snapshot").send().await {
//!     Err(err) => println!("Got error {}", err),
//!     Ok(response) => println!("Got response with status {}", response.status()),
//! }
//! # }
//! ```
//!
//! The above code will read the configuration from a file in `~/.digest_interceptor.yml`
//! which format is:
//! ```yaml
//! common:
//!   urls:
//!     - https://camera.example.com
//!   username: <USERNAME>
//!   password_file: <PATH TO A FILE HOLDING THE PASSWORD>
//!   retry_options:
//!     status_codes: [401]
//! ```
//!
//! Once a challenge from an origin has been answered, later requests to that origin carry
//! credentials straight away, with a new nonce count each time, so they cost no extra round
//! trip. A fresh challenge from the server replaces the one in use. Requests to origins that
//! are not in the list are passed through untouched.

use ::reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use url::{Origin, Url};

/// This is the primary struct of this crate. It holds the credentials and the list of
/// origins to authenticate against, and remembers the challenge answered for each origin.
///
/// Clones share the remembered challenges, so a cloned interceptor behaves as the same
/// instance. Separately constructed interceptors share nothing.
#[derive(Clone)]
pub struct DigestInterceptor {
    gate: OriginGate,
    credentials: Credentials,
    retry_policy: RetryPolicy,
    generators: Arc<RwLock<HashMap<Origin, Arc<DigestGenerator>>>>,
}

/// Parsing of `WWW-Authenticate` Digest challenges
pub mod challenge;
/// Helpers to parse configuration files or supply structs and construct the interceptor
pub mod config;
/// Computation of `Authorization` values for a parsed challenge
pub mod generate;
/// The allow-list of origins that get digest handling
pub mod origin;
#[cfg(test)]
mod protocol_test_suite;
mod reqwest_middleware;
/// The single authenticated retry
pub mod retry;

pub use challenge::{Algorithm, Challenge, ChallengeParseError, Qop};
pub use config::{ConfigFileSection, ConfigReadError};
pub use generate::{AuthorizationValue, Credentials, DigestError, DigestGenerator, RequestParams};
pub use origin::OriginGate;
pub use retry::{RetryOptions, RetryPolicy};

impl DigestInterceptor {
    pub fn new(gate: OriginGate, credentials: Credentials, retry_options: &RetryOptions) -> Self {
        Self {
            gate,
            credentials,
            retry_policy: RetryPolicy::new(retry_options),
            generators: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Build a client that sends every request through this interceptor.
    pub fn client(&self) -> ClientWithMiddleware {
        let builder = ClientBuilder::new(Client::new()).with(self.clone());
        #[cfg(any(
            feature = "tracing-otel-26",
            feature = "tracing-otel-27",
            feature = "tracing-otel-28",
            feature = "tracing-otel-29",
            feature = "tracing-otel-30",
        ))]
        let builder = builder.with(reqwest_tracing::TracingMiddleware::default());
        builder.build()
    }

    /// Whether requests to the origin of `url` currently go out with credentials attached.
    pub fn is_authorized(&self, url: &Url) -> bool {
        self.generator_for(&url.origin()).is_some()
    }

    pub(crate) fn generator_for(&self, origin: &Origin) -> Option<Arc<DigestGenerator>> {
        let generators = self.generators.read().unwrap_or_else(PoisonError::into_inner);
        generators.get(origin).cloned()
    }

    pub(crate) fn remember(&self, origin: Origin, generator: Arc<DigestGenerator>) {
        let mut generators = self.generators.write().unwrap_or_else(PoisonError::into_inner);
        generators.insert(origin, generator);
    }

    /// Drop the generator for `origin`, unless another request has already replaced it.
    pub(crate) fn forget(&self, origin: &Origin, generator: &Arc<DigestGenerator>) {
        let mut generators = self.generators.write().unwrap_or_else(PoisonError::into_inner);
        if generators
            .get(origin)
            .is_some_and(|current| Arc::ptr_eq(current, generator))
        {
            generators.remove(origin);
        }
    }
}
