use http::Extensions;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::DigestInterceptor;
use crate::challenge::Challenge;
use crate::generate::{DigestError, DigestGenerator, RequestParams};

#[async_trait::async_trait]
impl Middleware for DigestInterceptor {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        let Some(origin) = self.gate.admit(req.url()) else {
            return next.run(req, extensions).await;
        };
        let origin_str = origin.ascii_serialization();

        // Taken before any Authorization header is attached, so a retry starts clean.
        let retry_req = req.try_clone();
        let current = match self.generator_for(&origin) {
            Some(generator) => match self.authorize(&mut req, &generator) {
                Ok(()) => {
                    debug!(origin = %origin_str, "sending request with digest credentials");
                    Some(generator)
                }
                Err(DigestError::NonceCountExhausted) => {
                    warn!(origin = %origin_str, "nonce count exhausted, sending unauthenticated");
                    self.forget(&origin, &generator);
                    None
                }
                Err(err) => return Err(err.into()),
            },
            None => {
                debug!(origin = %origin_str, "no challenge seen yet, sending unauthenticated");
                None
            }
        };

        let response = next.clone().run(req, extensions).await?;
        if !self.retry_policy.is_trigger(response.status()) {
            return Ok(response);
        }
        if let Some(rejected) = &current {
            self.forget(&origin, rejected);
        }

        let challenge = match Challenge::from_headers(response.headers()) {
            None => return Ok(response),
            Some(Err(err)) => {
                warn!(origin = %origin_str, error = %err, "ignoring unusable digest challenge");
                return Ok(response);
            }
            Some(Ok(challenge)) => challenge,
        };
        let Some(mut retry_req) = retry_req else {
            warn!(origin = %origin_str, "request body cannot be replayed, not answering challenge");
            return Ok(response);
        };
        drop(response);

        debug!(
            origin = %origin_str,
            realm = challenge.realm(),
            qop = ?challenge.qop(),
            stale = challenge.stale(),
            "answering digest challenge"
        );
        let generator = Arc::new(DigestGenerator::new(challenge));
        self.remember(origin.clone(), generator.clone());

        self.retry_policy.wait().await;
        self.authorize(&mut retry_req, &generator)?;
        let response = next.run(retry_req, extensions).await?;
        if self.retry_policy.is_trigger(response.status()) {
            warn!(
                origin = %origin_str,
                status = response.status().as_u16(),
                "digest credentials were rejected"
            );
            self.forget(&origin, &generator);
        }
        Ok(response)
    }
}

impl DigestInterceptor {
    /// Compute a fresh `Authorization` value for `req` and attach it.
    fn authorize(
        &self,
        req: &mut Request,
        generator: &DigestGenerator,
    ) -> std::result::Result<(), DigestError> {
        let value = generator.generate(&self.credentials, &RequestParams::from_request(req))?;
        value.attach(req)
    }
}

impl From<DigestError> for reqwest_middleware::Error {
    fn from(value: DigestError) -> Self {
        reqwest_middleware::Error::Middleware(value.into())
    }
}
