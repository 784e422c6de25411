use crate::challenge::{Challenge, Qop};
use md5::{Digest, Md5};
use reqwest::Request;
use reqwest::header::{AUTHORIZATION, HeaderValue, InvalidHeaderValue};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;
use url::Position;
use uuid::Uuid;

/// The username and password presented to every challenging server
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The parts of a request that take part in the digest.
#[derive(Debug, Clone, Copy)]
pub struct RequestParams<'a> {
    pub method: &'a str,
    pub uri: &'a str,
    /// `None` when the body exists but is not available as a byte slice (a stream).
    pub entity_body: Option<&'a [u8]>,
}

impl<'a> RequestParams<'a> {
    /// Take the method, request target and body from a reqwest request. A request without
    /// a body digests as an empty body.
    pub fn from_request(req: &'a Request) -> Self {
        let url = req.url();
        Self {
            method: req.method().as_str(),
            uri: &url[Position::BeforePath..Position::AfterQuery],
            entity_body: match req.body() {
                None => Some(&[][..]),
                Some(body) => body.as_bytes(),
            },
        }
    }
}

/// A fully serialized `Authorization` header value for one request attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationValue(String);

impl AuthorizationValue {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Merge this value into the request's headers, replacing any `Authorization`
    /// header already present. Nothing else about the request is touched.
    pub fn attach(&self, req: &mut Request) -> Result<(), DigestError> {
        let value = HeaderValue::from_str(&self.0)?;
        req.headers_mut().insert(AUTHORIZATION, value);
        Ok(())
    }
}

impl fmt::Display for AuthorizationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes `Authorization` values for one server challenge.
///
/// The client nonce is chosen once, when the generator is created, and the nonce count is
/// advanced on every successful call to [`generate`](#method.generate). Calls may come from
/// several tasks at once; each one observes a distinct count, though not necessarily in
/// the order the requests reach the server.
#[derive(Debug)]
pub struct DigestGenerator {
    challenge: Challenge,
    cnonce: String,
    nonce_count: AtomicU32,
}

impl DigestGenerator {
    pub fn new(challenge: Challenge) -> Self {
        Self::with_cnonce(challenge, Uuid::new_v4().simple().to_string())
    }

    pub(crate) fn with_cnonce(challenge: Challenge, cnonce: impl Into<String>) -> Self {
        Self {
            challenge,
            cnonce: cnonce.into(),
            nonce_count: AtomicU32::new(0),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_nonce_count(self, used: u32) -> Self {
        self.nonce_count.store(used, Ordering::SeqCst);
        self
    }

    pub fn challenge(&self) -> &Challenge {
        &self.challenge
    }

    /// Compute the header value for exactly one outgoing request attempt.
    ///
    /// Fails without consuming a nonce count if the challenge asks for `auth-int` and the
    /// request body is a stream that can't be hashed up front. Once every nonce count has been
    /// used the generator is spent and only returns [`DigestError::NonceCountExhausted`].
    pub fn generate(
        &self,
        credentials: &Credentials,
        params: &RequestParams<'_>,
    ) -> Result<AuthorizationValue, DigestError> {
        let challenge = &self.challenge;
        let qop = challenge.qop();
        let ha2 = match qop {
            Qop::AuthInt => {
                let body = params.entity_body.ok_or(DigestError::UnbufferedBody)?;
                md5_hex([params.method, ":", params.uri, ":", md5_hex([body]).as_str()])
            }
            Qop::Auth | Qop::None => md5_hex([params.method, ":", params.uri]),
        };

        let count = self
            .nonce_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_add(1))
            .map_err(|_| DigestError::NonceCountExhausted)?
            + 1;
        let nc = format!("{count:08x}");

        let mut ha1 = md5_hex([
            credentials.username.as_str(),
            ":",
            challenge.realm(),
            ":",
            credentials.password.as_str(),
        ]);
        let session = challenge.algorithm().is_some_and(|a| a.is_session());
        if session {
            ha1 = md5_hex([ha1.as_str(), ":", challenge.nonce(), ":", self.cnonce.as_str()]);
        }

        let response = match qop.as_token() {
            Some(token) => md5_hex([
                ha1.as_str(),
                ":",
                challenge.nonce(),
                ":",
                nc.as_str(),
                ":",
                self.cnonce.as_str(),
                ":",
                token,
                ":",
                ha2.as_str(),
            ]),
            None => md5_hex([ha1.as_str(), ":", challenge.nonce(), ":", ha2.as_str()]),
        };

        let mut header = format!(
            r#"Digest username="{}", realm="{}", nonce="{}", uri="{}", response="{}""#,
            quote(&credentials.username),
            quote(challenge.realm()),
            quote(challenge.nonce()),
            quote(params.uri),
            response,
        );
        if let Some(token) = qop.as_token() {
            header.push_str(&format!(", qop={token}, nc={nc}"));
        }
        if qop != Qop::None || session {
            header.push_str(&format!(r#", cnonce="{}""#, quote(&self.cnonce)));
        }
        if let Some(opaque) = challenge.opaque() {
            header.push_str(&format!(r#", opaque="{}""#, quote(opaque)));
        }
        if let Some(algorithm) = challenge.algorithm() {
            header.push_str(&format!(", algorithm={algorithm}"));
        }

        Ok(AuthorizationValue(header))
    }
}

fn md5_hex<P: AsRef<[u8]>>(parts: impl IntoIterator<Item = P>) -> String {
    let mut hasher = Md5::new();
    for part in parts {
        hasher.update(part.as_ref());
    }
    hex::encode(hasher.finalize())
}

fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// All of the errors that can take place while attaching digest credentials to a request
#[derive(Debug, Error)]
pub enum DigestError {
    #[error("auth-int requires the request body, but it is a stream that cannot be hashed")]
    UnbufferedBody,
    #[error("every nonce count for this challenge has been used")]
    NonceCountExhausted,
    #[error("Unable to put the computed digest in a header: {0}")]
    InvalidHeaderValue(#[from] InvalidHeaderValue),
}
