use http::HeaderMap;
use http::header::WWW_AUTHENTICATE;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const SCHEME: &str = "Digest";

/// Quality of protection negotiated with the server. It is selected once, when the
/// challenge is parsed, and decides how the request digest is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qop {
    /// The server offered no `qop` at all (RFC 2069 compatibility form)
    None,
    /// Authentication of the request line only
    Auth,
    /// Authentication with integrity protection of the request body
    AuthInt,
}

impl Qop {
    /// The wire token for this mode, or `None` when no qop is sent back.
    pub fn as_token(&self) -> Option<&'static str> {
        match self {
            Qop::None => None,
            Qop::Auth => Some("auth"),
            Qop::AuthInt => Some("auth-int"),
        }
    }

    fn from_offer(offer: &str) -> Result<Qop, ChallengeParseError> {
        let offered: Vec<&str> = offer.split(',').map(str::trim).collect();
        if offered.iter().any(|o| o.eq_ignore_ascii_case("auth-int")) {
            Ok(Qop::AuthInt)
        } else if offered.iter().any(|o| o.eq_ignore_ascii_case("auth")) {
            Ok(Qop::Auth)
        } else {
            Err(ChallengeParseError::UnsupportedQop(offer.to_string()))
        }
    }
}

/// Hash recipe requested by the server. Only the MD5 family is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Md5,
    Md5Sess,
}

impl Algorithm {
    pub fn is_session(&self) -> bool {
        matches!(self, Algorithm::Md5Sess)
    }
}

impl FromStr for Algorithm {
    type Err = ChallengeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("MD5") {
            Ok(Algorithm::Md5)
        } else if s.eq_ignore_ascii_case("MD5-sess") {
            Ok(Algorithm::Md5Sess)
        } else {
            Err(ChallengeParseError::UnsupportedAlgorithm(s.to_string()))
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Algorithm::Md5 => "MD5",
            Algorithm::Md5Sess => "MD5-sess",
        })
    }
}

/// A single server challenge, as parsed from a `WWW-Authenticate: Digest ...` header.
/// It never changes once parsed; a new challenge from the server produces a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    realm: String,
    nonce: String,
    qop: Qop,
    opaque: Option<String>,
    algorithm: Option<Algorithm>,
    stale: bool,
}

impl Challenge {
    /// Parse the value of a `WWW-Authenticate` header. The `Digest` scheme token is
    /// required, and so are the `realm` and `nonce` parameters.
    pub fn parse(header: &str) -> Result<Challenge, ChallengeParseError> {
        let header = header.trim();
        let params = match header.split_once(char::is_whitespace) {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case(SCHEME) => rest,
            _ if header.eq_ignore_ascii_case(SCHEME) => "",
            _ => return Err(ChallengeParseError::NotDigest(header.to_string())),
        };

        let mut params = parse_params(params)?;
        let realm = params
            .remove("realm")
            .ok_or(ChallengeParseError::MissingField("realm"))?;
        let nonce = params
            .remove("nonce")
            .ok_or(ChallengeParseError::MissingField("nonce"))?;
        let qop = match params.get("qop") {
            Some(offer) => Qop::from_offer(offer)?,
            None => Qop::None,
        };
        let algorithm = params
            .get("algorithm")
            .map(|a| a.parse::<Algorithm>())
            .transpose()?;

        Ok(Challenge {
            realm,
            nonce,
            qop,
            opaque: params.remove("opaque"),
            algorithm,
            stale: params
                .get("stale")
                .is_some_and(|s| s.eq_ignore_ascii_case("true")),
        })
    }

    /// Find the first Digest challenge among the `WWW-Authenticate` headers of a response.
    /// Challenges for other schemes are skipped. Returns `None` when there is no Digest
    /// challenge at all, and the parse error of the first one found if it is malformed.
    pub fn from_headers(headers: &HeaderMap) -> Option<Result<Challenge, ChallengeParseError>> {
        headers
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find(|value| is_digest(value))
            .map(Challenge::parse)
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    pub fn qop(&self) -> Qop {
        self.qop
    }

    pub fn opaque(&self) -> Option<&str> {
        self.opaque.as_deref()
    }

    /// The algorithm named by the server, if it named one. Absent means MD5.
    pub fn algorithm(&self) -> Option<Algorithm> {
        self.algorithm
    }

    /// Whether the server flagged the previous nonce as stale. Informational only.
    pub fn stale(&self) -> bool {
        self.stale
    }
}

fn is_digest(value: &str) -> bool {
    let value = value.trim_start();
    value
        .get(..SCHEME.len())
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case(SCHEME))
        && value[SCHEME.len()..]
            .chars()
            .next()
            .is_none_or(char::is_whitespace)
}

/// Split the `name=value, name="quoted value"` list following the scheme token.
/// Names are lowercased; quoted values have their backslash escapes removed.
fn parse_params(input: &str) -> Result<HashMap<String, String>, ChallengeParseError> {
    let syntax_error = || ChallengeParseError::InvalidSyntax(input.to_string());
    let mut params = HashMap::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == ',').is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut name = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && *c != ',' && !c.is_whitespace()) {
            name.push(c);
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if name.is_empty() || chars.next() != Some('=') {
            return Err(syntax_error());
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            loop {
                match chars.next() {
                    Some('\\') => value.push(chars.next().ok_or_else(syntax_error)?),
                    Some('"') => break,
                    Some(c) => value.push(c),
                    None => return Err(syntax_error()),
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| *c != ',' && !c.is_whitespace()) {
                value.push(c);
            }
        }

        params.insert(name.to_ascii_lowercase(), value);
    }

    Ok(params)
}

/// All of the ways a `WWW-Authenticate` header can fail to produce a usable challenge
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChallengeParseError {
    #[error("Not a Digest challenge: {0}")]
    NotDigest(String),
    #[error("Invalid challenge syntax: {0}")]
    InvalidSyntax(String),
    #[error("Challenge is missing the required \"{0}\" parameter")]
    MissingField(&'static str),
    #[error("No supported qop option offered: {0}")]
    UnsupportedQop(String),
    #[error("Unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),
}
