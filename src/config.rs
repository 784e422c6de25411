use crate::DigestInterceptor;
use crate::generate::Credentials;
use crate::origin::OriginGate;
use crate::retry::RetryOptions;
use serde::Deserialize;
use std::io;
use thiserror::Error;
use url::Url;

const CONFIG_FILE: &str = ".digest_interceptor.yml";

impl DigestInterceptor {
    /// Construct the interceptor based on the contents of the config file
    /// `.digest_interceptor.yml` present in the current user's home directory. Returns an
    /// enum error type that includes the error types of all crates used.
    pub fn from_default_file() -> Result<DigestInterceptor, ConfigReadError> {
        Self::from_config_section(&Self::config_section_from_default_file()?)
    }

    pub(crate) fn config_section_from_default_file() -> Result<ConfigFileSection, ConfigReadError> {
        let mut home = dirs::home_dir().ok_or(ConfigReadError::NoHomeDir)?;
        home.push(CONFIG_FILE);
        let config_data = std::fs::read_to_string(&home)?;
        Self::config_section_from_str(&config_data)
    }

    pub(crate) fn config_section_from_str(
        config_data: &str,
    ) -> Result<ConfigFileSection, ConfigReadError> {
        let config_data_value: serde_yml::Value = serde_yml::from_str(config_data)?;
        let common_section = config_data_value
            .get("common")
            .ok_or(ConfigReadError::InvalidFile(None))?;
        let common_section_typed: ConfigFileSection =
            serde_yml::from_value(common_section.clone())?;
        Ok(common_section_typed)
    }

    /// Construct the interceptor based on a passed-in ConfigFileSection instance.
    pub fn from_config_section(
        section: &ConfigFileSection,
    ) -> Result<DigestInterceptor, ConfigReadError> {
        let mut origins = Vec::with_capacity(section.urls.len());
        for url in &section.urls {
            let origin = Url::parse(url)?.origin();
            if !origin.is_tuple() {
                return Err(ConfigReadError::InvalidOrigin(url.clone()));
            }
            origins.push(origin);
        }

        let password = match (&section.password, &section.password_file) {
            (Some(password), _) => password.clone(),
            (None, Some(file)) => std::fs::read_to_string(file)?.trim_end().to_string(),
            (None, None) => return Err(ConfigReadError::NoPassword),
        };

        Ok(DigestInterceptor::new(
            OriginGate::new(origins),
            Credentials::new(section.username.clone(), password),
            &section.retry_options.clone().unwrap_or_default(),
        ))
    }
}

/// All of the configuration data needed to set up a DigestInterceptor. Implements
/// Deserialize to be read from a YAML file easily, or can be created manually.
#[derive(Deserialize, Clone, Default)]
pub struct ConfigFileSection {
    #[serde(default)]
    pub urls: Vec<String>,
    pub username: String,
    pub password: Option<String>,
    pub password_file: Option<String>,
    pub retry_options: Option<RetryOptions>,
}

/// All of the possible errors that can take place when attempting to read a config file. Errors
/// are specific to the libraries that created them, and include the details from those libraries.
#[derive(Debug, Error)]
pub enum ConfigReadError {
    #[error("File Read Error: {0}")]
    FileReadError(#[from] io::Error),
    #[error("Unable to locate the home directory")]
    NoHomeDir,
    #[error("Not a valid digest interceptor config file: {0:?}")]
    InvalidFile(Option<serde_yml::Error>),
    #[error("URL not valid: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("URL has no scheme, host and port to match requests against: {0}")]
    InvalidOrigin(String),
    #[error("Neither password nor password_file were provided")]
    NoPassword,
}

impl From<serde_yml::Error> for ConfigReadError {
    fn from(err: serde_yml::Error) -> ConfigReadError {
        ConfigReadError::InvalidFile(Some(err))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tokio::fs;

    fn section(urls: &[&str]) -> ConfigFileSection {
        ConfigFileSection {
            urls: urls.iter().map(|u| u.to_string()).collect(),
            username: "username".to_string(),
            password: Some("password".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn invalid_url_returns_right_error() {
        let load_result = DigestInterceptor::from_config_section(&section(&["dfaedfaewrfaew"]));
        assert!(matches!(load_result, Err(ConfigReadError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn opaque_origin_returns_right_error() {
        let load_result =
            DigestInterceptor::from_config_section(&section(&["mailto:someone@example.com"]));
        assert!(matches!(load_result, Err(ConfigReadError::InvalidOrigin(_))));
    }

    #[tokio::test]
    async fn missing_password_returns_right_error() {
        let mut config = section(&["https://example.com/"]);
        config.password = None;
        let load_result = DigestInterceptor::from_config_section(&config);
        assert!(matches!(load_result, Err(ConfigReadError::NoPassword)));
    }

    #[tokio::test]
    async fn bad_password_file_returns_right_error() {
        let mut config = section(&["https://example.com/"]);
        config.password = None;
        config.password_file = Some("no_such_file".to_string());
        let load_result = DigestInterceptor::from_config_section(&config);
        assert!(matches!(
            load_result,
            Err(ConfigReadError::FileReadError(_))
        ));
    }

    #[tokio::test]
    async fn password_file_is_read() {
        let filename = "digest_password_file";
        fs::write(&filename, b"secret\n").await.unwrap();
        let mut config = section(&["https://example.com/"]);
        config.password = None;
        config.password_file = Some(filename.to_string());
        let load_result = DigestInterceptor::from_config_section(&config);
        fs::remove_file(&filename).await.unwrap();
        let interceptor = load_result.unwrap();
        let url = Url::parse("https://example.com/x").unwrap();
        assert!(interceptor.gate.admit(&url).is_some());
        assert!(!interceptor.is_authorized(&url));
    }

    #[test]
    fn parses_common_section() {
        let config = DigestInterceptor::config_section_from_str(
            r#"
common: &common
  urls:
    - http://localhost:8080
  username: admin
  password: secret
  retry_options:
    status_codes: [401, 407]
    retry_after: 100
"#,
        )
        .unwrap();
        assert_eq!(config.urls, vec!["http://localhost:8080".to_string()]);
        assert_eq!(config.username, "admin");
        assert_eq!(config.password.as_deref(), Some("secret"));
        let retry = config.retry_options.unwrap();
        assert_eq!(retry.status_codes, vec![401, 407]);
        assert_eq!(retry.retry_after, 100);
        assert_eq!(retry.min_timeout, 0);
        assert_eq!(retry.timeout_factor, 1.0);
    }

    #[test]
    fn missing_common_section_is_invalid() {
        let result = DigestInterceptor::config_section_from_str("other:\n  username: admin\n");
        assert!(matches!(result, Err(ConfigReadError::InvalidFile(None))));
    }

    #[test]
    fn malformed_yaml_is_invalid() {
        let result = DigestInterceptor::config_section_from_str("common: [unclosed");
        assert!(matches!(result, Err(ConfigReadError::InvalidFile(Some(_)))));
    }
}
