use std::path::PathBuf;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Default WEkEO HDA broker endpoint.
pub const DEFAULT_BROKER_URL: &str =
    "https://wekeo-broker.apps.mercator.dpi.wekeo.eu/databroker";

/// WEkEO account credentials.
///
/// The broker authenticates `GET /gettoken` with HTTP Basic auth; the
/// base64-encoded `username:password` pair doubles as the account's API key.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Read `HDA_USER` / `HDA_PASSWORD` from the environment.
    pub fn from_env() -> Option<Self> {
        let username = std::env::var("HDA_USER").ok()?;
        let password = std::env::var("HDA_PASSWORD").ok()?;
        Some(Self { username, password })
    }

    /// base64(`username:password`), as shown in the WEkEO API key dialog.
    pub fn api_key(&self) -> String {
        STANDARD.encode(format!("{}:{}", self.username, self.password))
    }
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Broker base URL; everything in the API is relative to this.
    pub broker_url: String,
    /// Directory downloaded files are written to. Created if absent.
    pub download_dir: PathBuf,
    /// Delay between status probes for jobs and orders.
    pub poll_interval: Duration,
    /// Wall-clock budget for one job or order to complete.
    pub poll_timeout: Duration,
    /// Hard cap on status probes per job or order.
    pub poll_max_attempts: u32,
    pub verify_tls: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            broker_url: DEFAULT_BROKER_URL.to_string(),
            download_dir: PathBuf::from("."),
            poll_interval: Duration::from_secs(2),
            poll_timeout: Duration::from_secs(600),
            poll_max_attempts: 300,
            verify_tls: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    use super::Credentials;

    #[test]
    fn api_key_is_reversible() {
        let creds = Credentials::new("jane", "s3cret");
        let key = creds.api_key();
        let decoded = STANDARD.decode(&key).unwrap();
        assert_eq!(decoded, b"jane:s3cret");
    }

    #[test]
    fn api_key_is_deterministic() {
        let a = Credentials::new("jane", "s3cret").api_key();
        let b = Credentials::new("jane", "s3cret").api_key();
        assert_eq!(a, b);
    }
}
