//! Adafruit IO REST client (API v2)

use reqwest::{Response, StatusCode};
use serde_json::json;
use std::fmt;
use std::time::Duration;

use super::{Feed, TelemetryError, TelemetrySink};

pub const API_BASE: &str = "https://io.adafruit.com/api/v2";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct AdafruitIo {
    client: reqwest::Client,
    base_url: String,
    username: String,
    key: String,
}

// keeps the AIO key out of debug logs
impl fmt::Debug for AdafruitIo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdafruitIo")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl AdafruitIo {
    pub fn new(username: &str, key: &str) -> Result<Self, TelemetryError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("enviromon/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: API_BASE.to_string(),
            username: username.to_string(),
            key: key.to_string(),
        })
    }

    fn feeds_url(&self) -> String {
        format!(
            "{}/{}/feeds",
            self.base_url,
            urlencoding::encode(&self.username)
        )
    }

    fn feed_url(&self, key: &str) -> String {
        format!("{}/{}", self.feeds_url(), urlencoding::encode(key))
    }
}

/// Map HTTP status codes onto the error taxonomy
async fn check(response: Response, key: &str) -> Result<Response, TelemetryError> {
    match response.status() {
        StatusCode::NOT_FOUND => Err(TelemetryError::NotFound(key.to_string())),
        StatusCode::TOO_MANY_REQUESTS => Err(TelemetryError::Throttled),
        status if !status.is_success() => Err(TelemetryError::Status {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        }),
        _ => Ok(response),
    }
}

impl TelemetrySink for AdafruitIo {
    async fn lookup_feed(&self, key: &str) -> Result<Feed, TelemetryError> {
        let response = self
            .client
            .get(self.feed_url(key))
            .header("X-AIO-Key", &self.key)
            .send()
            .await?;

        Ok(check(response, key).await?.json::<Feed>().await?)
    }

    async fn create_feed(&self, key: &str) -> Result<Feed, TelemetryError> {
        let response = self
            .client
            .post(self.feeds_url())
            .header("X-AIO-Key", &self.key)
            .json(&json!({ "feed": { "name": key, "key": key } }))
            .send()
            .await?;

        Ok(check(response, key).await?.json::<Feed>().await?)
    }

    async fn push(&self, feed: &Feed, value: f64) -> Result<(), TelemetryError> {
        let response = self
            .client
            .post(format!("{}/data", self.feed_url(&feed.key)))
            .header("X-AIO-Key", &self.key)
            .json(&json!({ "value": value }))
            .send()
            .await?;

        check(response, &feed.key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_are_encoded() {
        let aio = AdafruitIo::new("jane doe", "secret").unwrap();
        assert_eq!(aio.feeds_url(), "https://io.adafruit.com/api/v2/jane%20doe/feeds");
        assert_eq!(
            aio.feed_url("enviro.temp"),
            "https://io.adafruit.com/api/v2/jane%20doe/feeds/enviro.temp"
        );
    }

    #[test]
    fn test_debug_hides_key() {
        let aio = AdafruitIo::new("jane", "aio_SuperSecret").unwrap();
        let dbg = format!("{:?}", aio);
        assert!(dbg.contains("jane"));
        assert!(!dbg.contains("SuperSecret"));
    }
}
