//! Media Client (C4): typed HTTP transport to the MediaMTX control API with
//! retries, jittered backoff, and per-request timeouts.

use std::time::Duration;

use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct MediaClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub jitter_range: f64,
}

/// Typed transport to the media server's HTTP API (spec §4.4).
pub struct MediaClient {
    http: reqwest::Client,
    config: MediaClientConfig,
}

impl MediaClient {
    pub fn new(config: MediaClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(8)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::MediaServer(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(reqwest::Method::GET, path, None::<&Value>).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send(reqwest::Method::POST, path, Some(body)).await
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send(reqwest::Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send::<&Value, Value>(reqwest::Method::DELETE, path, None).await?;
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        self.send::<&Value, Value>(reqwest::Method::GET, "/v3/config/global/get", None)
            .await?;
        Ok(())
    }

    async fn send<B: Serialize, T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T> {
        let url = format!("{}{}", self.config.base_url, path);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let mut request = self.http.request(method.clone(), &url);
            if let Some(body) = body {
                request = request.json(body);
            }

            let result = request.send().await;
            match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<T>()
                            .await
                            .map_err(|e| AppError::MediaServer(e.to_string()));
                    }
                    if status.is_client_error() {
                        let body = response.text().await.unwrap_or_default();
                        return Err(AppError::MediaServerStatus {
                            status: status.as_u16(),
                            body,
                        });
                    }
                    if attempt > self.config.max_retries {
                        let body = response.text().await.unwrap_or_default();
                        return Err(AppError::MediaServerStatus {
                            status: status.as_u16(),
                            body,
                        });
                    }
                }
                Err(e) => {
                    if attempt > self.config.max_retries {
                        return Err(AppError::MediaServer(e.to_string()));
                    }
                }
            }
            tokio::time::sleep(self.backoff_delay(attempt)).await;
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.backoff_base.as_secs_f64() * 2f64.powi((attempt as i32) - 1);
        let jitter = 1.0 + rand::thread_rng().gen_range(-self.config.jitter_range..=self.config.jitter_range);
        Duration::from_secs_f64((base * jitter).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: String) -> MediaClientConfig {
        MediaClientConfig {
            base_url,
            request_timeout: Duration::from_secs(2),
            max_retries: 2,
            backoff_base: Duration::from_millis(5),
            jitter_range: 0.1,
        }
    }

    #[tokio::test]
    async fn get_succeeds_on_first_try() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/paths/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})))
            .mount(&server)
            .await;

        let client = MediaClient::new(config(server.uri())).unwrap();
        let value: Value = client.get("/v3/paths/list").await.unwrap();
        assert_eq!(value["items"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn retries_on_5xx_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/paths/list"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v3/paths/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let client = MediaClient::new(config(server.uri())).unwrap();
        let value: Value = client.get("/v3/paths/list").await.unwrap();
        assert_eq!(value["ok"], serde_json::json!(true));
    }

    #[tokio::test]
    async fn does_not_retry_4xx() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/paths/get/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = MediaClient::new(config(server.uri())).unwrap();
        let err = client.get::<Value>("/v3/paths/get/missing").await.unwrap_err();
        assert!(matches!(err, AppError::MediaServerStatus { status: 404, .. }));
    }
}
