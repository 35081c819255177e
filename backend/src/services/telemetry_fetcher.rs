use crate::models::TelemetrySample;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    Timeout,
    ConnectionError(String),
    /// Non-2xx response from the polling endpoint
    Status(u16),
    /// Body was not a usable `{current, power, voltage}` reading
    Decode(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Timeout => write!(f, "Telemetry request timed out"),
            FetchError::ConnectionError(msg) => write!(f, "Telemetry connection error: {}", msg),
            FetchError::Status(code) => write!(f, "Telemetry endpoint returned HTTP {}", code),
            FetchError::Decode(msg) => write!(f, "Malformed telemetry payload: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

/// Source of telemetry samples
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn fetch(&self) -> Result<TelemetrySample, FetchError>;
}

/// Raw payload of the polling endpoint. Every field is required: a reading
/// with a missing field must never turn into zero telemetry.
#[derive(Deserialize, Debug)]
struct SensorPayload {
    current: f64,
    power: f64,
    voltage: f64,
}

/// Decode a polling-endpoint body into a validated sample.
pub fn decode_sample(body: &[u8]) -> Result<TelemetrySample, FetchError> {
    // The endpoint answers `null` when the sensor node does not exist yet.
    let payload: Option<SensorPayload> =
        serde_json::from_slice(body).map_err(|e| FetchError::Decode(e.to_string()))?;
    let payload = payload.ok_or_else(|| FetchError::Decode("empty sensor node".to_string()))?;

    let sample = TelemetrySample::new(payload.current, payload.power, payload.voltage);
    sample.validate().map_err(FetchError::Decode)?;
    Ok(sample)
}

/// Polls a fixed HTTP endpoint for the latest reading. No retries: a failed
/// fetch simply waits for the next tick.
pub struct HttpTelemetryFetcher {
    client: reqwest::Client,
    url: String,
}

impl HttpTelemetryFetcher {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl TelemetrySource for HttpTelemetryFetcher {
    async fn fetch(&self) -> Result<TelemetrySample, FetchError> {
        let resp = self.client.get(&self.url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::ConnectionError(e.to_string())
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = resp.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::ConnectionError(e.to_string())
            }
        })?;

        decode_sample(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_decode_valid_payload() {
        let sample = decode_sample(br#"{"current": 0.5, "power": 120, "voltage": 230.1}"#).unwrap();
        assert_eq!(sample, TelemetrySample::new(0.5, 120.0, 230.1));
    }

    #[test]
    fn test_decode_ignores_extra_fields() {
        let sample =
            decode_sample(br#"{"current": 1, "power": 2, "voltage": 3, "energy": 9}"#).unwrap();
        assert_eq!(sample.voltage, 3.0);
    }

    #[test]
    fn test_decode_missing_field_fails() {
        let err = decode_sample(br#"{"current": 0.5, "power": 120}"#).unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[test]
    fn test_decode_null_body_fails() {
        let err = decode_sample(b"null").unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(decode_sample(b"<html>502</html>").is_err());
        assert!(decode_sample(br#"{"current": "high", "power": 1, "voltage": 1}"#).is_err());
    }

    #[test]
    fn test_decode_negative_reading_fails() {
        let err = decode_sample(br#"{"current": -1, "power": 1, "voltage": 1}"#).unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[actix_rt::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sensor.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "current": 1.0, "power": 230.0, "voltage": 255.0
            })))
            .mount(&server)
            .await;

        let fetcher = HttpTelemetryFetcher::new(
            &format!("{}/sensor.json", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap();

        let sample = fetcher.fetch().await.unwrap();
        assert_eq!(sample, TelemetrySample::new(1.0, 230.0, 255.0));
    }

    #[actix_rt::test]
    async fn test_fetch_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = HttpTelemetryFetcher::new(&server.uri(), Duration::from_secs(5)).unwrap();
        assert_eq!(fetcher.fetch().await.unwrap_err(), FetchError::Status(500));
    }

    #[actix_rt::test]
    async fn test_fetch_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"current": 1, "power": 1, "voltage": 1}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let fetcher = HttpTelemetryFetcher::new(&server.uri(), Duration::from_millis(50)).unwrap();
        assert_eq!(fetcher.fetch().await.unwrap_err(), FetchError::Timeout);
    }

    #[actix_rt::test]
    async fn test_fetch_connection_refused() {
        let fetcher =
            HttpTelemetryFetcher::new("http://127.0.0.1:1/sensor.json", Duration::from_secs(2))
                .unwrap();
        assert!(matches!(
            fetcher.fetch().await.unwrap_err(),
            FetchError::ConnectionError(_)
        ));
    }
}
