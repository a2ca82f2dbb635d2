use async_trait::async_trait;
use reqwest::Client as HttpClient;
use shared::{ClinicalInput, PredictionResponse, PredictionResult, RiskClass};
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum PredictionServiceError {
    #[error("Prediction request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Prediction service returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Malformed prediction response: {0}")]
    MalformedResponse(String),
    #[error("Unrecognized risk label: {0:?}")]
    UnrecognizedLabel(String),
    #[error("Invalid prediction service URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Remote classifier. Every call re-invokes the service; nothing is cached or retried.
#[async_trait]
pub trait PredictionService: Send + Sync {
    async fn predict(&self, input: &ClinicalInput) -> Result<PredictionResult, PredictionServiceError>;
}

#[derive(Clone)]
pub struct HttpPredictionClient {
    http_client: HttpClient,
    endpoint: Url,
}

impl HttpPredictionClient {
    /// `base_url` is the service's API root, e.g. `http://localhost:8000/api/v1`.
    pub fn new(base_url: &str) -> Result<Self, PredictionServiceError> {
        Ok(Self {
            http_client: HttpClient::new(),
            endpoint: predict_endpoint(base_url)?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn predict_endpoint(base_url: &str) -> Result<Url, url::ParseError> {
    let mut base = Url::parse(base_url)?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("predict")
}

#[async_trait]
impl PredictionService for HttpPredictionClient {
    async fn predict(&self, input: &ClinicalInput) -> Result<PredictionResult, PredictionServiceError> {
        log::debug!("POST {}", self.endpoint);

        let response = self
            .http_client
            .post(self.endpoint.clone())
            .json(input)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("Prediction service error ({}): {}", status, body);
            return Err(PredictionServiceError::Status { status, body });
        }

        let body = response.text().await?;
        let parsed: PredictionResponse = serde_json::from_str(&body)
            .map_err(|e| PredictionServiceError::MalformedResponse(e.to_string()))?;

        normalize_response(parsed)
    }
}

/// Maps the service's label onto a `RiskClass` and carries the score through unchanged.
/// Labels other than the two the service is known to emit are rejected.
pub fn normalize_response(
    response: PredictionResponse,
) -> Result<PredictionResult, PredictionServiceError> {
    let prediction = response
        .risk_label
        .parse::<RiskClass>()
        .map_err(|_| PredictionServiceError::UnrecognizedLabel(response.risk_label.clone()))?;

    if !response.risk_score.is_finite() || !(0.0..=1.0).contains(&response.risk_score) {
        return Err(PredictionServiceError::MalformedResponse(format!(
            "risk_score {} outside [0, 1]",
            response.risk_score
        )));
    }

    Ok(PredictionResult {
        prediction,
        probability: response.risk_score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(label: &str, score: f64) -> PredictionResponse {
        PredictionResponse {
            risk_label: label.to_string(),
            risk_score: score,
        }
    }

    #[test]
    fn high_risk_label_maps_to_one() {
        let result = normalize_response(response("High Risk", 0.87)).unwrap();
        assert_eq!(result.prediction, RiskClass::High);
        assert_eq!(u8::from(result.prediction), 1);
        assert_eq!(result.probability, 0.87);
    }

    #[test]
    fn low_risk_label_maps_to_zero_and_keeps_score() {
        let result = normalize_response(response("Low Risk", 0.12)).unwrap();
        assert_eq!(result.prediction, RiskClass::Low);
        assert_eq!(result.probability, 0.12);
    }

    #[test]
    fn unknown_labels_fail_closed() {
        for label in ["high risk", "HIGH RISK", "Moderate Risk", ""] {
            assert!(matches!(
                normalize_response(response(label, 0.5)),
                Err(PredictionServiceError::UnrecognizedLabel(l)) if l == label
            ));
        }
    }

    #[test]
    fn score_outside_unit_interval_is_malformed() {
        assert!(matches!(
            normalize_response(response("Low Risk", 1.2)),
            Err(PredictionServiceError::MalformedResponse(_))
        ));
        assert!(matches!(
            normalize_response(response("Low Risk", -0.01)),
            Err(PredictionServiceError::MalformedResponse(_))
        ));
    }

    #[test]
    fn missing_response_fields_do_not_deserialize() {
        let parsed: Result<PredictionResponse, _> =
            serde_json::from_str(r#"{"risk_label": "High Risk"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn endpoint_is_joined_under_the_api_root() {
        let client = HttpPredictionClient::new("http://localhost:8000/api/v1").unwrap();
        assert_eq!(
            client.endpoint().as_str(),
            "http://localhost:8000/api/v1/predict"
        );

        let client = HttpPredictionClient::new("http://model:8000/api/v1/").unwrap();
        assert_eq!(client.endpoint().as_str(), "http://model:8000/api/v1/predict");

        assert!(matches!(
            HttpPredictionClient::new("not a url"),
            Err(PredictionServiceError::InvalidUrl(_))
        ));
    }

    /// Serves one canned `/api/v1/predict` response on an ephemeral port and
    /// returns the API root to point a client at.
    fn serve(status: u16, body: &'static str) -> String {
        use actix_web::{http::StatusCode, web, App, HttpResponse, HttpServer};

        let server = HttpServer::new(move || {
            App::new().route(
                "/api/v1/predict",
                web::post().to(move || async move {
                    HttpResponse::build(StatusCode::from_u16(status).unwrap())
                        .content_type("application/json")
                        .body(body)
                }),
            )
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();
        let addr = server.addrs()[0];
        actix_web::rt::spawn(server.run());
        format!("http://{}/api/v1", addr)
    }

    fn input() -> ClinicalInput {
        ClinicalInput {
            age: 50,
            sex: 1,
            cp: 0,
            trestbps: 120,
            chol: 200,
            fbs: 0,
            restecg: 0,
            thalach: 150,
            exang: 0,
            oldpeak: 0.0,
            slope: 1,
            ca: 0,
            thal: 2,
        }
    }

    #[actix_web::test]
    async fn successful_response_is_normalized() {
        let base = serve(200, r#"{"risk_label": "Low Risk", "risk_score": 0.12}"#);
        let client = HttpPredictionClient::new(&base).unwrap();

        let result = client.predict(&input()).await.unwrap();
        assert_eq!(
            result,
            PredictionResult {
                prediction: RiskClass::Low,
                probability: 0.12
            }
        );
    }

    #[actix_web::test]
    async fn non_success_status_keeps_status_and_body() {
        let base = serve(503, r#"{"detail": "Model not loaded or unavailable"}"#);
        let client = HttpPredictionClient::new(&base).unwrap();

        match client.predict(&input()).await {
            Err(PredictionServiceError::Status { status, body }) => {
                assert_eq!(status, reqwest::StatusCode::SERVICE_UNAVAILABLE);
                assert!(body.contains("Model not loaded"));
            }
            other => panic!("expected Status error, got {:?}", other),
        }
    }

    #[actix_web::test]
    async fn non_json_body_is_malformed() {
        let base = serve(200, "<html>gateway page</html>");
        let client = HttpPredictionClient::new(&base).unwrap();

        assert!(matches!(
            client.predict(&input()).await,
            Err(PredictionServiceError::MalformedResponse(_))
        ));
    }

    #[actix_web::test]
    async fn string_score_is_malformed() {
        let base = serve(200, r#"{"risk_label": "High Risk", "risk_score": "0.9"}"#);
        let client = HttpPredictionClient::new(&base).unwrap();

        match client.predict(&input()).await {
            Err(PredictionServiceError::MalformedResponse(msg)) => {
                assert!(msg.contains("invalid type: string"), "{}", msg);
            }
            other => panic!("expected MalformedResponse, got {:?}", other),
        }
    }
}
