use serde_json::{Map, Value};
use std::sync::Arc;

use crate::assessment::schema::{self, ValidationErrors};
use crate::auth::models::Identity;
use crate::inference::client::{PredictionService, PredictionServiceError};
use crate::persistence::gate::{Outcome, PersistenceGate};

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Prediction(#[from] PredictionServiceError),
}

/// validate → predict → persist. Persistence is only reached with a result in hand.
#[derive(Clone)]
pub struct AssessmentWorkflow {
    predictor: Arc<dyn PredictionService>,
    gate: PersistenceGate,
}

impl AssessmentWorkflow {
    pub fn new(predictor: Arc<dyn PredictionService>, gate: PersistenceGate) -> Self {
        Self { predictor, gate }
    }

    pub fn gate(&self) -> &PersistenceGate {
        &self.gate
    }

    pub async fn submit(
        &self,
        raw: &Map<String, Value>,
        identity: Option<&Identity>,
    ) -> Result<Outcome, WorkflowError> {
        let input = schema::validate(raw)?;

        let result = self.predictor.predict(&input).await.map_err(|e| {
            log::error!("Prediction failed: {}", e);
            e
        })?;
        log::info!(
            "Prediction complete: {} ({:.3})",
            result.prediction,
            result.probability
        );

        Ok(self.gate.submit(&input, result, identity).await)
    }
}
