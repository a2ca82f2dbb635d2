use serde::Serialize;
use shared::{Assessment, ClinicalInput, PredictionResult};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::models::Identity;
use crate::db::assessment_store::{
    AssessmentQuery, AssessmentStore, NewAssessment, RepositoryError, SortOrder,
};

/// What happened to a prediction after it was obtained. Every variant carries the result.
#[derive(Debug)]
pub enum Outcome {
    Saved(Assessment),
    SavedWithWarning {
        result: PredictionResult,
        error: RepositoryError,
    },
    NotPersisted(PredictionResult),
}

impl Outcome {
    pub fn result(&self) -> PredictionResult {
        match self {
            Outcome::Saved(assessment) => assessment.result(),
            Outcome::SavedWithWarning { result, .. } => *result,
            Outcome::NotPersisted(result) => *result,
        }
    }

    pub fn status(&self) -> PersistenceStatus {
        match self {
            Outcome::Saved(_) => PersistenceStatus::Saved,
            Outcome::SavedWithWarning { .. } => PersistenceStatus::SavedWithWarning,
            Outcome::NotPersisted(_) => PersistenceStatus::NotPersisted,
        }
    }

    /// Message shown next to the result, if any.
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            Outcome::Saved(_) => Some("Prediction complete! Result saved to dashboard."),
            Outcome::SavedWithWarning { .. } => {
                Some("Prediction made, but failed to save history.")
            }
            Outcome::NotPersisted(_) => None,
        }
    }

    /// The store failure behind a `SavedWithWarning`.
    pub fn warning(&self) -> Option<&RepositoryError> {
        match self {
            Outcome::SavedWithWarning { error, .. } => Some(error),
            Outcome::Saved(_) | Outcome::NotPersisted(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceStatus {
    Saved,
    SavedWithWarning,
    NotPersisted,
}

/// Decides whether a prediction is stored, and reads back the caller's own history.
#[derive(Clone)]
pub struct PersistenceGate {
    store: Arc<dyn AssessmentStore>,
}

impl PersistenceGate {
    pub fn new(store: Arc<dyn AssessmentStore>) -> Self {
        Self { store }
    }

    /// Makes at most one insert attempt. A failed insert is downgraded to a warning.
    pub async fn submit(
        &self,
        input: &ClinicalInput,
        result: PredictionResult,
        identity: Option<&Identity>,
    ) -> Outcome {
        let Some(identity) = identity else {
            log::info!("Anonymous prediction, not persisted");
            return Outcome::NotPersisted(result);
        };

        let new = NewAssessment {
            user_id: identity.user_id,
            input: input.clone(),
            result,
        };

        match self.store.insert(new).await {
            Ok(assessment) => {
                log::info!(
                    "Saved assessment {} for user {}",
                    assessment.id,
                    identity.user_id
                );
                Outcome::Saved(assessment)
            }
            Err(error) => {
                log::error!(
                    "Failed to save assessment for user {}: {}",
                    identity.user_id,
                    error
                );
                Outcome::SavedWithWarning { result, error }
            }
        }
    }

    pub async fn history(
        &self,
        identity: &Identity,
        order: SortOrder,
        limit: Option<usize>,
    ) -> Result<Vec<Assessment>, RepositoryError> {
        let query = match order {
            SortOrder::Descending => AssessmentQuery::newest_first(identity.user_id),
            SortOrder::Ascending => AssessmentQuery::oldest_first(identity.user_id),
        };
        let query = match limit {
            Some(n) => query.limit(n),
            None => query,
        };
        self.store.select(&query).await
    }

    pub async fn find(&self, identity: &Identity, id: Uuid) -> Result<Assessment, RepositoryError> {
        self.store.get(identity.user_id, id).await
    }
}
