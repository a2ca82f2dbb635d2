use async_trait::async_trait;
use shared::{Assessment, ClinicalInput, PredictionResult, UserId};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("DynamoDB error: {0}")]
    DynamoDb(String),
    #[error("Item not found")]
    NotFound,
    #[error("Invalid data format: {0}")]
    InvalidData(String),
}

/// An assessment before the store has assigned its id and timestamp.
#[derive(Debug, Clone)]
pub struct NewAssessment {
    pub user_id: UserId,
    pub input: ClinicalInput,
    pub result: PredictionResult,
}

impl NewAssessment {
    pub fn into_assessment(self, id: Uuid, created_at: chrono::DateTime<chrono::Utc>) -> Assessment {
        Assessment {
            id,
            created_at,
            user_id: self.user_id,
            input: self.input,
            prediction: self.result.prediction,
            probability: self.result.probability,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Selects one user's assessments ordered by `created_at`.
#[derive(Debug, Clone)]
pub struct AssessmentQuery {
    pub user_id: UserId,
    pub order: SortOrder,
    pub limit: Option<usize>,
}

impl AssessmentQuery {
    pub fn newest_first(user_id: UserId) -> Self {
        Self {
            user_id,
            order: SortOrder::Descending,
            limit: None,
        }
    }

    pub fn oldest_first(user_id: UserId) -> Self {
        Self {
            user_id,
            order: SortOrder::Ascending,
            limit: None,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Orders and truncates records that already belong to `user_id`.
    pub fn apply(&self, mut records: Vec<Assessment>) -> Vec<Assessment> {
        match self.order {
            SortOrder::Ascending => records.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            SortOrder::Descending => records.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }
        if let Some(limit) = self.limit {
            records.truncate(limit);
        }
        records
    }
}

#[async_trait]
pub trait AssessmentStore: Send + Sync {
    /// Stores a new record, assigning its id and `created_at`. Records are never updated.
    async fn insert(&self, new: NewAssessment) -> Result<Assessment, RepositoryError>;

    async fn select(&self, query: &AssessmentQuery) -> Result<Vec<Assessment>, RepositoryError>;

    /// `NotFound` unless the record exists and belongs to `user_id`.
    async fn get(&self, user_id: UserId, id: Uuid) -> Result<Assessment, RepositoryError>;
}
