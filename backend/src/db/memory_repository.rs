use async_trait::async_trait;
use chrono::Utc;
use shared::{Assessment, UserId};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::assessment_store::{AssessmentQuery, AssessmentStore, NewAssessment, RepositoryError};

/// Process-local record store for development runs and tests.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    records: Arc<RwLock<Vec<Assessment>>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssessmentStore for InMemoryRepository {
    async fn insert(&self, new: NewAssessment) -> Result<Assessment, RepositoryError> {
        let assessment = new.into_assessment(Uuid::new_v4(), Utc::now());
        self.records.write().await.push(assessment.clone());
        log::debug!("Stored assessment {} in memory", assessment.id);
        Ok(assessment)
    }

    async fn select(&self, query: &AssessmentQuery) -> Result<Vec<Assessment>, RepositoryError> {
        let owned: Vec<Assessment> = self
            .records
            .read()
            .await
            .iter()
            .filter(|a| a.user_id == query.user_id)
            .cloned()
            .collect();
        Ok(query.apply(owned))
    }

    async fn get(&self, user_id: UserId, id: Uuid) -> Result<Assessment, RepositoryError> {
        self.records
            .read()
            .await
            .iter()
            .find(|a| a.id == id && a.user_id == user_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }
}
