use actix_web::{web, HttpResponse};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use shared::{Assessment, ClinicalField, PredictionResult};
use uuid::Uuid;

use crate::assessment::schema::Constraint;
use crate::auth::middleware::{AuthenticatedUser, MaybeIdentity};
use crate::config::HistoryConfig;
use crate::db::assessment_store::{RepositoryError, SortOrder};
use crate::history::filter::{self, display_date};
use crate::persistence::gate::{Outcome, PersistenceStatus};
use crate::stats::engine;
use crate::workflow::{AssessmentWorkflow, WorkflowError};

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<FieldError>,
}

impl ErrorResponse {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            fields: Vec::new(),
        }
    }
}

#[derive(Serialize)]
struct FieldError {
    field: ClinicalField,
    message: String,
    constraint: Constraint,
}

#[derive(Serialize)]
struct PredictResponse {
    result: PredictionResult,
    persistence: PersistenceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    assessment: Option<AssessmentView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notice: Option<&'static str>,
}

impl From<Outcome> for PredictResponse {
    fn from(outcome: Outcome) -> Self {
        let result = outcome.result();
        let persistence = outcome.status();
        let notice = outcome.notice();
        let assessment = match outcome {
            Outcome::Saved(assessment) => Some(AssessmentView::from(assessment)),
            Outcome::SavedWithWarning { .. } | Outcome::NotPersisted(_) => None,
        };
        Self {
            result,
            persistence,
            assessment,
            notice,
        }
    }
}

/// A stored assessment with the strings the history and detail views display.
#[derive(Serialize)]
struct AssessmentView {
    #[serde(flatten)]
    assessment: Assessment,
    date: String,
    risk_label: String,
    confidence: String,
}

impl From<Assessment> for AssessmentView {
    fn from(assessment: Assessment) -> Self {
        Self {
            date: display_date(assessment.created_at),
            risk_label: assessment.prediction.to_string(),
            confidence: format!("{:.1}%", assessment.probability * 100.0),
            assessment,
        }
    }
}

#[derive(Deserialize)]
struct HistoryQuery {
    search: Option<String>,
    limit: Option<usize>,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(index)))
        .service(web::resource("/api/v1/predict").route(web::post().to(predict)))
        .service(
            web::resource("/api/v1/assessments")
                .route(web::get().to(list_assessments))
                .route(web::delete().to(clear_history)),
        )
        .service(web::resource("/api/v1/assessments/recent").route(web::get().to(recent_assessments)))
        .service(web::resource("/api/v1/assessments/{id}").route(web::get().to(get_assessment)))
        .service(web::resource("/api/v1/stats").route(web::get().to(dashboard_stats)))
        .service(web::resource("/api/v1/trend").route(web::get().to(risk_trend)));
}

async fn index() -> HttpResponse {
    HttpResponse::Ok().json(json!({"message": "Welcome to the Heart Disease Risk Assessment API"}))
}

async fn predict(
    workflow: web::Data<AssessmentWorkflow>,
    identity: MaybeIdentity,
    body: web::Json<Map<String, Value>>,
) -> HttpResponse {
    match workflow.submit(&body, identity.0.as_ref()).await {
        Ok(outcome) => {
            if let Some(e) = outcome.warning() {
                warn!("Returning unsaved prediction: {}", e);
            }
            HttpResponse::Ok().json(PredictResponse::from(outcome))
        }
        Err(WorkflowError::Validation(errors)) => {
            info!("Rejected submission: {}", errors);
            let fields = errors
                .errors()
                .iter()
                .map(|e| FieldError {
                    field: e.field,
                    message: e.to_string(),
                    constraint: e.constraint.clone(),
                })
                .collect();
            HttpResponse::UnprocessableEntity().json(ErrorResponse {
                error: "Invalid clinical parameters".into(),
                fields,
            })
        }
        Err(WorkflowError::Prediction(e)) => {
            error!("Prediction service failure: {}", e);
            HttpResponse::BadGateway().json(ErrorResponse::new(
                "Failed to get prediction. Ensure the prediction service is running.",
            ))
        }
    }
}

async fn list_assessments(
    user: AuthenticatedUser,
    workflow: web::Data<AssessmentWorkflow>,
    limits: web::Data<HistoryConfig>,
    query: web::Query<HistoryQuery>,
) -> HttpResponse {
    let limit = query
        .limit
        .unwrap_or(limits.page_limit)
        .min(limits.page_limit);
    match workflow
        .gate()
        .history(&user.0, SortOrder::Descending, Some(limit))
        .await
    {
        Ok(records) => {
            let term = query.search.as_deref().unwrap_or("");
            let views: Vec<AssessmentView> = filter::filter(&records, term)
                .into_iter()
                .map(AssessmentView::from)
                .collect();
            HttpResponse::Ok().json(views)
        }
        Err(e) => store_failure(&user, e),
    }
}

async fn recent_assessments(
    user: AuthenticatedUser,
    workflow: web::Data<AssessmentWorkflow>,
    limits: web::Data<HistoryConfig>,
) -> HttpResponse {
    match workflow
        .gate()
        .history(&user.0, SortOrder::Descending, Some(limits.recent_limit))
        .await
    {
        Ok(records) => {
            let views: Vec<AssessmentView> =
                records.into_iter().map(AssessmentView::from).collect();
            HttpResponse::Ok().json(views)
        }
        Err(e) => store_failure(&user, e),
    }
}

async fn get_assessment(
    user: AuthenticatedUser,
    workflow: web::Data<AssessmentWorkflow>,
    path: web::Path<String>,
) -> HttpResponse {
    let id_str = path.into_inner();
    let id = match Uuid::parse_str(&id_str) {
        Ok(uuid) => uuid,
        Err(_) => return HttpResponse::BadRequest().json(ErrorResponse::new("Invalid UUID format")),
    };
    match workflow.gate().find(&user.0, id).await {
        Ok(assessment) => {
            info!("Retrieved assessment: {}", id);
            HttpResponse::Ok().json(AssessmentView::from(assessment))
        }
        Err(RepositoryError::NotFound) => {
            HttpResponse::NotFound().json(ErrorResponse::new("Assessment not found"))
        }
        Err(e) => store_failure(&user, e),
    }
}

async fn clear_history(user: AuthenticatedUser) -> HttpResponse {
    info!("Refused history deletion for user {}", user.0.user_id);
    HttpResponse::Forbidden().json(ErrorResponse::new("Clear history is disabled"))
}

async fn dashboard_stats(
    user: AuthenticatedUser,
    workflow: web::Data<AssessmentWorkflow>,
) -> HttpResponse {
    match workflow
        .gate()
        .history(&user.0, SortOrder::Descending, None)
        .await
    {
        Ok(records) => HttpResponse::Ok().json(engine::summarize(&records)),
        Err(e) => store_failure(&user, e),
    }
}

async fn risk_trend(user: AuthenticatedUser, workflow: web::Data<AssessmentWorkflow>) -> HttpResponse {
    match workflow
        .gate()
        .history(&user.0, SortOrder::Ascending, None)
        .await
    {
        Ok(records) => HttpResponse::Ok().json(engine::trend(&records)),
        Err(e) => store_failure(&user, e),
    }
}

fn store_failure(user: &AuthenticatedUser, e: RepositoryError) -> HttpResponse {
    error!("Failed to read history for user {}: {:?}", user.0.user_id, e);
    HttpResponse::InternalServerError().json(ErrorResponse::new("Failed to load assessment history"))
}
