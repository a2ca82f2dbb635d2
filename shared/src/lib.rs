use chrono::{DateTime, Utc};
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString};
use uuid::Uuid;

/// The thirteen clinical parameters, in the order the model consumes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(EnumIter, AsRefStr, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ClinicalField {
    Age,
    Sex,
    Cp,
    Trestbps,
    Chol,
    Fbs,
    Restecg,
    Thalach,
    Exang,
    Oldpeak,
    Slope,
    Ca,
    Thal,
}

/// Canonical request sent to the prediction service and stored with each assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalInput {
    pub age: i32,
    pub sex: u8,
    pub cp: u8,
    pub trestbps: i32,
    pub chol: i32,
    pub fbs: u8,
    pub restecg: u8,
    pub thalach: i32,
    pub exang: u8,
    pub oldpeak: f64,
    pub slope: u8,
    pub ca: u8,
    pub thal: u8,
}

/// Binary classification. The string forms are the labels the prediction service emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(EnumString, strum::Display)]
#[serde(into = "u8", try_from = "u8")]
pub enum RiskClass {
    #[strum(serialize = "Low Risk")]
    Low,
    #[strum(serialize = "High Risk")]
    High,
}

impl From<RiskClass> for u8 {
    fn from(class: RiskClass) -> Self {
        match class {
            RiskClass::Low => 0,
            RiskClass::High => 1,
        }
    }
}

impl TryFrom<u8> for RiskClass {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(RiskClass::Low),
            1 => Ok(RiskClass::High),
            other => Err(format!("invalid risk class code: {}", other)),
        }
    }
}

/// Response body of the external prediction service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub risk_label: String,
    pub risk_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub prediction: RiskClass,
    pub probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(Display, From)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

/// A persisted, immutable prediction owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub user_id: UserId,
    #[serde(flatten)]
    pub input: ClinicalInput,
    pub prediction: RiskClass,
    pub probability: f64,
}

impl Assessment {
    pub fn result(&self) -> PredictionResult {
        PredictionResult {
            prediction: self.prediction,
            probability: self.probability,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum AverageRisk {
    High,
    Low,
    #[serde(rename = "N/A")]
    #[strum(serialize = "N/A")]
    NotAvailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total: usize,
    pub avg_risk: AverageRisk,
    pub last_checkup: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: String,
    pub risk: u32,
}
