use serde::Serialize;
use serde_json::{Map, Value};
use shared::{ClinicalField, ClinicalInput};
use std::collections::HashMap;
use std::fmt;
use strum::IntoEnumIterator;

/// Declared domain of one clinical field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldRule {
    Integer { min: i64, max: i64 },
    Decimal { min: f64, max: f64 },
    Code(&'static [i64]),
}

pub fn rule_for(field: ClinicalField) -> FieldRule {
    match field {
        ClinicalField::Age => FieldRule::Integer { min: 1, max: 120 },
        ClinicalField::Trestbps => FieldRule::Integer { min: 50, max: 250 },
        ClinicalField::Chol => FieldRule::Integer { min: 100, max: 600 },
        ClinicalField::Thalach => FieldRule::Integer { min: 50, max: 220 },
        ClinicalField::Ca => FieldRule::Integer { min: 0, max: 3 },
        ClinicalField::Oldpeak => FieldRule::Decimal { min: 0.0, max: 10.0 },
        ClinicalField::Sex | ClinicalField::Fbs | ClinicalField::Exang => FieldRule::Code(&[0, 1]),
        ClinicalField::Cp => FieldRule::Code(&[0, 1, 2, 3]),
        ClinicalField::Restecg | ClinicalField::Slope => FieldRule::Code(&[0, 1, 2]),
        ClinicalField::Thal => FieldRule::Code(&[1, 2, 3]),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    Missing,
    NotNumeric,
    NotInteger,
    OutOfRange { min: f64, max: f64 },
    NotInDomain { allowed: &'static [i64] },
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Missing => write!(f, "is required"),
            Constraint::NotNumeric => write!(f, "must be a number"),
            Constraint::NotInteger => write!(f, "must be a whole number"),
            Constraint::OutOfRange { min, max } => {
                write!(f, "must be between {} and {}", min, max)
            }
            Constraint::NotInDomain { allowed } => {
                let codes: Vec<String> = allowed.iter().map(|c| c.to_string()).collect();
                write!(f, "must be one of {}", codes.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{field} {constraint}")]
pub struct ValidationError {
    pub field: ClinicalField,
    pub constraint: Constraint,
}

/// Every field that failed, in canonical field order. Never empty.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid clinical input: {}", summarize(.0))]
pub struct ValidationErrors(Vec<ValidationError>);

fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationErrors {
    pub fn errors(&self) -> &[ValidationError] {
        &self.0
    }

    pub fn fields(&self) -> Vec<ClinicalField> {
        self.0.iter().map(|e| e.field).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Coerced {
    Int(i64),
    Float(f64),
}

/// Validates and coerces a raw form submission into a canonical `ClinicalInput`.
pub fn validate(raw: &Map<String, Value>) -> Result<ClinicalInput, ValidationErrors> {
    let mut errors = Vec::new();
    let mut values: HashMap<ClinicalField, Coerced> = HashMap::with_capacity(13);

    for field in ClinicalField::iter() {
        match check_field(field, raw.get(field.as_ref())) {
            Ok(value) => {
                values.insert(field, value);
            }
            Err(constraint) => errors.push(ValidationError { field, constraint }),
        }
    }

    if !errors.is_empty() {
        log::debug!("Rejected clinical input: {} invalid field(s)", errors.len());
        return Err(ValidationErrors(errors));
    }

    let int = |field: ClinicalField| match values.get(&field) {
        Some(Coerced::Int(v)) => *v,
        Some(Coerced::Float(v)) => *v as i64,
        None => 0,
    };
    let decimal = |field: ClinicalField| match values.get(&field) {
        Some(Coerced::Float(v)) => *v,
        Some(Coerced::Int(v)) => *v as f64,
        None => 0.0,
    };

    Ok(ClinicalInput {
        age: int(ClinicalField::Age) as i32,
        sex: int(ClinicalField::Sex) as u8,
        cp: int(ClinicalField::Cp) as u8,
        trestbps: int(ClinicalField::Trestbps) as i32,
        chol: int(ClinicalField::Chol) as i32,
        fbs: int(ClinicalField::Fbs) as u8,
        restecg: int(ClinicalField::Restecg) as u8,
        thalach: int(ClinicalField::Thalach) as i32,
        exang: int(ClinicalField::Exang) as u8,
        oldpeak: decimal(ClinicalField::Oldpeak),
        slope: int(ClinicalField::Slope) as u8,
        ca: int(ClinicalField::Ca) as u8,
        thal: int(ClinicalField::Thal) as u8,
    })
}

fn check_field(field: ClinicalField, value: Option<&Value>) -> Result<Coerced, Constraint> {
    let value = match value {
        None | Some(Value::Null) => return Err(Constraint::Missing),
        Some(v) => v,
    };

    match rule_for(field) {
        FieldRule::Integer { min, max } => {
            let number = coerce_number(value).ok_or(Constraint::NotNumeric)?;
            if number.fract() != 0.0 {
                return Err(Constraint::NotInteger);
            }
            if number < min as f64 || number > max as f64 {
                return Err(Constraint::OutOfRange {
                    min: min as f64,
                    max: max as f64,
                });
            }
            Ok(Coerced::Int(number as i64))
        }
        FieldRule::Decimal { min, max } => {
            let number = coerce_number(value).ok_or(Constraint::NotNumeric)?;
            if number < min || number > max {
                return Err(Constraint::OutOfRange { min, max });
            }
            Ok(Coerced::Float(number))
        }
        FieldRule::Code(allowed) => {
            let not_in_domain = Constraint::NotInDomain { allowed };
            let code = coerce_code(value).ok_or_else(|| not_in_domain.clone())?;
            if allowed.contains(&code) {
                Ok(Coerced::Int(code))
            } else {
                Err(not_in_domain)
            }
        }
    }
}

/// JSON numbers pass through, numeric strings are parsed. Non-finite values are rejected.
fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok()?
        }
        _ => return None,
    };
    number.is_finite().then_some(number)
}

fn coerce_code(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}
