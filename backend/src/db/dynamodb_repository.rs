use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Utc};
use shared::{Assessment, ClinicalInput, RiskClass, UserId};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use super::assessment_store::{AssessmentQuery, AssessmentStore, NewAssessment, RepositoryError};

type Item = HashMap<String, AttributeValue>;

#[derive(Clone)]
pub struct DynamoDbRepository {
    client: Client,
    assessments_table: String,
}

impl DynamoDbRepository {
    pub fn new(client: Client, assessments_table: String) -> Self {
        Self {
            client,
            assessments_table,
        }
    }

    /// Scans every page of the table for items owned by `user_id`.
    async fn scan_user_items(&self, user_id: UserId) -> Result<Vec<Item>, RepositoryError> {
        let mut items = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let result = self
                .client
                .scan()
                .table_name(&self.assessments_table)
                .filter_expression("user_id = :user_id")
                .expression_attribute_values(":user_id", AttributeValue::S(user_id.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

            if let Some(page) = result.items {
                items.extend(page);
            }

            match result.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        log::debug!(
            "Scanned {} assessment item(s) for user {} from '{}'",
            items.len(),
            user_id,
            self.assessments_table
        );
        Ok(items)
    }
}

#[async_trait]
impl AssessmentStore for DynamoDbRepository {
    async fn insert(&self, new: NewAssessment) -> Result<Assessment, RepositoryError> {
        let assessment = new.into_assessment(Uuid::new_v4(), Utc::now());
        let item = assessment_to_item(&assessment);

        match self
            .client
            .put_item()
            .table_name(&self.assessments_table)
            .set_item(Some(item))
            .send()
            .await
        {
            Ok(_) => {
                log::info!(
                    "Stored assessment {} for user {} in DynamoDB",
                    assessment.id,
                    assessment.user_id
                );
                Ok(assessment)
            }
            Err(e) => {
                log::error!(
                    "DynamoDB put_item failed for assessment {}: {:?}",
                    assessment.id,
                    e
                );
                let error_msg = if let Some(service_err) = e.as_service_error() {
                    format!("Service error: {:?}", service_err)
                } else {
                    format!("SDK error: {}", e)
                };
                Err(RepositoryError::DynamoDb(error_msg))
            }
        }
    }

    async fn select(&self, query: &AssessmentQuery) -> Result<Vec<Assessment>, RepositoryError> {
        let items = self.scan_user_items(query.user_id).await?;
        let mut records = Vec::with_capacity(items.len());
        for item in items {
            records.push(parse_assessment_from_item(item)?);
        }
        Ok(query.apply(records))
    }

    async fn get(&self, user_id: UserId, id: Uuid) -> Result<Assessment, RepositoryError> {
        let mut key = HashMap::new();
        key.insert("id".to_string(), AttributeValue::S(id.to_string()));

        let result = self
            .client
            .get_item()
            .table_name(&self.assessments_table)
            .set_key(Some(key))
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        let item = result.item.ok_or(RepositoryError::NotFound)?;
        let assessment = parse_assessment_from_item(item)?;
        if assessment.user_id != user_id {
            log::warn!(
                "User {} requested assessment {} owned by another user",
                user_id,
                id
            );
            return Err(RepositoryError::NotFound);
        }
        Ok(assessment)
    }
}

fn assessment_to_item(assessment: &Assessment) -> Item {
    let input = &assessment.input;
    let mut item = HashMap::new();
    item.insert("id".to_string(), AttributeValue::S(assessment.id.to_string()));
    item.insert(
        "user_id".to_string(),
        AttributeValue::S(assessment.user_id.to_string()),
    );
    item.insert(
        "created_at".to_string(),
        AttributeValue::S(assessment.created_at.to_rfc3339()),
    );

    let numbers: [(&str, String); 13] = [
        ("age", input.age.to_string()),
        ("sex", input.sex.to_string()),
        ("cp", input.cp.to_string()),
        ("trestbps", input.trestbps.to_string()),
        ("chol", input.chol.to_string()),
        ("fbs", input.fbs.to_string()),
        ("restecg", input.restecg.to_string()),
        ("thalach", input.thalach.to_string()),
        ("exang", input.exang.to_string()),
        ("oldpeak", input.oldpeak.to_string()),
        ("slope", input.slope.to_string()),
        ("ca", input.ca.to_string()),
        ("thal", input.thal.to_string()),
    ];
    for (name, value) in numbers {
        item.insert(name.to_string(), AttributeValue::N(value));
    }

    item.insert(
        "prediction".to_string(),
        AttributeValue::N(u8::from(assessment.prediction).to_string()),
    );
    item.insert(
        "probability".to_string(),
        AttributeValue::N(assessment.probability.to_string()),
    );
    item
}

fn number<T: FromStr>(item: &Item, name: &str) -> Result<T, RepositoryError> {
    item.get(name)
        .and_then(|v| v.as_n().ok())
        .and_then(|s| s.parse::<T>().ok())
        .ok_or_else(|| RepositoryError::InvalidData(format!("Invalid {}", name)))
}

fn parse_assessment_from_item(item: Item) -> Result<Assessment, RepositoryError> {
    let id = item
        .get("id")
        .and_then(|v| v.as_s().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| RepositoryError::InvalidData("Invalid id".to_string()))?;

    let user_id = item
        .get("user_id")
        .and_then(|v| v.as_s().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .map(UserId)
        .ok_or_else(|| RepositoryError::InvalidData("Invalid user_id".to_string()))?;

    let created_at = item
        .get("created_at")
        .and_then(|v| v.as_s().ok())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| RepositoryError::InvalidData("Invalid created_at".to_string()))?;

    let input = ClinicalInput {
        age: number(&item, "age")?,
        sex: number(&item, "sex")?,
        cp: number(&item, "cp")?,
        trestbps: number(&item, "trestbps")?,
        chol: number(&item, "chol")?,
        fbs: number(&item, "fbs")?,
        restecg: number(&item, "restecg")?,
        thalach: number(&item, "thalach")?,
        exang: number(&item, "exang")?,
        oldpeak: number(&item, "oldpeak")?,
        slope: number(&item, "slope")?,
        ca: number(&item, "ca")?,
        thal: number(&item, "thal")?,
    };

    let prediction = RiskClass::try_from(number::<u8>(&item, "prediction")?)
        .map_err(RepositoryError::InvalidData)?;
    let probability = number(&item, "probability")?;

    Ok(Assessment {
        id,
        created_at,
        user_id,
        input,
        prediction,
        probability,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Assessment {
        Assessment {
            id: Uuid::new_v4(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap(),
            user_id: UserId(Uuid::new_v4()),
            input: ClinicalInput {
                age: 57,
                sex: 1,
                cp: 3,
                trestbps: 145,
                chol: 233,
                fbs: 1,
                restecg: 0,
                thalach: 150,
                exang: 0,
                oldpeak: 2.3,
                slope: 0,
                ca: 0,
                thal: 1,
            },
            prediction: RiskClass::High,
            probability: 0.734,
        }
    }

    #[test]
    fn item_attributes_use_numeric_columns() {
        let assessment = sample();
        let item = assessment_to_item(&assessment);
        assert_eq!(item.get("prediction").unwrap().as_n().unwrap(), "1");
        assert_eq!(item.get("oldpeak").unwrap().as_n().unwrap(), "2.3");
        assert_eq!(
            item.get("user_id").unwrap().as_s().unwrap(),
            &assessment.user_id.to_string()
        );
        assert_eq!(parse_assessment_from_item(item).unwrap(), assessment);
    }

    #[test]
    fn item_with_unknown_prediction_code_is_invalid() {
        let mut item = assessment_to_item(&sample());
        item.insert("prediction".to_string(), AttributeValue::N("7".into()));
        assert!(matches!(
            parse_assessment_from_item(item),
            Err(RepositoryError::InvalidData(_))
        ));
    }

    #[test]
    fn item_missing_clinical_column_is_invalid() {
        let mut item = assessment_to_item(&sample());
        item.remove("thalach");
        match parse_assessment_from_item(item) {
            Err(RepositoryError::InvalidData(msg)) => assert_eq!(msg, "Invalid thalach"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
