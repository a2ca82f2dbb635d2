use chrono::{DateTime, Utc};
use shared::Assessment;

/// Short date as shown in history tables, e.g. `10/19/2026`.
pub fn display_date(at: DateTime<Utc>) -> String {
    at.format("%-m/%-d/%Y").to_string()
}

/// Keeps records whose id or display date contains `term`, preserving order.
/// An empty term matches everything.
pub fn filter<'a, I>(records: I, term: &str) -> Vec<Assessment>
where
    I: IntoIterator<Item = &'a Assessment>,
{
    records
        .into_iter()
        .filter(|a| matches(a, term))
        .cloned()
        .collect()
}

pub fn matches(assessment: &Assessment, term: &str) -> bool {
    term.is_empty()
        || assessment.id.to_string().contains(term)
        || display_date(assessment.created_at).contains(term)
}
