pub mod assessment_store;
pub mod dynamodb_repository;
pub mod memory_repository;
