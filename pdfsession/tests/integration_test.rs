#[path = "integration/common/mod.rs"]
mod common;

#[path = "integration/scenarios.rs"]
mod scenarios;

#[path = "integration/export_properties.rs"]
mod export_properties;

#[path = "integration/preview.rs"]
mod preview;

#[path = "integration/persistence.rs"]
mod persistence;

#[path = "integration/error_cases.rs"]
mod error_cases;
