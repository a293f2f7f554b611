//! Common test utilities for pipeline tests
//!
//! Builds small configurations so end-to-end runs stay fast.

#![allow(dead_code)]

use traffic_severity::config::Config;
use traffic_severity::models::{Dataset, Record, Severity, WeatherCondition};
use traffic_severity::pipeline::{Pipeline, PipelineRun};

/// Default configuration with a reduced dataset and ensemble
pub fn small_config(records: usize, estimators: usize) -> Config {
    let mut config = Config::default();
    config.generation.record_count = records;
    config.training.model.estimator_count = estimators;
    config
}

pub fn run_pipeline(config: Config) -> PipelineRun {
    Pipeline::new(config)
        .expect("valid configuration")
        .run()
        .expect("pipeline run")
}

/// Records whose weather reduces visibility or grip
pub fn adverse_weather_records(dataset: &Dataset) -> impl Iterator<Item = &Record> {
    dataset
        .records()
        .iter()
        .filter(|r| r.weather_condition.is_adverse())
}

pub fn share_of(records: &[&Record], severity: Severity) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    records.iter().filter(|r| r.severity == severity).count() as f64 / records.len() as f64
}

pub fn is_clear(record: &Record) -> bool {
    record.weather_condition == WeatherCondition::Clear
}
