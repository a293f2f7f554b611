//! Correlation injection
//!
//! Rewrites the severity label of records matching risk predicates by
//! redrawing it from a rule-specific distribution. Rules run in declaration
//! order, each against the output of the previous one, and never touch any
//! field other than `severity`.

use crate::error::{AppError, Result};
use crate::models::{fields, Dataset, Record, RoadType, Severity, WeatherCondition};
use crate::synthetic::distribution::{weighted, CategoricalDistribution, WeightedValue};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

/// Comparison applied by a rule condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    GreaterThan,
    AtLeast,
    LessThan,
    In,
    NotIn,
}

/// `field <operator> value` test against a single record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCondition {
    pub field: String,
    pub operator: ConditionOperator,
    pub value: JsonValue,
}

impl RuleCondition {
    pub fn new(field: &str, operator: ConditionOperator, value: JsonValue) -> Self {
        Self {
            field: field.to_string(),
            operator,
            value,
        }
    }

    fn validate(&self, rule: &str) -> Result<()> {
        if !fields::ALL.contains(&self.field.as_str()) {
            return Err(AppError::InvalidConfiguration(format!(
                "rule '{}' references unknown field '{}'",
                rule, self.field
            )));
        }

        match self.operator {
            ConditionOperator::In | ConditionOperator::NotIn if !self.value.is_array() => {
                Err(AppError::InvalidConfiguration(format!(
                    "rule '{}': '{}' requires a list value",
                    rule, self.field
                )))
            }
            ConditionOperator::GreaterThan
            | ConditionOperator::AtLeast
            | ConditionOperator::LessThan
                if !self.value.is_number() =>
            {
                Err(AppError::InvalidConfiguration(format!(
                    "rule '{}': '{}' requires a numeric value",
                    rule, self.field
                )))
            }
            _ => Ok(()),
        }
    }

    /// Evaluate the condition against a record
    pub fn evaluate(&self, record: &Record) -> bool {
        let Some(actual) = record.field_value(&self.field) else {
            return false;
        };

        match self.operator {
            ConditionOperator::Equals => values_equal(&actual, &self.value),
            ConditionOperator::NotEquals => !values_equal(&actual, &self.value),
            ConditionOperator::GreaterThan => compare_numbers(&actual, &self.value, |a, b| a > b),
            ConditionOperator::AtLeast => compare_numbers(&actual, &self.value, |a, b| a >= b),
            ConditionOperator::LessThan => compare_numbers(&actual, &self.value, |a, b| a < b),
            ConditionOperator::In => check_in(&actual, &self.value),
            ConditionOperator::NotIn => !check_in(&actual, &self.value),
        }
    }
}

fn values_equal(a: &JsonValue, b: &JsonValue) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) if a.is_number() && b.is_number() => x == y,
        _ => a == b,
    }
}

fn compare_numbers<F>(a: &JsonValue, b: &JsonValue, cmp: F) -> bool
where
    F: Fn(f64, f64) -> bool,
{
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => cmp(x, y),
        _ => false,
    }
}

fn check_in(value: &JsonValue, array: &JsonValue) -> bool {
    array
        .as_array()
        .map(|items| items.iter().any(|item| values_equal(value, item)))
        .unwrap_or(false)
}

/// Redraw the severity of every record satisfying all conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResamplingRule {
    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Conditions that must all hold for a record to be resampled
    pub conditions: Vec<RuleCondition>,

    /// Distribution the new label is drawn from
    pub distribution: Vec<WeightedValue<Severity>>,
}

fn default_true() -> bool {
    true
}

impl ResamplingRule {
    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|c| c.evaluate(record))
    }

    /// Highway at 60 mph or more, not already fatal: redraw with elevated fatality risk
    pub fn high_speed_highway() -> Self {
        Self {
            name: "high_speed_highway".to_string(),
            enabled: true,
            conditions: vec![
                RuleCondition::new(
                    fields::ROAD_TYPE,
                    ConditionOperator::Equals,
                    json!(RoadType::Highway.to_string()),
                ),
                RuleCondition::new(fields::SPEED_LIMIT_MPH, ConditionOperator::AtLeast, json!(60)),
                RuleCondition::new(
                    fields::SEVERITY,
                    ConditionOperator::NotEquals,
                    json!(Severity::Fatal.to_string()),
                ),
            ],
            distribution: weighted(&[
                (Severity::Minor, 0.4),
                (Severity::Serious, 0.4),
                (Severity::Fatal, 0.2),
            ]),
        }
    }

    /// Minor accidents in rain, snow or fog: upgrade to serious or fatal
    pub fn adverse_weather_escalation() -> Self {
        Self {
            name: "adverse_weather_escalation".to_string(),
            enabled: true,
            conditions: vec![
                RuleCondition::new(
                    fields::WEATHER_CONDITION,
                    ConditionOperator::In,
                    json!([
                        WeatherCondition::Rainy.to_string(),
                        WeatherCondition::Snowy.to_string(),
                        WeatherCondition::Foggy.to_string(),
                    ]),
                ),
                RuleCondition::new(
                    fields::SEVERITY,
                    ConditionOperator::Equals,
                    json!(Severity::Minor.to_string()),
                ),
            ],
            distribution: weighted(&[(Severity::Serious, 0.8), (Severity::Fatal, 0.2)]),
        }
    }
}

/// Ordered rule list applied by the injector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    pub rules: Vec<ResamplingRule>,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            rules: vec![
                ResamplingRule::high_speed_highway(),
                ResamplingRule::adverse_weather_escalation(),
            ],
        }
    }
}

/// Effect of one rule on a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub rule: String,

    /// Row positions the predicate matched, in dataset order
    pub matched_rows: Vec<usize>,

    /// Matched rows whose label actually changed
    pub changed: usize,
}

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: ResamplingRule,
    distribution: CategoricalDistribution<Severity>,
}

/// Applies resampling rules sequentially to a dataset
#[derive(Debug, Clone)]
pub struct CorrelationInjector {
    rules: Vec<CompiledRule>,
}

impl CorrelationInjector {
    pub fn new(config: &CorrelationConfig) -> Result<Self> {
        Self::from_rules(config.rules.clone())
    }

    /// Validate and compile rules; disabled rules are dropped
    pub fn from_rules(rules: Vec<ResamplingRule>) -> Result<Self> {
        let mut compiled = Vec::with_capacity(rules.len());

        for rule in rules.into_iter().filter(|r| r.enabled) {
            if rule.conditions.is_empty() {
                return Err(AppError::InvalidConfiguration(format!(
                    "rule '{}' must have at least one condition",
                    rule.name
                )));
            }
            for condition in &rule.conditions {
                condition.validate(&rule.name)?;
            }

            let distribution = CategoricalDistribution::new(&rule.name, &rule.distribution)?;

            tracing::debug!(
                rule = %rule.name,
                conditions = rule.conditions.len(),
                "Compiled resampling rule"
            );

            compiled.push(CompiledRule { rule, distribution });
        }

        Ok(Self { rules: compiled })
    }

    /// Names of active rules in application order
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|c| c.rule.name.as_str()).collect()
    }

    /// Run every rule in order; each matching record gets its own independent draw
    pub fn apply<R: Rng + ?Sized>(&self, dataset: &mut Dataset, rng: &mut R) -> Vec<RuleOutcome> {
        let mut outcomes = Vec::with_capacity(self.rules.len());

        for compiled in &self.rules {
            let mut matched_rows = Vec::new();
            let mut changed = 0;

            for (row, record) in dataset.records_mut().iter_mut().enumerate() {
                if !compiled.rule.matches(record) {
                    continue;
                }

                let redrawn = compiled.distribution.sample(rng);
                if redrawn != record.severity {
                    changed += 1;
                }
                record.severity = redrawn;
                matched_rows.push(row);
            }

            tracing::info!(
                rule = %compiled.rule.name,
                matched = matched_rows.len(),
                changed,
                "Applied resampling rule"
            );

            outcomes.push(RuleOutcome {
                rule: compiled.rule.name.clone(),
                matched_rows,
                changed,
            });
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::tests::sample_record;
    use crate::models::{DriverAgeGroup, JunctionType};
    use crate::synthetic::random_source;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn record(road: RoadType, speed: u32, weather: WeatherCondition, severity: Severity) -> Record {
        Record {
            id: Uuid::nil(),
            date: NaiveDate::from_ymd_opt(2023, 3, 14).unwrap(),
            time_of_day_hour: 17,
            road_type: road,
            weather_condition: weather,
            speed_limit_mph: speed,
            num_vehicles_involved: 1,
            junction_type: JunctionType::TJunction,
            driver_age_group: DriverAgeGroup::Over50,
            severity,
        }
    }

    #[test]
    fn test_condition_operators() {
        use ConditionOperator::*;
        let r = sample_record(Severity::Minor);
        let holds = |field: &str, op: ConditionOperator, value: JsonValue| {
            RuleCondition::new(field, op, value).evaluate(&r)
        };

        assert!(holds("road_type", Equals, json!("Highway")));
        assert!(holds("speed_limit_mph", AtLeast, json!(60)));
        assert!(!holds("speed_limit_mph", GreaterThan, json!(60)));
        assert!(holds("speed_limit_mph", Equals, json!(60.0)));
        assert!(holds("time_of_day_hour", LessThan, json!(9)));
        assert!(holds("weather_condition", In, json!(["Rainy", "Snowy"])));
        assert!(holds("severity", NotIn, json!(["Fatal"])));
        assert!(!holds("severity", NotEquals, json!("Minor")));
    }

    #[test]
    fn test_rule_validation() {
        let mut unknown_field = ResamplingRule::high_speed_highway();
        unknown_field.conditions[0].field = "surface".to_string();
        assert!(CorrelationInjector::from_rules(vec![unknown_field]).is_err());

        let mut no_conditions = ResamplingRule::high_speed_highway();
        no_conditions.conditions.clear();
        assert!(CorrelationInjector::from_rules(vec![no_conditions]).is_err());

        let mut bad_distribution = ResamplingRule::adverse_weather_escalation();
        bad_distribution.distribution = weighted(&[(Severity::Serious, 0.5)]);
        assert!(matches!(
            CorrelationInjector::from_rules(vec![bad_distribution]),
            Err(AppError::InvalidConfiguration(_))
        ));

        let mut scalar_in = ResamplingRule::adverse_weather_escalation();
        scalar_in.conditions[0].value = json!("Rainy");
        assert!(CorrelationInjector::from_rules(vec![scalar_in]).is_err());
    }

    #[test]
    fn test_disabled_rules_skipped() {
        let mut rule = ResamplingRule::high_speed_highway();
        rule.enabled = false;
        let injector = CorrelationInjector::from_rules(vec![
            rule,
            ResamplingRule::adverse_weather_escalation(),
        ])
        .unwrap();
        assert_eq!(injector.rule_names(), vec!["adverse_weather_escalation"]);
    }

    #[test]
    fn test_non_matching_records_untouched() {
        let mut dataset = Dataset::from_records(vec![
            record(RoadType::UrbanStreet, 30, WeatherCondition::Clear, Severity::Minor),
            record(RoadType::Highway, 50, WeatherCondition::Clear, Severity::Serious),
            record(RoadType::RuralRoad, 70, WeatherCondition::Clear, Severity::Minor),
        ]);
        let before = dataset.clone();

        let injector = CorrelationInjector::new(&CorrelationConfig::default()).unwrap();
        let outcomes = injector.apply(&mut dataset, &mut random_source(42));

        assert_eq!(dataset, before);
        assert!(outcomes.iter().all(|o| o.matched_rows.is_empty() && o.changed == 0));
    }

    #[test]
    fn test_fatal_highway_records_not_resampled() {
        let mut dataset = Dataset::from_records(vec![record(
            RoadType::Highway,
            70,
            WeatherCondition::Clear,
            Severity::Fatal,
        )]);

        let injector =
            CorrelationInjector::from_rules(vec![ResamplingRule::high_speed_highway()]).unwrap();
        let outcomes = injector.apply(&mut dataset, &mut random_source(3));

        assert!(outcomes[0].matched_rows.is_empty());
        assert_eq!(dataset.records()[0].severity, Severity::Fatal);
    }

    #[test]
    fn test_adverse_weather_never_leaves_minor() {
        let records: Vec<Record> = (0..200)
            .map(|i| {
                let weather = match i % 4 {
                    0 => WeatherCondition::Rainy,
                    1 => WeatherCondition::Snowy,
                    2 => WeatherCondition::Foggy,
                    _ => WeatherCondition::Clear,
                };
                record(RoadType::UrbanStreet, 30, weather, Severity::Minor)
            })
            .collect();
        let mut dataset = Dataset::from_records(records);

        let rules = vec![ResamplingRule::adverse_weather_escalation()];
        let injector = CorrelationInjector::from_rules(rules).unwrap();
        let outcomes = injector.apply(&mut dataset, &mut random_source(11));

        assert_eq!(outcomes[0].matched_rows.len(), 150);
        assert_eq!(outcomes[0].changed, 150);
        for &row in &outcomes[0].matched_rows {
            assert_ne!(dataset.records()[row].severity, Severity::Minor);
        }
        for record in dataset.records() {
            if record.weather_condition == WeatherCondition::Clear {
                assert_eq!(record.severity, Severity::Minor);
            }
        }
    }

    #[test]
    fn test_second_rule_sees_first_rule_output() {
        // Highway + rain + fast: the first rule may redraw Minor, which the second then upgrades.
        let records: Vec<Record> = (0..400)
            .map(|_| record(RoadType::Highway, 70, WeatherCondition::Rainy, Severity::Serious))
            .collect();
        let mut dataset = Dataset::from_records(records);

        let injector = CorrelationInjector::new(&CorrelationConfig::default()).unwrap();
        let outcomes = injector.apply(&mut dataset, &mut random_source(42));

        assert_eq!(outcomes[0].matched_rows.len(), 400);
        // Only rows the first pass turned Minor can match the second pass.
        assert!(!outcomes[1].matched_rows.is_empty());
        assert!(dataset.records().iter().all(|r| r.severity != Severity::Minor));
    }

    #[test]
    fn test_only_severity_changes() {
        let mut dataset = Dataset::from_records(
            (0..100)
                .map(|_| record(RoadType::Highway, 60, WeatherCondition::Foggy, Severity::Minor))
                .collect(),
        );
        let before = dataset.clone();

        let injector = CorrelationInjector::new(&CorrelationConfig::default()).unwrap();
        injector.apply(&mut dataset, &mut random_source(9));

        for (old, new) in before.records().iter().zip(dataset.records()) {
            let mut relabelled = old.clone();
            relabelled.severity = new.severity;
            assert_eq!(&relabelled, new);
        }
    }
}
