use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use uuid::Uuid;

/// Record field names, shared by the encoder, the injection rules and inference input.
pub mod fields {
    pub const ID: &str = "id";
    pub const DATE: &str = "date";
    pub const TIME_OF_DAY_HOUR: &str = "time_of_day_hour";
    pub const ROAD_TYPE: &str = "road_type";
    pub const WEATHER_CONDITION: &str = "weather_condition";
    pub const SPEED_LIMIT_MPH: &str = "speed_limit_mph";
    pub const NUM_VEHICLES_INVOLVED: &str = "num_vehicles_involved";
    pub const JUNCTION_TYPE: &str = "junction_type";
    pub const DRIVER_AGE_GROUP: &str = "driver_age_group";
    pub const SEVERITY: &str = "severity";

    /// Every field a rule condition may reference
    pub const ALL: [&str; 10] = [
        ID,
        DATE,
        TIME_OF_DAY_HOUR,
        ROAD_TYPE,
        WEATHER_CONDITION,
        SPEED_LIMIT_MPH,
        NUM_VEHICLES_INVOLVED,
        JUNCTION_TYPE,
        DRIVER_AGE_GROUP,
        SEVERITY,
    ];

    /// Categorical feature fields in encoding order
    pub const CATEGORICAL: [&str; 4] =
        [ROAD_TYPE, WEATHER_CONDITION, JUNCTION_TYPE, DRIVER_AGE_GROUP];

    /// Numeric feature fields in encoding order
    pub const NUMERIC: [&str; 3] = [TIME_OF_DAY_HOUR, SPEED_LIMIT_MPH, NUM_VEHICLES_INVOLVED];
}

#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumString,
    Display,
    EnumIter,
)]
pub enum RoadType {
    Highway,
    #[serde(rename = "Urban Street")]
    #[strum(serialize = "Urban Street")]
    UrbanStreet,
    #[serde(rename = "Rural Road")]
    #[strum(serialize = "Rural Road")]
    RuralRoad,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumString,
    Display,
    EnumIter,
)]
pub enum WeatherCondition {
    Clear,
    Rainy,
    Snowy,
    Foggy,
}

impl WeatherCondition {
    /// Conditions that reduce visibility or grip
    pub fn is_adverse(&self) -> bool {
        matches!(self, WeatherCondition::Rainy | WeatherCondition::Snowy | WeatherCondition::Foggy)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumString,
    Display,
    EnumIter,
)]
pub enum JunctionType {
    /// No junction at the accident location
    #[serde(rename = "None")]
    #[strum(serialize = "None")]
    NoJunction,
    #[serde(rename = "T-Junction")]
    #[strum(serialize = "T-Junction")]
    TJunction,
    Roundabout,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumString,
    Display,
    EnumIter,
)]
pub enum DriverAgeGroup {
    #[serde(rename = "<25")]
    #[strum(serialize = "<25")]
    Under25,
    #[serde(rename = "25-50")]
    #[strum(serialize = "25-50")]
    From25To50,
    #[serde(rename = ">50")]
    #[strum(serialize = ">50")]
    Over50,
}

/// Accident outcome, ordered Minor < Serious < Fatal
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumString,
    Display,
    EnumIter,
)]
pub enum Severity {
    Minor,
    Serious,
    Fatal,
}

impl Severity {
    /// Number of severity classes
    pub const COUNT: usize = 3;

    /// Fixed label encoding: Minor=0, Serious=1, Fatal=2
    pub fn index(&self) -> usize {
        match self {
            Severity::Minor => 0,
            Severity::Serious => 1,
            Severity::Fatal => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Severity> {
        match index {
            0 => Some(Severity::Minor),
            1 => Some(Severity::Serious),
            2 => Some(Severity::Fatal),
            _ => None,
        }
    }

    /// All classes in label order
    pub fn all() -> impl Iterator<Item = Severity> {
        Severity::iter()
    }
}

/// One simulated accident observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique identifier
    pub id: Uuid,

    /// Calendar day of the accident
    pub date: NaiveDate,

    /// Hour of day (0-23)
    pub time_of_day_hour: u8,

    pub road_type: RoadType,

    pub weather_condition: WeatherCondition,

    /// Posted speed limit
    pub speed_limit_mph: u32,

    /// Vehicles involved (>= 1)
    pub num_vehicles_involved: u32,

    pub junction_type: JunctionType,

    pub driver_age_group: DriverAgeGroup,

    /// Outcome label
    pub severity: Severity,
}

impl Record {
    /// Look up a field by name as a JSON value (used by rule conditions)
    pub fn field_value(&self, field: &str) -> Option<JsonValue> {
        let value = match field {
            fields::ID => JsonValue::String(self.id.to_string()),
            fields::DATE => JsonValue::String(self.date.to_string()),
            fields::TIME_OF_DAY_HOUR => JsonValue::from(self.time_of_day_hour),
            fields::ROAD_TYPE => JsonValue::String(self.road_type.to_string()),
            fields::WEATHER_CONDITION => JsonValue::String(self.weather_condition.to_string()),
            fields::SPEED_LIMIT_MPH => JsonValue::from(self.speed_limit_mph),
            fields::NUM_VEHICLES_INVOLVED => JsonValue::from(self.num_vehicles_involved),
            fields::JUNCTION_TYPE => JsonValue::String(self.junction_type.to_string()),
            fields::DRIVER_AGE_GROUP => JsonValue::String(self.driver_age_group.to_string()),
            fields::SEVERITY => JsonValue::String(self.severity.to_string()),
            _ => return None,
        };
        Some(value)
    }

    /// Category label of a field as it appears in one-hot column names
    pub fn category(&self, field: &str) -> Option<String> {
        match field {
            fields::ROAD_TYPE => Some(self.road_type.to_string()),
            fields::WEATHER_CONDITION => Some(self.weather_condition.to_string()),
            fields::JUNCTION_TYPE => Some(self.junction_type.to_string()),
            fields::DRIVER_AGE_GROUP => Some(self.driver_age_group.to_string()),
            fields::SPEED_LIMIT_MPH => Some(self.speed_limit_mph.to_string()),
            fields::TIME_OF_DAY_HOUR => Some(self.time_of_day_hour.to_string()),
            fields::NUM_VEHICLES_INVOLVED => Some(self.num_vehicles_involved.to_string()),
            _ => None,
        }
    }

    /// Numeric value of a pass-through feature field
    pub fn numeric(&self, field: &str) -> Option<f64> {
        match field {
            fields::TIME_OF_DAY_HOUR => Some(f64::from(self.time_of_day_hour)),
            fields::SPEED_LIMIT_MPH => Some(f64::from(self.speed_limit_mph)),
            fields::NUM_VEHICLES_INVOLVED => Some(f64::from(self.num_vehicles_involved)),
            _ => None,
        }
    }
}

/// Per-class record counts in label order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDistribution {
    pub counts: [usize; Severity::COUNT],
}

impl ClassDistribution {
    pub fn from_labels<'a>(labels: impl IntoIterator<Item = &'a Severity>) -> Self {
        let mut counts = [0; Severity::COUNT];
        for label in labels {
            counts[label.index()] += 1;
        }
        Self { counts }
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.counts[severity.index()]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Ordered collection of records, fixed in length once built
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Dataset {
    /// Wrap records supplied by a generator or an external data source
    pub fn from_records(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Only the correlation injector rewrites labels in place
    pub(crate) fn records_mut(&mut self) -> &mut [Record] {
        &mut self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn severities(&self) -> Vec<Severity> {
        self.records.iter().map(|r| r.severity).collect()
    }

    pub fn class_distribution(&self) -> ClassDistribution {
        ClassDistribution::from_labels(self.records.iter().map(|r| &r.severity))
    }

    /// Distinct category labels of a field, in ascending order
    pub fn observed_categories(&self, field: &str) -> BTreeSet<String> {
        self.records
            .iter()
            .filter_map(|r| r.category(field))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::str::FromStr;

    pub(crate) fn sample_record(severity: Severity) -> Record {
        Record {
            id: Uuid::nil(),
            date: NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
            time_of_day_hour: 8,
            road_type: RoadType::Highway,
            weather_condition: WeatherCondition::Rainy,
            speed_limit_mph: 60,
            num_vehicles_involved: 2,
            junction_type: JunctionType::NoJunction,
            driver_age_group: DriverAgeGroup::From25To50,
            severity,
        }
    }

    #[test]
    fn test_severity_label_encoding() {
        assert_eq!(Severity::Minor.index(), 0);
        assert_eq!(Severity::Serious.index(), 1);
        assert_eq!(Severity::Fatal.index(), 2);
        for severity in Severity::all() {
            assert_eq!(Severity::from_index(severity.index()), Some(severity));
        }
        assert_eq!(Severity::from_index(3), None);
        assert!(Severity::Minor < Severity::Serious && Severity::Serious < Severity::Fatal);
    }

    #[test]
    fn test_category_display_names() {
        assert_eq!(RoadType::UrbanStreet.to_string(), "Urban Street");
        assert_eq!(JunctionType::NoJunction.to_string(), "None");
        assert_eq!(DriverAgeGroup::From25To50.to_string(), "25-50");
        assert_eq!(RoadType::from_str("Rural Road").unwrap(), RoadType::RuralRoad);
        assert!(RoadType::from_str("Dirt Track").is_err());
    }

    #[test]
    fn test_field_value_lookup() {
        let record = sample_record(Severity::Minor);
        assert_eq!(record.field_value("road_type"), Some(JsonValue::String("Highway".to_string())));
        assert_eq!(record.field_value("speed_limit_mph"), Some(JsonValue::from(60)));
        assert_eq!(record.field_value("severity"), Some(JsonValue::String("Minor".to_string())));
        assert_eq!(record.field_value("unknown"), None);
    }

    #[test]
    fn test_adverse_weather() {
        assert!(!WeatherCondition::Clear.is_adverse());
        assert!(WeatherCondition::Rainy.is_adverse());
        assert!(WeatherCondition::Snowy.is_adverse());
        assert!(WeatherCondition::Foggy.is_adverse());
    }

    #[test]
    fn test_class_distribution() {
        let dataset = Dataset::from_records(vec![
            sample_record(Severity::Minor),
            sample_record(Severity::Minor),
            sample_record(Severity::Fatal),
        ]);

        let distribution = dataset.class_distribution();
        assert_eq!(distribution.counts, [2, 0, 1]);
        assert_eq!(distribution.total(), 3);
        assert_eq!(distribution.count(Severity::Fatal), 1);
    }

    #[test]
    fn test_observed_categories_sorted() {
        let mut other = sample_record(Severity::Serious);
        other.road_type = RoadType::UrbanStreet;
        other.driver_age_group = DriverAgeGroup::Under25;
        let dataset = Dataset::from_records(vec![sample_record(Severity::Minor), other]);

        let roads: Vec<String> = dataset.observed_categories("road_type").into_iter().collect();
        assert_eq!(roads, vec!["Highway".to_string(), "Urban Street".to_string()]);

        let ages: Vec<String> = dataset
            .observed_categories("driver_age_group")
            .into_iter()
            .collect();
        assert_eq!(ages, vec!["25-50".to_string(), "<25".to_string()]);
    }
}
