use crate::error::{AppError, Result};
use crate::models::{
    fields, Dataset, DriverAgeGroup, JunctionType, Record, RoadType, Severity, WeatherCondition,
};
use crate::synthetic::distribution::{
    weighted, CategoricalDistribution, IntegerRange, WeightedValue,
};
use chrono::{Days, NaiveDate};
use rand::Rng;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Synthetic record generation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GenerationConfig {
    /// Number of records to generate
    #[validate(range(min = 1))]
    pub record_count: usize,

    /// Seed for the random source shared by generation and correlation injection
    pub seed: u64,

    /// Calendar year the accident dates fall in
    #[validate(range(min = 1900, max = 9998))]
    pub simulation_year: i32,

    /// Hour-of-day range
    pub time_of_day_hour: IntegerRange,

    /// Vehicles-involved range
    pub num_vehicles_involved: IntegerRange,

    pub road_type: Vec<WeightedValue<RoadType>>,

    pub weather_condition: Vec<WeightedValue<WeatherCondition>>,

    pub speed_limit_mph: Vec<WeightedValue<u32>>,

    pub junction_type: Vec<WeightedValue<JunctionType>>,

    pub driver_age_group: Vec<WeightedValue<DriverAgeGroup>>,

    /// Independent severity draw before correlation injection
    pub severity: Vec<WeightedValue<Severity>>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            record_count: 5000,
            seed: 42,
            simulation_year: 2023,
            time_of_day_hour: IntegerRange::new(0, 23),
            num_vehicles_involved: IntegerRange::new(1, 4),
            road_type: weighted(&[
                (RoadType::Highway, 0.4),
                (RoadType::UrbanStreet, 0.4),
                (RoadType::RuralRoad, 0.2),
            ]),
            weather_condition: weighted(&[
                (WeatherCondition::Clear, 0.6),
                (WeatherCondition::Rainy, 0.2),
                (WeatherCondition::Snowy, 0.1),
                (WeatherCondition::Foggy, 0.1),
            ]),
            speed_limit_mph: weighted(&[
                (20, 0.1),
                (30, 0.25),
                (40, 0.2),
                (50, 0.15),
                (60, 0.15),
                (70, 0.15),
            ]),
            junction_type: weighted(&[
                (JunctionType::NoJunction, 0.5),
                (JunctionType::TJunction, 0.3),
                (JunctionType::Roundabout, 0.2),
            ]),
            driver_age_group: weighted(&[
                (DriverAgeGroup::Under25, 0.25),
                (DriverAgeGroup::From25To50, 0.5),
                (DriverAgeGroup::Over50, 0.25),
            ]),
            severity: weighted(&[
                (Severity::Minor, 0.7),
                (Severity::Serious, 0.25),
                (Severity::Fatal, 0.05),
            ]),
        }
    }
}

/// Draws records with every field sampled independently
#[derive(Debug, Clone)]
pub struct RecordGenerator {
    road_type: CategoricalDistribution<RoadType>,
    weather_condition: CategoricalDistribution<WeatherCondition>,
    speed_limit_mph: CategoricalDistribution<u32>,
    junction_type: CategoricalDistribution<JunctionType>,
    driver_age_group: CategoricalDistribution<DriverAgeGroup>,
    severity: CategoricalDistribution<Severity>,
    time_of_day_hour: IntegerRange,
    num_vehicles_involved: IntegerRange,
    year_start: NaiveDate,
    days_in_year: u64,
}

impl RecordGenerator {
    /// Validate the declared distributions and build a generator
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        config.validate()?;

        config.time_of_day_hour.validate(fields::TIME_OF_DAY_HOUR)?;
        if config.time_of_day_hour.max > 23 {
            return Err(AppError::InvalidConfiguration(format!(
                "time_of_day_hour max {} exceeds 23",
                config.time_of_day_hour.max
            )));
        }

        config.num_vehicles_involved.validate(fields::NUM_VEHICLES_INVOLVED)?;
        if config.num_vehicles_involved.min == 0 {
            return Err(AppError::InvalidConfiguration(
                "num_vehicles_involved must be at least 1".to_string(),
            ));
        }

        let invalid_year = || {
            AppError::InvalidConfiguration(format!(
                "invalid simulation year {}",
                config.simulation_year
            ))
        };
        let year_start =
            NaiveDate::from_ymd_opt(config.simulation_year, 1, 1).ok_or_else(invalid_year)?;
        let next_year =
            NaiveDate::from_ymd_opt(config.simulation_year + 1, 1, 1).ok_or_else(invalid_year)?;
        let days_in_year = (next_year - year_start).num_days() as u64;

        Ok(Self {
            road_type: CategoricalDistribution::new(fields::ROAD_TYPE, &config.road_type)?,
            weather_condition: CategoricalDistribution::new(
                fields::WEATHER_CONDITION,
                &config.weather_condition,
            )?,
            speed_limit_mph: CategoricalDistribution::new(
                fields::SPEED_LIMIT_MPH,
                &config.speed_limit_mph,
            )?,
            junction_type: CategoricalDistribution::new(
                fields::JUNCTION_TYPE,
                &config.junction_type,
            )?,
            driver_age_group: CategoricalDistribution::new(
                fields::DRIVER_AGE_GROUP,
                &config.driver_age_group,
            )?,
            severity: CategoricalDistribution::new(fields::SEVERITY, &config.severity)?,
            time_of_day_hour: config.time_of_day_hour,
            num_vehicles_involved: config.num_vehicles_involved,
            year_start,
            days_in_year,
        })
    }

    /// Generate exactly `count` records from the given random source
    pub fn generate<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Result<Dataset> {
        if count == 0 {
            return Err(AppError::InvalidConfiguration(
                "record count must be greater than zero".to_string(),
            ));
        }

        let mut records = Vec::with_capacity(count);
        for _ in 0..count {
            records.push(self.draw_record(rng)?);
        }

        let dataset = Dataset::from_records(records);
        tracing::info!(
            records = dataset.len(),
            distribution = ?dataset.class_distribution().counts,
            "Generated independent accident records"
        );

        Ok(dataset)
    }

    fn draw_record<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Record> {
        let id = uuid::Builder::from_random_bytes(rng.gen()).into_uuid();
        let offset = rng.gen_range(0..self.days_in_year);
        let date = self
            .year_start
            .checked_add_days(Days::new(offset))
            .ok_or_else(|| {
                AppError::InvalidConfiguration(format!("day offset {} out of range", offset))
            })?;

        Ok(Record {
            id,
            date,
            time_of_day_hour: self.time_of_day_hour.sample(rng) as u8,
            road_type: self.road_type.sample(rng),
            weather_condition: self.weather_condition.sample(rng),
            speed_limit_mph: self.speed_limit_mph.sample(rng),
            num_vehicles_involved: self.num_vehicles_involved.sample(rng),
            junction_type: self.junction_type.sample(rng),
            driver_age_group: self.driver_age_group.sample(rng),
            severity: self.severity.sample(rng),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::random_source;
    use chrono::Datelike;
    use std::collections::HashSet;

    #[test]
    fn test_generates_requested_count() {
        let generator = RecordGenerator::new(&GenerationConfig::default()).unwrap();
        let dataset = generator.generate(250, &mut random_source(42)).unwrap();
        assert_eq!(dataset.len(), 250);
    }

    #[test]
    fn test_zero_count_rejected() {
        let generator = RecordGenerator::new(&GenerationConfig::default()).unwrap();
        let result = generator.generate(0, &mut random_source(42));
        assert!(matches!(result, Err(AppError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_same_seed_is_reproducible() {
        let generator = RecordGenerator::new(&GenerationConfig::default()).unwrap();
        let a = generator.generate(300, &mut random_source(42)).unwrap();
        let b = generator.generate(300, &mut random_source(42)).unwrap();
        assert_eq!(a, b);

        let c = generator.generate(300, &mut random_source(43)).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_fields_within_declared_domains() {
        let config = GenerationConfig::default();
        let generator = RecordGenerator::new(&config).unwrap();
        let dataset = generator.generate(1000, &mut random_source(5)).unwrap();
        let speeds: HashSet<u32> = config.speed_limit_mph.iter().map(|w| w.value).collect();

        let mut ids = HashSet::new();
        for record in dataset.records() {
            assert!(record.time_of_day_hour <= 23);
            assert!((1..=4).contains(&record.num_vehicles_involved));
            assert!(speeds.contains(&record.speed_limit_mph));
            assert_eq!(record.date.year(), 2023);
            assert!(ids.insert(record.id));
        }
    }

    #[test]
    fn test_invalid_distribution_rejected() {
        let config = GenerationConfig {
            road_type: weighted(&[(RoadType::Highway, 0.4), (RoadType::UrbanStreet, 0.4)]),
            ..Default::default()
        };
        assert!(matches!(
            RecordGenerator::new(&config),
            Err(AppError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_invalid_ranges_rejected() {
        let hours = GenerationConfig {
            time_of_day_hour: IntegerRange::new(0, 24),
            ..Default::default()
        };
        assert!(RecordGenerator::new(&hours).is_err());

        let vehicles = GenerationConfig {
            num_vehicles_involved: IntegerRange::new(0, 3),
            ..Default::default()
        };
        assert!(RecordGenerator::new(&vehicles).is_err());

        let empty = GenerationConfig {
            record_count: 0,
            ..Default::default()
        };
        assert!(RecordGenerator::new(&empty).is_err());
    }
}
