//! Farm sensor readings and the validated feature vector built from them

use crate::error::ServiceError;
use serde::{Deserialize, Serialize};

/// Closed validity range for one input feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureBounds {
    pub name: &'static str,
    pub min: f64,
    pub max: f64,
}

impl FeatureBounds {
    const fn new(name: &'static str, min: f64, max: f64) -> Self {
        Self { name, min, max }
    }

    /// Check a value against the range, NaN included.
    pub fn check(&self, value: f64) -> Result<f64, ServiceError> {
        if (self.min..=self.max).contains(&value) {
            Ok(value)
        } else {
            Err(ServiceError::Validation {
                field: self.name,
                value,
                min: self.min,
                max: self.max,
            })
        }
    }
}

/// Validity bounds in model input order.
pub const FEATURE_BOUNDS: [FeatureBounds; 7] = [
    FeatureBounds::new("amount_of_chicken", 10.0, 10000.0),
    FeatureBounds::new("amount_of_feeding", 24.6, 675.9),
    FeatureBounds::new("ammonia", 2.0, 53.5),
    FeatureBounds::new("temperature", 5.0, 45.0),
    FeatureBounds::new("humidity", 36.9, 95.0),
    FeatureBounds::new("light_intensity", 97.5, 929.2),
    FeatureBounds::new("noise", 64.4, 607.3),
];

/// Raw sensor readings for one farm, as received from clients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FarmInput {
    /// Number of chickens (10-10000)
    pub amount_of_chicken: f64,

    /// Amount of feeding (24.6-675.9)
    pub amount_of_feeding: f64,

    /// Ammonia level in ppm (2.0-53.5)
    pub ammonia: f64,

    /// Temperature in Celsius (5.0-45.0)
    pub temperature: f64,

    /// Relative humidity percentage (36.9-95.0)
    pub humidity: f64,

    /// Light intensity in lux (97.5-929.2)
    pub light_intensity: f64,

    /// Noise level (64.4-607.3)
    pub noise: f64,
}

impl FarmInput {
    /// Reference reading used for the post-load sanity check and documentation.
    pub fn sample() -> Self {
        Self {
            amount_of_chicken: 2291.0,
            amount_of_feeding: 258.6,
            ammonia: 17.5,
            temperature: 27.0,
            humidity: 59.4,
            light_intensity: 481.8,
            noise: 236.3,
        }
    }

    /// Readings in model input order.
    pub fn values(&self) -> [f64; 7] {
        [
            self.amount_of_chicken,
            self.amount_of_feeding,
            self.ammonia,
            self.temperature,
            self.humidity,
            self.light_intensity,
            self.noise,
        ]
    }
}

/// A farm reading whose every field lies within [`FEATURE_BOUNDS`].
///
/// Only constructible through [`FeatureVector::new`], so holders never need to
/// re-check ranges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector(FarmInput);

impl FeatureVector {
    /// Validate a reading, reporting the first field out of range.
    pub fn new(input: FarmInput) -> Result<Self, ServiceError> {
        for (bounds, value) in FEATURE_BOUNDS.iter().zip(input.values()) {
            bounds.check(value)?;
        }
        Ok(Self(input))
    }

    pub fn input(&self) -> &FarmInput {
        &self.0
    }

    pub fn amount_of_chicken(&self) -> f64 {
        self.0.amount_of_chicken
    }

    pub fn amount_of_feeding(&self) -> f64 {
        self.0.amount_of_feeding
    }

    pub fn ammonia(&self) -> f64 {
        self.0.ammonia
    }

    pub fn temperature(&self) -> f64 {
        self.0.temperature
    }

    pub fn humidity(&self) -> f64 {
        self.0.humidity
    }

    pub fn light_intensity(&self) -> f64 {
        self.0.light_intensity
    }

    pub fn noise(&self) -> f64 {
        self.0.noise
    }
}

impl TryFrom<FarmInput> for FeatureVector {
    type Error = ServiceError;

    fn try_from(input: FarmInput) -> Result<Self, Self::Error> {
        Self::new(input)
    }
}
