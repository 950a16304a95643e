//! Empirical curves indexed by the number of concurrent transfers.

use crate::error::ConfigError;

/// Value table indexed by congestion level.
///
/// Levels past the end of the table use the last value.
#[derive(Clone, Debug, PartialEq)]
pub struct DelayCurve {
    values: Vec<f64>,
}

impl DelayCurve {
    pub fn from_values(values: Vec<f64>) -> Result<Self, ConfigError> {
        if values.is_empty() {
            return Err(ConfigError::invalid("curve", "curve must contain at least one value"));
        }
        if let Some(v) = values.iter().find(|v| !v.is_finite() || **v < 0.) {
            return Err(ConfigError::invalid("curve", format!("curve value {} is not a finite non-negative number", v)));
        }
        Ok(Self { values })
    }

    pub fn constant(value: f64) -> Self {
        Self { values: vec![value] }
    }

    /// `initial * e^(rate * level)` for levels `0..len`.
    pub fn exponential_growth(initial: f64, rate: f64, len: usize) -> Self {
        let values = (0..len.max(1)).map(|i| initial * (rate * i as f64).exp()).collect();
        Self { values }
    }

    /// `initial * factor^level` for levels `0..len`.
    pub fn geometric_decay(initial: f64, factor: f64, len: usize) -> Self {
        let values = (0..len.max(1)).map(|i| initial * factor.powi(i as i32)).collect();
        Self { values }
    }

    pub fn at(&self, level: u32) -> f64 {
        let idx = (level as usize).min(self.values.len() - 1);
        self.values[idx]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_non_decreasing(&self) -> bool {
        self.values.windows(2).all(|w| w[0] <= w[1])
    }

    pub fn is_non_increasing(&self) -> bool {
        self.values.windows(2).all(|w| w[0] >= w[1])
    }
}
