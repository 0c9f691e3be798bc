//! Synthetic price series: a Gaussian random walk.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand::distributions::Distribution;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;
use tracing::debug;

use crate::error::{SimError, SimResult};
use crate::models::PriceSeries;

use super::PriceSeriesSource;

/// Random-walk parameters.
///
/// Each step moves the price by `variance * N(drift, std_dev)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Prices per series (one per tick)
    pub ticks: usize,

    /// First price of every series
    pub initial_price: f64,

    /// Scale applied to each Gaussian step
    pub variance: f64,

    /// Mean of the Gaussian step
    pub drift: f64,

    /// Standard deviation of the Gaussian step
    pub std_dev: f64,

    /// Floor that keeps every price positive
    pub min_price: f64,

    /// Fixed seed for reproducible series; entropy when absent
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            ticks: 390,          // One trading day of minutes
            initial_price: 100.0,
            variance: 0.1,
            drift: 0.0001,
            std_dev: 0.5,
            min_price: 0.01,
            seed: None,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> SimResult<()> {
        if self.ticks == 0 {
            return Err(SimError::config("ticks must be positive"));
        }
        if !(self.initial_price.is_finite() && self.initial_price > 0.0) {
            return Err(SimError::config(format!(
                "initial_price must be positive, got {}",
                self.initial_price
            )));
        }
        if !(self.variance.is_finite() && self.variance >= 0.0) {
            return Err(SimError::config(format!(
                "variance must be non-negative, got {}",
                self.variance
            )));
        }
        if !(self.std_dev.is_finite() && self.std_dev > 0.0) || !self.drift.is_finite() {
            return Err(SimError::config("step distribution needs finite drift and positive std_dev"));
        }
        if !(self.min_price.is_finite() && self.min_price > 0.0) {
            return Err(SimError::config("min_price must be positive"));
        }
        Ok(())
    }
}

/// Seedable generator producing one series per call.
///
/// Successive series continue the same random stream, so a seeded generator
/// yields the same sequence of series on every run.
pub struct RandomWalkGenerator {
    config: GeneratorConfig,
    step: Normal,
    rng: StdRng,
}

impl RandomWalkGenerator {
    pub fn new(config: GeneratorConfig) -> SimResult<Self> {
        config.validate()?;
        let step = Normal::new(config.drift, config.std_dev)
            .map_err(|e| SimError::config(e.to_string()))?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self { config, step, rng })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate the next series.
    pub fn generate(&mut self) -> SimResult<PriceSeries> {
        let mut prices = Vec::with_capacity(self.config.ticks);
        let mut price = self.config.initial_price;
        prices.push(to_decimal(price)?);

        for _ in 1..self.config.ticks {
            let change = self.config.variance * self.step.sample(&mut self.rng);
            price = (price + change).max(self.config.min_price);
            prices.push(to_decimal(price)?);
        }

        let series = PriceSeries::new(prices)?;
        debug!(
            ticks = series.len(),
            change = %series.net_change(),
            "Generated price series"
        );
        Ok(series)
    }
}

impl PriceSeriesSource for RandomWalkGenerator {
    fn name(&self) -> String {
        match self.config.seed {
            Some(seed) => format!("random-walk(seed={seed})"),
            None => "random-walk".to_string(),
        }
    }

    fn load(&mut self) -> anyhow::Result<PriceSeries> {
        Ok(self.generate()?)
    }
}

fn to_decimal(price: f64) -> SimResult<Decimal> {
    Decimal::try_from(price)
        .map(|d| d.round_dp(6))
        .map_err(|e| SimError::config(format!("unrepresentable price {price}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn seeded(seed: u64) -> GeneratorConfig {
        GeneratorConfig {
            ticks: 50,
            seed: Some(seed),
            ..Default::default()
        }
    }

    #[test]
    fn test_same_seed_same_series() {
        let a = RandomWalkGenerator::new(seeded(7)).unwrap().generate().unwrap();
        let b = RandomWalkGenerator::new(seeded(7)).unwrap().generate().unwrap();
        let c = RandomWalkGenerator::new(seeded(8)).unwrap().generate().unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_series_shape() {
        let series = RandomWalkGenerator::new(seeded(1)).unwrap().generate().unwrap();

        assert_eq!(series.len(), 50);
        assert_eq!(series.first(), Some(Decimal::from(100)));
        assert!(series.prices().iter().all(|p| *p > Decimal::ZERO));
    }

    #[test]
    fn test_floor_keeps_prices_positive() {
        let config = GeneratorConfig {
            ticks: 200,
            initial_price: 0.05,
            variance: 5.0,
            seed: Some(3),
            ..Default::default()
        };
        let series = RandomWalkGenerator::new(config).unwrap().generate().unwrap();

        assert!(series.prices().iter().all(|p| *p >= dec!(0.01)));
    }

    #[test]
    fn test_zero_variance_is_flat() {
        let config = GeneratorConfig {
            ticks: 5,
            variance: 0.0,
            seed: Some(2),
            ..Default::default()
        };
        let series = RandomWalkGenerator::new(config).unwrap().generate().unwrap();
        assert!(series.prices().iter().all(|p| *p == Decimal::from(100)));
    }

    #[test]
    fn test_invalid_config() {
        let config = GeneratorConfig {
            ticks: 0,
            ..Default::default()
        };
        assert!(matches!(
            RandomWalkGenerator::new(config),
            Err(SimError::InvalidConfiguration(_))
        ));
    }
}
