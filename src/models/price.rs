//! Price series: the ordered, immutable input of every simulation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// One simulated time step and its price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    pub index: usize,
    pub price: Decimal,
}

/// Ordered sequence of strictly positive prices.
///
/// Construction validates every price; once built the series cannot be
/// mutated, so a runner can index into it freely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSeries {
    prices: Vec<Decimal>,
}

impl PriceSeries {
    /// Build a series, rejecting empty input and non-positive prices.
    pub fn new(prices: Vec<Decimal>) -> SimResult<Self> {
        if prices.is_empty() {
            return Err(SimError::EmptySeries);
        }

        if let Some((index, price)) = prices
            .iter()
            .enumerate()
            .find(|(_, p)| **p <= Decimal::ZERO)
        {
            return Err(SimError::InvalidPrice {
                index,
                price: *price,
            });
        }

        Ok(Self { prices })
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn prices(&self) -> &[Decimal] {
        &self.prices
    }

    pub fn get(&self, index: usize) -> Option<Decimal> {
        self.prices.get(index).copied()
    }

    pub fn first(&self) -> Option<Decimal> {
        self.prices.first().copied()
    }

    pub fn last(&self) -> Option<Decimal> {
        self.prices.last().copied()
    }

    /// Net move from first to last price.
    pub fn net_change(&self) -> Decimal {
        match (self.first(), self.last()) {
            (Some(first), Some(last)) => last - first,
            _ => Decimal::ZERO,
        }
    }

    pub fn point(&self, index: usize) -> Option<PricePoint> {
        self.get(index).map(|price| PricePoint { index, price })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rejects_empty_series() {
        assert_eq!(PriceSeries::new(vec![]), Err(SimError::EmptySeries));
    }

    #[test]
    fn test_rejects_non_positive_price() {
        let err = PriceSeries::new(vec![dec!(10), dec!(0), dec!(11)]).unwrap_err();
        assert_eq!(
            err,
            SimError::InvalidPrice {
                index: 1,
                price: dec!(0)
            }
        );
    }

    #[test]
    fn test_points_are_indexed() {
        let series = PriceSeries::new(vec![dec!(100), dec!(101.5)]).unwrap();

        assert_eq!(series.point(1), Some(PricePoint { index: 1, price: dec!(101.5) }));
        assert_eq!(series.point(2), None);
        assert_eq!(series.net_change(), dec!(1.5));
    }
}
