//! Spot pricing from market stock.
//!
//! The unit price of an item falls hyperbolically as stock rises:
//!
//! ```text
//! min_price = min - 1
//! max_delta = max - min_price
//! price     = floor(max_delta / (1 + stock / sensitivity) + min_price) + 1
//! ```
//!
//! which is evaluated exactly in integers as
//! `floor(max_delta * sensitivity / (sensitivity + stock)) + min`. The
//! price is `max + 1` at zero stock, never drops below `min`, and never
//! rises as stock grows. Prices are always recomputed, never cached.

use guild_types::{Market, PricingInfo};

/// Errors produced by an unusable price curve.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    /// The curve has zero sensitivity.
    #[error("pricing sensitivity must be positive")]
    ZeroSensitivity,

    /// The curve's maximum is below its minimum.
    #[error("pricing max {max} is below min {min}")]
    InvertedBounds {
        /// Floor price.
        min: u64,
        /// Ceiling price.
        max: u64,
    },

    /// The computed price does not fit in a `u64`.
    #[error("arithmetic overflow in price calculation")]
    ArithmeticOverflow,
}

/// Unit price of an item at the given stock level.
///
/// # Errors
///
/// Returns [`PricingError::ZeroSensitivity`] or
/// [`PricingError::InvertedBounds`] for an unusable curve.
pub fn spot_price(pricing: &PricingInfo, stock: u64) -> Result<u64, PricingError> {
    if pricing.sensitivity == 0 {
        return Err(PricingError::ZeroSensitivity);
    }
    if pricing.max < pricing.min {
        return Err(PricingError::InvertedBounds {
            min: pricing.min,
            max: pricing.max,
        });
    }

    let min = u128::from(pricing.min);
    let sensitivity = u128::from(pricing.sensitivity);

    let max_delta = u128::from(pricing.max)
        .checked_sub(min)
        .and_then(|d| d.checked_add(1))
        .ok_or(PricingError::ArithmeticOverflow)?;
    let scaled = max_delta
        .checked_mul(sensitivity)
        .ok_or(PricingError::ArithmeticOverflow)?;
    let denominator = sensitivity
        .checked_add(u128::from(stock))
        .ok_or(PricingError::ArithmeticOverflow)?;
    let price = scaled
        .checked_div(denominator)
        .and_then(|p| p.checked_add(min))
        .ok_or(PricingError::ArithmeticOverflow)?;

    u64::try_from(price)
        .ok()
        .ok_or(PricingError::ArithmeticOverflow)
}

/// Unit price of `item` on `market` at its current stock, `None` when the
/// market does not trade the item.
pub fn market_price(market: &Market, item: &str) -> Result<Option<u64>, PricingError> {
    market
        .pricing
        .get(item)
        .map(|pricing| spot_price(pricing, market.stock_of(item)))
        .transpose()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const CURVE: PricingInfo = PricingInfo {
        min: 10,
        max: 110,
        sensitivity: 50,
    };

    #[test]
    fn documented_examples() {
        assert_eq!(spot_price(&CURVE, 0), Ok(111));
        assert_eq!(spot_price(&CURVE, 50), Ok(60));
        assert_eq!(spot_price(&CURVE, 10_000), Ok(10));
    }

    #[test]
    fn zero_stock_is_max_plus_one() {
        for (min, max, sensitivity) in [(1, 1, 1), (5, 500, 7), (0, 0, 3), (100, 250, 1000)] {
            let curve = PricingInfo {
                min,
                max,
                sensitivity,
            };
            assert_eq!(spot_price(&curve, 0), Ok(max + 1));
        }
    }

    #[test]
    fn non_increasing_and_floored() {
        let mut previous = u64::MAX;
        for stock in (0..5_000).step_by(7) {
            let price = spot_price(&CURVE, stock).unwrap();
            assert!(price <= previous, "price rose at stock {stock}");
            assert!(price >= CURVE.min);
            previous = price;
        }
        assert_eq!(spot_price(&CURVE, u64::MAX), Ok(CURVE.min));
    }

    #[test]
    fn unusable_curves_are_rejected() {
        let flat = PricingInfo {
            sensitivity: 0,
            ..CURVE
        };
        assert_eq!(spot_price(&flat, 5), Err(PricingError::ZeroSensitivity));

        let inverted = PricingInfo {
            min: 50,
            max: 10,
            sensitivity: 5,
        };
        assert!(matches!(
            spot_price(&inverted, 5),
            Err(PricingError::InvertedBounds { .. })
        ));
    }

    #[test]
    fn extreme_bounds_do_not_overflow() {
        let wide = PricingInfo {
            min: 0,
            max: u64::MAX - 1,
            sensitivity: u64::MAX,
        };
        assert_eq!(spot_price(&wide, 0), Ok(u64::MAX));

        let overflowing = PricingInfo {
            min: 0,
            max: u64::MAX,
            sensitivity: 1,
        };
        assert_eq!(spot_price(&overflowing, 0), Err(PricingError::ArithmeticOverflow));
    }
}
