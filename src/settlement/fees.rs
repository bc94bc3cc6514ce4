//! Platform fee split

use serde::Serialize;

use crate::error::BookingError;

/// Basis points in one whole
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Default platform commission, 10%
pub const DEFAULT_FEE_BPS: u32 = 1_000;

/// Division of a gross payment between the platform and the payee.
///
/// `platform_fee + payee_amount == gross` always holds.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeeSplit {
    pub gross: i64,
    pub platform_fee: i64,
    pub payee_amount: i64,
    pub fee_bps: u32,
}

impl FeeSplit {
    /// Split `gross` minor units at `fee_bps`, rounding the fee half-up
    pub fn compute(gross: i64, fee_bps: u32) -> Result<Self, BookingError> {
        if gross <= 0 {
            return Err(BookingError::Validation(
                "Invalid price or rental duration".to_string(),
            ));
        }
        if fee_bps > BPS_DENOMINATOR {
            return Err(BookingError::Validation(format!(
                "Fee of {} bps exceeds 100%",
                fee_bps
            )));
        }

        let denominator = i128::from(BPS_DENOMINATOR);
        let scaled = i128::from(gross) * i128::from(fee_bps);
        let fee = (scaled + denominator / 2) / denominator;
        // fee <= gross, so the narrowing cannot fail
        let platform_fee = i64::try_from(fee).unwrap_or(gross);

        Ok(Self {
            gross,
            platform_fee,
            payee_amount: gross - platform_fee,
            fee_bps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ten_percent_of_1000() {
        let split = FeeSplit::compute(1000, DEFAULT_FEE_BPS).unwrap();
        assert_eq!(split.platform_fee, 100);
        assert_eq!(split.payee_amount, 900);
    }

    #[test]
    fn test_half_up_rounding() {
        // 10% of 1005 is 100.5
        assert_eq!(FeeSplit::compute(1005, 1000).unwrap().platform_fee, 101);
        // 10% of 1004 is 100.4
        assert_eq!(FeeSplit::compute(1004, 1000).unwrap().platform_fee, 100);
        assert_eq!(FeeSplit::compute(1, 5000).unwrap().platform_fee, 1);
    }

    #[test]
    fn test_parts_always_sum_to_gross() {
        for gross in [1, 7, 99, 1001, 123_457, i64::MAX / 2] {
            for bps in [0, 1, 250, 1000, 3333, 10_000] {
                let split = FeeSplit::compute(gross, bps).unwrap();
                assert_eq!(split.platform_fee + split.payee_amount, gross);
                assert!(split.platform_fee >= 0 && split.payee_amount >= 0);
            }
        }
    }

    #[test]
    fn test_non_positive_gross_rejected() {
        assert!(matches!(
            FeeSplit::compute(0, 1000),
            Err(BookingError::Validation(_))
        ));
        assert!(matches!(
            FeeSplit::compute(-50, 1000),
            Err(BookingError::Validation(_))
        ));
    }

    #[test]
    fn test_fee_above_whole_rejected() {
        assert!(FeeSplit::compute(100, 10_001).is_err());
    }
}
