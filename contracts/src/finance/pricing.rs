//! Linear block-height price curve.
//!
//! The rate of a sale starts at an intercept and climbs with every block
//! until the sale window closes. Both terms are computed in integer
//! arithmetic and floored separately, so the final figure is reproducible
//! from the curve parameters and the height of the last accepted
//! contribution alone.
use alloy_primitives::U256;

/// Returns the final token-per-wei rate for a sale.
///
/// The rate is the sum of two independently floored terms:
///
/// ```text
/// floor(rmax / y_int_denom) + floor(elapsed * rmax / m_denom)
/// ```
///
/// where `elapsed` is the number of blocks between the start of the sale and
/// its last accepted contribution. The two divisions are *not* combined
/// before flooring; the sum of the floors is the specified value.
///
/// # Arguments
///
/// * `rmax` - Upper bound of the rate curve.
/// * `y_int_denom` - Divisor of the intercept term.
/// * `m_denom` - Divisor of the slope term.
/// * `elapsed` - Blocks elapsed at the last accepted contribution.
///
/// # Panics
///
/// If `y_int_denom` or `m_denom` is zero, or if the slope numerator
/// overflows [`U256`]. Sale configuration rejects zero denominators up
/// front.
#[must_use]
pub fn final_price(
    rmax: U256,
    y_int_denom: U256,
    m_denom: U256,
    elapsed: U256,
) -> U256 {
    let intercept = rmax / y_int_denom;
    let climb = elapsed
        .checked_mul(rmax)
        .expect("price numerator should not exceed `U256::MAX`")
        / m_denom;

    intercept
        .checked_add(climb)
        .expect("price should not exceed `U256::MAX`")
}

#[cfg(test)]
mod tests {
    use alloy_primitives::U256;

    use super::final_price;

    const RMAX: u64 = 960;
    const Y_INT_DENOM: u64 = 5;
    const M_DENOM: u64 = 50_000;

    fn price(elapsed: u64) -> U256 {
        final_price(
            U256::from(RMAX),
            U256::from(Y_INT_DENOM),
            U256::from(M_DENOM),
            U256::from(elapsed),
        )
    }

    #[test]
    fn starts_at_the_intercept() {
        assert_eq!(price(0), U256::from(192));
    }

    #[test]
    fn floors_a_small_climb_to_zero() {
        // 10 * 960 / 50_000 < 1
        assert_eq!(price(10), U256::from(192));
    }

    #[test]
    fn climbs_with_elapsed_blocks() {
        // 1_000 * 960 / 50_000 = 19.2
        assert_eq!(price(1_000), U256::from(192 + 19));
    }

    #[test]
    fn floors_each_term_separately() {
        // 3/2 + 1*3/2 = 1 + 1 in floored arithmetic, while flooring the
        // combined fraction would give 3.
        let got = final_price(
            U256::from(3),
            U256::from(2),
            U256::from(2),
            U256::from(1),
        );
        assert_eq!(got, U256::from(2));
    }

    #[test]
    fn exact_divisions_lose_nothing() {
        let got = final_price(
            U256::from(100),
            U256::from(4),
            U256::from(10),
            U256::from(2),
        );
        assert_eq!(got, U256::from(25 + 20));
    }
}
