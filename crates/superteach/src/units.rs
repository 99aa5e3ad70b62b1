//! lamport/sol conversion
//!
//! amounts arrive as form text. parsing is done in fixed point so that
//! `"1.5"` is exactly 1_500_000_000 lamports, never a float approximation.

use thiserror::Error;

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// decimal places of one sol
pub const SOL_DECIMALS: usize = 9;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("invalid amount: {0}")]
    Invalid(String),
    #[error("amount has more than 9 decimal places")]
    TooPrecise,
    #[error("amount overflows u64 lamports")]
    Overflow,
    #[error("amount must be greater than zero")]
    Zero,
}

/// parse a whole-unit decimal string into lamports
pub fn parse_sol(input: &str) -> Result<u64, AmountError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(AmountError::Empty);
    }

    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(AmountError::Invalid(s.into()));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AmountError::Invalid(s.into()));
    }

    let frac = frac.trim_end_matches('0');
    if frac.len() > SOL_DECIMALS {
        return Err(AmountError::TooPrecise);
    }

    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| AmountError::Overflow)?
    };
    let frac_lamports: u64 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac, width = SOL_DECIMALS);
        padded.parse().map_err(|_| AmountError::Invalid(s.into()))?
    };

    let lamports = whole
        .checked_mul(LAMPORTS_PER_SOL)
        .and_then(|l| l.checked_add(frac_lamports))
        .ok_or(AmountError::Overflow)?;

    if lamports == 0 {
        return Err(AmountError::Zero);
    }
    Ok(lamports)
}

/// whole units of an integral sol amount
pub fn sol_to_lamports(sol: u64) -> Option<u64> {
    sol.checked_mul(LAMPORTS_PER_SOL)
}

/// whole-unit view of a lamport amount (display only)
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

/// exact decimal rendering, trailing zeros trimmed
pub fn format_sol(lamports: u64) -> String {
    let whole = lamports / LAMPORTS_PER_SOL;
    let frac = lamports % LAMPORTS_PER_SOL;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:0>width$}", frac, width = SOL_DECIMALS);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_examples() {
        assert_eq!(parse_sol("1.5").unwrap(), 1_500_000_000);
        assert_eq!(parse_sol("5").unwrap(), 5_000_000_000);
        assert_eq!(parse_sol(" 0.000000001 ").unwrap(), 1);
        assert_eq!(parse_sol(".25").unwrap(), 250_000_000);
        assert_eq!(parse_sol("2.").unwrap(), 2_000_000_000);
        assert_eq!(parse_sol("1.1000000000").unwrap(), 1_100_000_000);
    }

    #[test]
    fn test_parse_rejects() {
        assert_eq!(parse_sol(""), Err(AmountError::Empty));
        assert_eq!(parse_sol("0"), Err(AmountError::Zero));
        assert_eq!(parse_sol("0.0"), Err(AmountError::Zero));
        assert_eq!(parse_sol("0.0000000001"), Err(AmountError::TooPrecise));
        assert!(matches!(parse_sol("-1"), Err(AmountError::Invalid(_))));
        assert!(matches!(parse_sol("1e3"), Err(AmountError::Invalid(_))));
        assert!(matches!(parse_sol("."), Err(AmountError::Invalid(_))));
        assert!(matches!(parse_sol("1.2.3"), Err(AmountError::Invalid(_))));
        assert_eq!(parse_sol("18446744074"), Err(AmountError::Overflow));
    }

    #[test]
    fn test_format() {
        assert_eq!(format_sol(1_500_000_000), "1.5");
        assert_eq!(format_sol(2_000_000_000), "2");
        assert_eq!(format_sol(1), "0.000000001");
        assert_eq!(lamports_to_sol(2_500_000_000), 2.5);
    }

    proptest! {
        #[test]
        fn whole_units_convert_exactly(sol in 1u64..18_000_000_000) {
            prop_assert_eq!(parse_sol(&sol.to_string()).unwrap(), sol * LAMPORTS_PER_SOL);
            prop_assert_eq!(sol_to_lamports(sol), Some(sol * LAMPORTS_PER_SOL));
        }

        #[test]
        fn format_then_parse_is_exact(lamports in 1u64..u64::MAX) {
            prop_assert_eq!(parse_sol(&format_sol(lamports)).unwrap(), lamports);
        }
    }
}
