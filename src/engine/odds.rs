//! Odds math: conversions between American, decimal, and implied-probability
//! representations, and overround. Pure — no I/O, no logging.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::EngineError;

/// `1/d` for `d > 1`.
pub fn decimal_to_probability(d: Decimal) -> Result<Decimal, EngineError> {
    if d <= Decimal::ONE {
        return Err(EngineError::InvalidInput(format!(
            "decimal odds must be > 1.0, got {d}"
        )));
    }
    Ok(Decimal::ONE / d)
}

/// `1 + a/100` for `a > 0`, else `1 + 100/|a|`.
pub fn american_to_decimal(a: i64) -> Result<Decimal, EngineError> {
    if a == 0 {
        return Err(EngineError::InvalidInput("american odds cannot be 0".into()));
    }
    let a = Decimal::from(a);
    let d = if a > Decimal::ZERO {
        Decimal::ONE + a / dec!(100)
    } else {
        Decimal::ONE + dec!(100) / a.abs()
    };
    Ok(d)
}

/// Inverse of [`american_to_decimal`]: rounds to the nearest integer,
/// positive for `d >= 2.0`, negative otherwise.
pub fn decimal_to_american(d: Decimal) -> Result<i64, EngineError> {
    if d <= Decimal::ONE {
        return Err(EngineError::InvalidInput(format!(
            "decimal odds must be > 1.0, got {d}"
        )));
    }
    let american = if d >= dec!(2.0) {
        ((d - Decimal::ONE) * dec!(100)).round()
    } else {
        (dec!(-100) / (d - Decimal::ONE)).round()
    };
    american
        .to_i64()
        .ok_or_else(|| EngineError::InvalidInput(format!("american odds overflow for decimal {d}")))
}

/// Format decimal odds as a signed American-odds string, e.g. `"+110"`, `"-110"`.
pub fn decimal_to_american_str(d: Decimal) -> String {
    match decimal_to_american(d) {
        Ok(a) if a > 0 => format!("+{a}"),
        Ok(a) => format!("{a}"),
        Err(_) => "--".to_string(),
    }
}

/// `ΣP - 1`. Positive means the book priced above fair (vig).
pub fn overround(probabilities: &[Decimal]) -> Result<Decimal, EngineError> {
    for p in probabilities {
        if *p <= Decimal::ZERO || *p >= Decimal::ONE {
            return Err(EngineError::InvalidInput(format!(
                "probability must be in (0,1), got {p}"
            )));
        }
    }
    Ok(probabilities.iter().sum::<Decimal>() - Decimal::ONE)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
