use thiserror::Error;

/// Rejections raised before any state is touched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("quantity must be positive, got {0}")]
    NonPositiveQuantity(f64),
    #[error("price must be a positive finite number, got {0}")]
    InvalidPrice(f64),
    #[error("confidence threshold must lie in [0, 1], got {0}")]
    ConfidenceOutOfRange(f64),
    #[error("pattern confidence must lie in [0, 1], got {0}")]
    PatternConfidenceOutOfRange(f64),
    #[error("side must be 'buy' or 'sell', got '{0}'")]
    InvalidSide(String),
    #[error("symbol must not be empty")]
    EmptySymbol,
    #[error("unknown strategy '{0}'")]
    UnknownStrategy(String),
    #[error("signal for {0} is not actionable (hold)")]
    NonActionableSignal(String),
}

/// Trims and upper-cases a ticker, rejecting blank input.
pub fn normalize_symbol(symbol: &str) -> Result<String, ValidationError> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(ValidationError::EmptySymbol);
    }
    Ok(symbol.to_uppercase())
}

pub fn ensure_confidence(value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::ConfidenceOutOfRange(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol("  btc ").unwrap(), "BTC");
        assert_eq!(normalize_symbol("   "), Err(ValidationError::EmptySymbol));
    }

    #[test]
    fn test_confidence_bounds_are_inclusive() {
        assert!(ensure_confidence(0.0).is_ok());
        assert!(ensure_confidence(1.0).is_ok());
        assert!(ensure_confidence(1.5).is_err());
        assert!(ensure_confidence(-0.01).is_err());
        assert!(ensure_confidence(f64::NAN).is_err());
    }
}
