use std::sync::Arc;

use common::error::{ensure_confidence, normalize_symbol};
use common::models::{MarketSnapshot, PatternBias, Signal, SignalAction};
use common::{Clock, SystemClock, ValidationError};
use tracing::debug;

/// RSI bands and pattern weighting for a named strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyProfile {
    pub name: &'static str,
    pub oversold: f64,
    pub overbought: f64,
    pub pattern_weight: f64,
}

impl StrategyProfile {
    pub const ALL: [StrategyProfile; 4] = [
        StrategyProfile {
            name: "default",
            oversold: 30.0,
            overbought: 70.0,
            pattern_weight: 1.0,
        },
        StrategyProfile {
            name: "conservative",
            oversold: 25.0,
            overbought: 75.0,
            pattern_weight: 0.9,
        },
        StrategyProfile {
            name: "balanced",
            oversold: 30.0,
            overbought: 70.0,
            pattern_weight: 1.0,
        },
        StrategyProfile {
            name: "aggressive",
            oversold: 40.0,
            overbought: 60.0,
            pattern_weight: 1.0,
        },
    ];

    pub fn named(name: &str) -> Result<StrategyProfile, ValidationError> {
        let wanted = name.trim();
        Self::ALL
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(wanted))
            .copied()
            .ok_or_else(|| ValidationError::UnknownStrategy(name.to_string()))
    }

    /// Strength of the RSI reading as `(bullish, bearish)`, each in [0, 1].
    fn rsi_vote(&self, rsi: f64) -> (f64, f64) {
        let rsi = rsi.clamp(0.0, 100.0);
        if rsi < self.oversold {
            ((self.oversold - rsi) / self.oversold, 0.0)
        } else if rsi > self.overbought {
            (0.0, (rsi - self.overbought) / (100.0 - self.overbought))
        } else {
            (0.0, 0.0)
        }
    }
}

/// Turns a caller-supplied market snapshot into a directional signal.
/// Never looks up prices itself.
pub struct SignalGenerator {
    clock: Arc<dyn Clock>,
}

impl Default for SignalGenerator {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl SignalGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn generate(
        &self,
        strategy: &str,
        symbol: &str,
        snapshot: &MarketSnapshot,
        confidence_threshold: f64,
    ) -> Result<Signal, ValidationError> {
        let confidence_threshold = ensure_confidence(confidence_threshold)?;
        let symbol = normalize_symbol(symbol)?;
        if !snapshot.price.is_finite() || snapshot.price <= 0.0 {
            return Err(ValidationError::InvalidPrice(snapshot.price));
        }
        let profile = StrategyProfile::named(strategy)?;

        let mut bullish = 0.0;
        let mut bearish = 0.0;
        let mut reasons = Vec::new();

        if let Some(pattern) = &snapshot.pattern {
            let confidence = ensure_confidence(pattern.confidence)
                .map_err(|_| ValidationError::PatternConfidenceOutOfRange(pattern.confidence))?;
            let strength = confidence * profile.pattern_weight;
            match pattern.bias {
                PatternBias::Bullish => bullish = agree(bullish, strength),
                PatternBias::Bearish => bearish = agree(bearish, strength),
                PatternBias::Neutral => {}
            }
            reasons.push(format!(
                "{} ({:?}, {:.2})",
                pattern.name, pattern.bias, pattern.confidence
            ));
        }

        if let Some(rsi) = snapshot.rsi.filter(|r| r.is_finite()) {
            let (up, down) = profile.rsi_vote(rsi);
            bullish = agree(bullish, up);
            bearish = agree(bearish, down);
            if up > 0.0 {
                reasons.push(format!("RSI {:.1} below {}", rsi, profile.oversold));
            } else if down > 0.0 {
                reasons.push(format!("RSI {:.1} above {}", rsi, profile.overbought));
            } else {
                reasons.push(format!("RSI {:.1} neutral", rsi));
            }
        }

        let (direction, confidence) = if bullish >= bearish {
            (SignalAction::Buy, bullish - bearish)
        } else {
            (SignalAction::Sell, bearish - bullish)
        };

        let action = if confidence > 0.0 && confidence >= confidence_threshold {
            direction
        } else {
            SignalAction::Hold
        };

        let reason = if reasons.is_empty() {
            "no directional evidence".to_string()
        } else {
            reasons.join("; ")
        };

        debug!(
            "Signal {} {} via {}: {:?} at {:.2}",
            symbol, snapshot.price, profile.name, action, confidence
        );

        Ok(Signal {
            strategy: profile.name.to_string(),
            symbol,
            price: snapshot.price,
            confidence_threshold,
            action,
            confidence: confidence.clamp(0.0, 1.0),
            reason,
            generated_at: self.clock.now(),
        })
    }
}

/// Two independent votes for the same direction.
fn agree(a: f64, b: f64) -> f64 {
    1.0 - (1.0 - a) * (1.0 - b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ManualClock;
    use common::models::PatternHint;

    fn generator() -> SignalGenerator {
        SignalGenerator::new(Arc::new(ManualClock::new(1_700_000_000_000)))
    }

    fn hint(bias: PatternBias, confidence: f64) -> PatternHint {
        PatternHint {
            name: "Hammer".to_string(),
            bias,
            confidence,
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_threshold_outside_unit_interval_is_rejected() {
        let snapshot = MarketSnapshot::at_price(93_500.0);
        let err = generator()
            .generate("default", "BTC", &snapshot, 1.5)
            .unwrap_err();
        assert_eq!(err, ValidationError::ConfidenceOutOfRange(1.5));
        assert!(generator().generate("default", "BTC", &snapshot, -0.1).is_err());
    }

    #[test]
    fn test_signal_carries_snapshot_price() {
        let snapshot = MarketSnapshot::at_price(93_500.0);
        let signal = generator()
            .generate("default", "btc", &snapshot, 0.8)
            .unwrap();
        assert_eq!(signal.price, 93_500.0);
        assert_eq!(signal.symbol, "BTC");
        assert_eq!(signal.confidence_threshold, 0.8);
        assert_eq!(signal.action, SignalAction::Hold);
        assert_eq!(signal.reason, "no directional evidence");
        assert_eq!(signal.generated_at.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_identical_inputs_give_identical_signals() {
        let snapshot = MarketSnapshot::at_price(3_000.0)
            .with_rsi(22.0)
            .with_pattern(hint(PatternBias::Bullish, 0.7));
        let generator = generator();
        let a = generator.generate("balanced", "ETH", &snapshot, 0.5).unwrap();
        let b = generator.generate("balanced", "ETH", &snapshot, 0.5).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_agreeing_votes_strengthen_buy() {
        // pattern 0.5, RSI (30 - 15) / 30 = 0.5 -> 1 - 0.5 * 0.5
        let snapshot = MarketSnapshot::at_price(100.0)
            .with_rsi(15.0)
            .with_pattern(hint(PatternBias::Bullish, 0.5));
        let signal = generator().generate("default", "SOL", &snapshot, 0.7).unwrap();
        assert_eq!(signal.action, SignalAction::Buy);
        assert_close(signal.confidence, 0.75);
    }

    #[test]
    fn test_conflicting_votes_net_out() {
        // bearish pattern 0.9, RSI (30 - 24) / 30 = 0.2 bullish
        let snapshot = MarketSnapshot::at_price(100.0)
            .with_rsi(24.0)
            .with_pattern(hint(PatternBias::Bearish, 0.9));
        let signal = generator().generate("default", "SOL", &snapshot, 0.5).unwrap();
        assert_eq!(signal.action, SignalAction::Sell);
        assert_close(signal.confidence, 0.7);
    }

    #[test]
    fn test_overbought_rsi_alone_can_sell() {
        let snapshot = MarketSnapshot::at_price(100.0).with_rsi(85.0);
        let signal = generator().generate("default", "SOL", &snapshot, 0.4).unwrap();
        assert_eq!(signal.action, SignalAction::Sell);
        assert_close(signal.confidence, 0.5);
    }

    #[test]
    fn test_profiles_change_rsi_bands() {
        let snapshot = MarketSnapshot::at_price(100.0).with_rsi(35.0);
        let default = generator().generate("default", "SOL", &snapshot, 0.0).unwrap();
        assert_eq!(default.action, SignalAction::Hold);

        let aggressive = generator().generate("Aggressive", "SOL", &snapshot, 0.1).unwrap();
        assert_eq!(aggressive.strategy, "aggressive");
        assert_eq!(aggressive.action, SignalAction::Buy);
        assert_close(aggressive.confidence, 0.125);
    }

    #[test]
    fn test_unknown_strategy_and_bad_price_are_rejected() {
        let snapshot = MarketSnapshot::at_price(100.0);
        assert_eq!(
            generator().generate("yolo", "SOL", &snapshot, 0.5),
            Err(ValidationError::UnknownStrategy("yolo".to_string()))
        );
        assert_eq!(
            generator().generate("default", "SOL", &MarketSnapshot::at_price(0.0), 0.5),
            Err(ValidationError::InvalidPrice(0.0))
        );
        assert_eq!(
            generator().generate("default", " ", &snapshot, 0.5),
            Err(ValidationError::EmptySymbol)
        );
    }

    #[test]
    fn test_pattern_confidence_outside_unit_interval_is_rejected() {
        let snapshot = MarketSnapshot::at_price(100.0).with_pattern(hint(PatternBias::Bullish, 1.2));
        let err = generator().generate("default", "SOL", &snapshot, 0.5).unwrap_err();
        assert_eq!(err, ValidationError::PatternConfidenceOutOfRange(1.2));
        assert_eq!(
            err.to_string(),
            "pattern confidence must lie in [0, 1], got 1.2"
        );
    }
}
