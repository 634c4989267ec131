use common::models::{Candle, PatternBias};
use serde::Serialize;
use ta::Next;
use ta::indicators::RelativeStrengthIndex;

const RSI_PERIOD: usize = 14;
const VERIFIED_BONUS: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PatternKind {
    BullishEngulfing,
    BearishEngulfing,
    Hammer,
    ShootingStar,
    Doji,
    MorningStar,
    EveningStar,
}

impl PatternKind {
    pub const ALL: [PatternKind; 7] = [
        PatternKind::BullishEngulfing,
        PatternKind::BearishEngulfing,
        PatternKind::Hammer,
        PatternKind::ShootingStar,
        PatternKind::Doji,
        PatternKind::MorningStar,
        PatternKind::EveningStar,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PatternKind::BullishEngulfing => "Bullish Engulfing",
            PatternKind::BearishEngulfing => "Bearish Engulfing",
            PatternKind::Hammer => "Hammer",
            PatternKind::ShootingStar => "Shooting Star",
            PatternKind::Doji => "Doji",
            PatternKind::MorningStar => "Morning Star",
            PatternKind::EveningStar => "Evening Star",
        }
    }

    pub fn bias(&self) -> PatternBias {
        match self {
            PatternKind::BullishEngulfing | PatternKind::Hammer | PatternKind::MorningStar => {
                PatternBias::Bullish
            }
            PatternKind::BearishEngulfing | PatternKind::ShootingStar | PatternKind::EveningStar => {
                PatternBias::Bearish
            }
            PatternKind::Doji => PatternBias::Neutral,
        }
    }

    fn score(&self, candles: &[Candle]) -> Option<f64> {
        match self {
            PatternKind::BullishEngulfing => bullish_engulfing(candles),
            PatternKind::BearishEngulfing => bearish_engulfing(candles),
            PatternKind::Hammer => hammer(candles),
            PatternKind::ShootingStar => shooting_star(candles),
            PatternKind::Doji => doji(candles),
            PatternKind::MorningStar => morning_star(candles),
            PatternKind::EveningStar => evening_star(candles),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    pub kind: PatternKind,
    pub confidence: f64,
    /// Close of the bar that completed the pattern.
    pub price: f64,
    pub verified: bool,
    pub rsi: Option<f64>,
}

/// Looks at the tail of `candles` (oldest first) and returns the strongest
/// pattern completed by the last bar, if any.
pub fn detect(candles: &[Candle]) -> Option<PatternMatch> {
    let last = candles.last()?;

    let (kind, raw) = PatternKind::ALL
        .iter()
        .filter_map(|kind| kind.score(candles).map(|score| (*kind, score)))
        .max_by(|a, b| a.1.total_cmp(&b.1))?;

    let rsi = rsi(candles);
    let verified = match (kind.bias(), rsi) {
        (PatternBias::Bullish, Some(r)) => r < 45.0,
        (PatternBias::Bearish, Some(r)) => r > 55.0,
        _ => false,
    };

    let confidence = if verified { raw + VERIFIED_BONUS } else { raw };

    Some(PatternMatch {
        kind,
        confidence: confidence.clamp(0.0, 1.0),
        price: last.close,
        verified,
        rsi,
    })
}

/// RSI(14) of the closes; needs at least one full period plus a bar.
pub fn rsi(candles: &[Candle]) -> Option<f64> {
    if candles.len() <= RSI_PERIOD {
        return None;
    }
    let mut indicator = RelativeStrengthIndex::new(RSI_PERIOD).ok()?;
    let mut value = None;
    for c in candles {
        value = Some(indicator.next(c.close));
    }
    value.filter(|v| v.is_finite())
}

fn last_two(candles: &[Candle]) -> Option<(&Candle, &Candle)> {
    match candles {
        [.., prev, cur] => Some((prev, cur)),
        _ => None,
    }
}

fn last_three(candles: &[Candle]) -> Option<(&Candle, &Candle, &Candle)> {
    match candles {
        [.., a, b, c] => Some((a, b, c)),
        _ => None,
    }
}

fn bullish_engulfing(candles: &[Candle]) -> Option<f64> {
    let (prev, cur) = last_two(candles)?;
    if prev.is_bearish()
        && cur.is_bullish()
        && cur.open <= prev.close
        && cur.close >= prev.open
        && cur.body() > prev.body()
    {
        return Some(0.5 + 0.5 * (cur.body() / prev.body() - 1.0).min(1.0));
    }
    None
}

fn bearish_engulfing(candles: &[Candle]) -> Option<f64> {
    let (prev, cur) = last_two(candles)?;
    if prev.is_bullish()
        && cur.is_bearish()
        && cur.open >= prev.close
        && cur.close <= prev.open
        && cur.body() > prev.body()
    {
        return Some(0.5 + 0.5 * (cur.body() / prev.body() - 1.0).min(1.0));
    }
    None
}

/// Closes have been falling into the last bar.
fn prior_decline(candles: &[Candle]) -> bool {
    match candles {
        [.., a, _, b, _] => b.close < a.close,
        _ => false,
    }
}

fn prior_advance(candles: &[Candle]) -> bool {
    match candles {
        [.., a, _, b, _] => b.close > a.close,
        _ => false,
    }
}

fn hammer(candles: &[Candle]) -> Option<f64> {
    let cur = candles.last()?;
    let range = cur.range();
    if range <= 0.0 || !prior_decline(candles) {
        return None;
    }
    let body = cur.body();
    let lower = cur.lower_shadow();
    if body <= 0.35 * range
        && lower >= 2.0 * body.max(0.05 * range)
        && cur.upper_shadow() <= 0.15 * range
    {
        return Some(0.4 + 0.5 * (lower / range).min(1.0));
    }
    None
}

fn shooting_star(candles: &[Candle]) -> Option<f64> {
    let cur = candles.last()?;
    let range = cur.range();
    if range <= 0.0 || !prior_advance(candles) {
        return None;
    }
    let body = cur.body();
    let upper = cur.upper_shadow();
    if body <= 0.35 * range
        && upper >= 2.0 * body.max(0.05 * range)
        && cur.lower_shadow() <= 0.15 * range
    {
        return Some(0.4 + 0.5 * (upper / range).min(1.0));
    }
    None
}

fn doji(candles: &[Candle]) -> Option<f64> {
    let cur = candles.last()?;
    let range = cur.range();
    if range <= 0.0 {
        return None;
    }
    let limit = 0.1 * range;
    let body = cur.body();
    if body <= limit {
        return Some(0.4 + 0.3 * (1.0 - body / limit));
    }
    None
}

fn morning_star(candles: &[Candle]) -> Option<f64> {
    let (a, b, c) = last_three(candles)?;
    if a.is_bearish()
        && a.body() >= 0.5 * a.range()
        && b.body() <= 0.3 * a.body()
        && c.is_bullish()
        && c.close >= a.midpoint()
    {
        let depth = (c.close - a.midpoint()) / (a.body() / 2.0);
        return Some(0.6 + 0.4 * depth.clamp(0.0, 1.0));
    }
    None
}

fn evening_star(candles: &[Candle]) -> Option<f64> {
    let (a, b, c) = last_three(candles)?;
    if a.is_bullish()
        && a.body() >= 0.5 * a.range()
        && b.body() <= 0.3 * a.body()
        && c.is_bearish()
        && c.close <= a.midpoint()
    {
        let depth = (a.midpoint() - c.close) / (a.body() / 2.0);
        return Some(0.6 + 0.4 * depth.clamp(0.0, 1.0));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn bars(ohlc: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        ohlc.iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| Candle {
                open_time: start + Duration::minutes(i as i64),
                open,
                high,
                low,
                close,
                volume: 1.0,
            })
            .collect()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_catalog_names_are_unique() {
        let mut names: Vec<&str> = PatternKind::ALL.iter().map(|k| k.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), PatternKind::ALL.len());
    }

    #[test]
    fn test_bullish_engulfing() {
        let candles = bars(&[(105.0, 106.0, 99.0, 100.0), (99.0, 108.0, 98.0, 107.0)]);
        let found = detect(&candles).unwrap();
        assert_eq!(found.kind, PatternKind::BullishEngulfing);
        assert_close(found.confidence, 0.8);
        assert_eq!(found.price, 107.0);
        assert!(!found.verified);
        assert!(found.rsi.is_none());
    }

    #[test]
    fn test_bearish_engulfing() {
        let candles = bars(&[(100.0, 106.0, 99.0, 105.0), (106.0, 107.0, 97.0, 98.0)]);
        let found = detect(&candles).unwrap();
        assert_eq!(found.kind, PatternKind::BearishEngulfing);
        assert_eq!(found.kind.bias(), PatternBias::Bearish);
        assert_close(found.confidence, 0.8);
    }

    #[test]
    fn test_morning_star() {
        let candles = bars(&[
            (110.0, 111.0, 99.0, 100.0),
            (99.0, 100.0, 97.0, 98.5),
            (99.0, 108.0, 98.5, 107.0),
        ]);
        let found = detect(&candles).unwrap();
        assert_eq!(found.kind, PatternKind::MorningStar);
        assert_close(found.confidence, 0.76);
    }

    #[test]
    fn test_doji() {
        let candles = bars(&[(100.0, 102.0, 98.0, 100.1)]);
        let found = detect(&candles).unwrap();
        assert_eq!(found.kind, PatternKind::Doji);
        assert_eq!(found.kind.bias(), PatternBias::Neutral);
        assert_close(found.confidence, 0.625);
    }

    #[test]
    fn test_hammer_needs_prior_decline() {
        let hammer_bar = (100.0, 100.3, 96.0, 100.2);
        let after_decline = bars(&[
            (106.0, 106.5, 104.5, 105.0),
            (105.0, 105.5, 103.5, 104.0),
            (104.0, 104.5, 100.5, 101.0),
            hammer_bar,
        ]);
        assert_eq!(detect(&after_decline).unwrap().kind, PatternKind::Hammer);

        let after_rally = bars(&[
            (90.0, 91.5, 89.5, 91.0),
            (91.0, 93.5, 90.5, 93.0),
            (93.0, 96.5, 92.5, 96.0),
            hammer_bar,
        ]);
        assert!(detect(&after_rally).map(|m| m.kind) != Some(PatternKind::Hammer));
    }

    #[test]
    fn test_steady_trend_has_no_pattern() {
        let candles = bars(&[(100.0, 101.5, 99.5, 101.0); 6]);
        assert_eq!(detect(&candles), None);
        assert_eq!(detect(&[]), None);
    }

    #[test]
    fn test_oversold_momentum_verifies_bullish_pattern() {
        let mut ohlc: Vec<(f64, f64, f64, f64)> = (0..20)
            .map(|i| {
                let open = 200.0 - i as f64;
                let close = open - 1.0;
                (open, open + 0.2, close - 0.2, close)
            })
            .collect();
        let prev_close = ohlc.last().unwrap().3;
        ohlc.push((
            prev_close - 0.25,
            prev_close + 1.45,
            prev_close - 0.45,
            prev_close + 1.25,
        ));

        let found = detect(&bars(&ohlc)).unwrap();
        assert_eq!(found.kind, PatternKind::BullishEngulfing);
        assert!(found.rsi.unwrap() < 45.0);
        assert!(found.verified);
        assert_close(found.confidence, 0.85);
    }
}
