//! Velocity composition (§4.7 "Velocity composition"). Produces a 0–1
//! velocity score from three bonuses, each independently capped, before the
//! kernel expands it into 0–100.

use crate::model::{Candidate, Timeframe};

pub const VOLUME_ACCELERATION_MAX: f64 = 0.40;
pub const MOMENTUM_CASCADE_MAX: f64 = 0.35;
pub const ACTIVITY_SURGE_MAX: f64 = 0.25;

fn ratio_bonus(ratio: f64) -> f64 {
    if ratio >= 3.0 {
        0.15
    } else if ratio >= 2.0 {
        0.10
    } else if ratio >= 1.5 {
        0.05
    } else {
        0.0
    }
}

/// Compares 5m→1h, 1h→6h, 6h→24h projected-volume ratios; a bonus per pair,
/// plus a flat consistency bonus if ≥2 pairs are accelerating.
pub fn volume_acceleration(candidate: &Candidate) -> f64 {
    let v = &candidate.volume;
    let mut total = 0.0;
    let mut accelerating_pairs = 0;

    let pairs = [
        (v.get(Timeframe::M5), v.get(Timeframe::H1), 12.0),
        (v.get(Timeframe::H1), v.get(Timeframe::H6), 6.0),
        (v.get(Timeframe::H6), v.get(Timeframe::H24), 4.0),
    ];

    for (short, long, scale) in pairs {
        if let (Some(short), Some(long)) = (short, long) {
            if short <= 0.0 || long <= 0.0 {
                continue;
            }
            let projected = short * scale;
            let ratio = projected / long;
            let bonus = ratio_bonus(ratio);
            if bonus > 0.0 {
                accelerating_pairs += 1;
            }
            total += bonus;
        }
    }

    if accelerating_pairs >= 2 {
        total += 0.05;
    }

    total.min(VOLUME_ACCELERATION_MAX)
}

/// Tiered on 5m, 15m/30m, and 1h price-change signs and magnitudes; +0.05 if
/// ≥3 short timeframes are positive.
pub fn momentum_cascade(candidate: &Candidate) -> f64 {
    let p = &candidate.price_change_pct;
    let mut total = 0.0;

    if let Some(m5) = p.get(Timeframe::M5) {
        if m5 > 20.0 {
            total += 0.15;
        } else if m5 > 10.0 {
            total += 0.10;
        } else if m5 > 0.0 {
            total += 0.05;
        }
    }

    let mid = [p.get(Timeframe::M15), p.get(Timeframe::M30)]
        .into_iter()
        .flatten()
        .fold(f64::MIN, f64::max);
    if mid > f64::MIN {
        if mid > 15.0 {
            total += 0.12;
        } else if mid > 5.0 {
            total += 0.07;
        } else if mid > 0.0 {
            total += 0.03;
        }
    }

    if let Some(h1) = p.get(Timeframe::H1) {
        if h1 > 10.0 {
            total += 0.08;
        } else if h1 > 0.0 {
            total += 0.03;
        }
    }

    let positive_short = [
        p.get(Timeframe::M5),
        p.get(Timeframe::M15),
        p.get(Timeframe::M30),
    ]
    .into_iter()
    .flatten()
    .filter(|v| *v > 0.0)
    .count();
    if positive_short >= 3 {
        total += 0.05;
    }

    total.min(MOMENTUM_CASCADE_MAX)
}

/// Tiered on trades_5m and trades_1h, plus a diversity bonus from
/// unique-trader count.
pub fn activity_surge(candidate: &Candidate) -> f64 {
    let t = &candidate.trades;
    let mut total = 0.0;

    if let Some(trades_5m) = t.get(Timeframe::M5) {
        if trades_5m > 100 {
            total += 0.10;
        } else if trades_5m > 30 {
            total += 0.06;
        } else if trades_5m > 5 {
            total += 0.03;
        }
    }

    if let Some(trades_1h) = t.get(Timeframe::H1) {
        if trades_1h > 500 {
            total += 0.10;
        } else if trades_1h > 150 {
            total += 0.06;
        } else if trades_1h > 20 {
            total += 0.03;
        }
    }

    if let Some(unique) = candidate.unique_traders_24h {
        if unique > 200 {
            total += 0.05;
        } else if unique > 50 {
            total += 0.03;
        }
    }

    total.min(ACTIVITY_SURGE_MAX)
}

/// Sum of the three bonuses, clamped to `[0, 1]` (§4.7).
pub fn velocity_score(candidate: &Candidate) -> f64 {
    (volume_acceleration(candidate) + momentum_cascade(candidate) + activity_surge(candidate))
        .clamp(0.0, 1.0)
}
