use crate::catalog::PriorRow;
use crate::domain::{QuantileValue, ShapeBand, SlotStats, REPORTED_SLOTS, SEQ_SLOTS};

/// Rescale candidate weights so each band's total equals its shape's
/// prior probability, renormalized over the shapes that actually
/// survived. Relative proportions within a band are preserved.
pub fn normalize_weights(bands: &mut [ShapeBand], priors: &PriorRow) {
    let prior_mass: f64 = bands
        .iter()
        .filter(|b| !b.candidates.is_empty())
        .map(|b| priors.get(b.shape))
        .sum();

    let n = bands.iter().filter(|b| !b.candidates.is_empty()).count();
    for band in bands.iter_mut() {
        if band.candidates.is_empty() {
            band.total_weight = 0.0;
            continue;
        }
        // Degenerate prior rows (all surviving shapes at zero) fall back
        // to an even split so the output still sums to 1.
        let share = if prior_mass > 1e-12 {
            priors.get(band.shape) / prior_mass
        } else {
            1.0 / n as f64
        };
        let raw_total: f64 = band.candidates.iter().map(|c| c.weight).sum();
        for c in &mut band.candidates {
            c.weight = share * c.weight / raw_total;
        }
        band.total_weight = share;
    }
}

/// Weighted quantile with linear interpolation between order statistics
/// (midpoint positions). `pairs` must be sorted by value ascending and
/// weights must sum to a positive total.
fn weighted_quantile(pairs: &[(u32, f64)], q: f64) -> f64 {
    let total: f64 = pairs.iter().map(|(_, w)| w).sum();
    let q = q.clamp(0.0, 1.0);

    let mut cum = 0.0;
    let mut prev_pos = 0.0;
    let mut prev_val = pairs[0].0 as f64;
    for (i, &(value, w)) in pairs.iter().enumerate() {
        let pos = (cum + w / 2.0) / total;
        if q <= pos {
            if i == 0 || pos <= prev_pos {
                return value as f64;
            }
            let t = (q - prev_pos) / (pos - prev_pos);
            return prev_val + t * (value as f64 - prev_val);
        }
        cum += w;
        prev_pos = pos;
        prev_val = value as f64;
    }
    prev_val
}

/// Per-slot statistics over the normalized candidate set, slots
/// 1..=REPORTED_SLOTS.
pub fn slot_stats(bands: &[ShapeBand], quantiles: &[f64]) -> Vec<SlotStats> {
    let mut stats = Vec::with_capacity(REPORTED_SLOTS);
    for slot in 1..=REPORTED_SLOTS {
        let mut pairs: Vec<(u32, f64)> = Vec::new();
        for band in bands {
            for c in &band.candidates {
                pairs.push((c.prices[slot - 1], c.weight));
            }
        }
        pairs.sort_by_key(|&(v, _)| v);

        let total: f64 = pairs.iter().map(|(_, w)| w).sum();
        let min = pairs.first().map(|&(v, _)| v).unwrap_or(0);
        let max = pairs.last().map(|&(v, _)| v).unwrap_or(0);
        let mean = pairs.iter().map(|&(v, w)| v as f64 * w).sum::<f64>() / total;
        let quantiles = quantiles
            .iter()
            .map(|&q| QuantileValue {
                q,
                value: weighted_quantile(&pairs, q),
            })
            .collect();

        stats.push(SlotStats {
            slot,
            min,
            max,
            mean,
            quantiles,
        });
    }
    stats
}

/// The lowest price any surviving candidate produces from observation
/// slot `from_slot` (1-based half-day) to the end of the week: the price
/// the user provably cannot fall below under every consistent hypothesis.
pub fn guaranteed_floor(bands: &[ShapeBand], from_slot: usize) -> Option<u32> {
    let from_slot = from_slot.max(1);
    if from_slot > SEQ_SLOTS {
        return None;
    }
    let mut floor: Option<u32> = None;
    for band in bands {
        for c in &band.candidates {
            for &price in &c.prices[from_slot - 1..] {
                floor = Some(match floor {
                    Some(f) => f.min(price),
                    None => price,
                });
            }
        }
    }
    floor
}
