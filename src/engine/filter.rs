use crate::domain::{CandidateSequence, ObservationVector, SEQ_SLOTS};

/// A candidate survives iff every reported slot matches its derived value
/// exactly. Slot 0 compares against the base the candidate was derived
/// from; absent slots constrain nothing.
pub fn keep(candidate: &CandidateSequence, obs: &ObservationVector) -> bool {
    if let Some(buy) = obs.buy_price() {
        if candidate.base != buy {
            return false;
        }
    }
    for i in 0..SEQ_SLOTS {
        if let Some(v) = obs.get(i + 1) {
            if candidate.prices[i] != v {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ShapeType;

    fn candidate(base: u32, prices: Vec<u32>) -> CandidateSequence {
        CandidateSequence {
            shape: ShapeType::Fluctuating,
            base,
            prices,
            weight: 1.0,
        }
    }

    #[test]
    fn test_empty_observations_keep_everything() {
        let c = candidate(100, vec![90; 13]);
        assert!(keep(&c, &ObservationVector::new()));
    }

    #[test]
    fn test_matching_slot_kept() {
        let c = candidate(100, vec![90; 13]);
        let obs = ObservationVector::new().with_slot(3, 90);
        assert!(keep(&c, &obs));
    }

    #[test]
    fn test_mismatching_slot_rejected() {
        let c = candidate(100, vec![90; 13]);
        let obs = ObservationVector::new().with_slot(3, 91);
        assert!(!keep(&c, &obs));
    }

    #[test]
    fn test_buy_price_checked_when_present() {
        let c = candidate(100, vec![90; 13]);
        assert!(keep(&c, &ObservationVector::new().with_slot(0, 100)));
        assert!(!keep(&c, &ObservationVector::new().with_slot(0, 99)));
    }

    #[test]
    fn test_every_observed_slot_must_match() {
        let mut prices = vec![90; 13];
        prices[4] = 120;
        let c = candidate(100, prices);
        let obs = ObservationVector::new().with_slot(5, 120).with_slot(6, 90);
        assert!(keep(&c, &obs));
        let obs = obs.with_slot(7, 121);
        assert!(!keep(&c, &obs));
    }

    #[test]
    fn test_exact_equality_no_tolerance() {
        let c = candidate(100, vec![140; 13]);
        assert!(!keep(&c, &ObservationVector::new().with_slot(1, 139)));
        assert!(!keep(&c, &ObservationVector::new().with_slot(1, 141)));
        assert!(keep(&c, &ObservationVector::new().with_slot(1, 140)));
    }
}
