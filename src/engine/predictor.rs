use tracing::{debug, warn};

use crate::catalog::PatternCatalog;
use crate::domain::{
    FloorScope, ObservationVector, PredictOptions, PredictionResult, ShapeBand, ShapeType,
};
use crate::engine::{aggregate, filter, generator, GeneratorConfig};

/// Orchestrates generation, filtering, relaxation and aggregation for one
/// prediction call. Holds only borrowed, immutable configuration; every
/// call is a pure function of its inputs.
pub struct Predictor<'a> {
    catalog: &'a PatternCatalog,
    config: GeneratorConfig,
}

impl<'a> Predictor<'a> {
    pub fn new(catalog: &'a PatternCatalog) -> Self {
        Self::with_config(catalog, GeneratorConfig::default())
    }

    pub fn with_config(catalog: &'a PatternCatalog, config: GeneratorConfig) -> Self {
        Self { catalog, config }
    }

    /// Run generation + filtering for every shape. Returns the surviving
    /// bands (raw weights) and whether any shape hit the iteration cap.
    fn run_shapes(&self, obs: &ObservationVector) -> (Vec<ShapeBand>, bool) {
        let base = match obs.buy_price() {
            Some(buy) => {
                if !self.catalog.base_range().contains(buy) {
                    // No shape admits this base; relaxation will drop it.
                    debug!(buy, "buy price outside admissible base range");
                    return (Vec::new(), false);
                }
                buy
            }
            // Provisional base policy: the minimum admissible base.
            None => self.catalog.base_range().min,
        };

        let mut bands = Vec::new();
        let mut truncated = false;
        for shape in ShapeType::ALL {
            let def = self.catalog.definition_of(shape);
            let out = generator::generate(def, base, obs, &self.config);
            truncated |= out.truncated;
            // Generation already prunes against observations; the filter
            // stays the authority on survival.
            let candidates: Vec<_> = out
                .candidates
                .into_iter()
                .filter(|c| filter::keep(c, obs))
                .collect();
            if !candidates.is_empty() {
                bands.push(ShapeBand {
                    shape,
                    total_weight: 0.0,
                    candidates,
                });
            }
        }
        (bands, truncated)
    }

    /// Predict the remainder of the week from partial observations.
    ///
    /// Never fails: a full contradiction degrades through the relaxation
    /// fallback (drop the earliest observed slot, retry once) down to an
    /// Indeterminate result.
    pub fn predict(
        &self,
        obs: &ObservationVector,
        previous: Option<ShapeType>,
        options: &PredictOptions,
    ) -> PredictionResult {
        let (mut bands, mut truncated) = self.run_shapes(obs);

        let mut relaxed = false;
        let mut obs_used = obs.clone();
        if bands.is_empty() {
            if let Some(earliest) = obs.earliest_observed() {
                relaxed = true;
                obs_used = obs.without_slot(earliest);
                debug!(slot = earliest, "no consistent shape, relaxing earliest observation");
                let retry = self.run_shapes(&obs_used);
                bands = retry.0;
                truncated = retry.1;
            }
            if bands.is_empty() {
                let mut result = PredictionResult::indeterminate();
                result.relaxed = relaxed;
                return result;
            }
        }
        if truncated {
            warn!("candidate cap reached, prediction bounds may be loose");
        }

        let priors = self.catalog.priors_given(previous);
        aggregate::normalize_weights(&mut bands, priors);

        let floor_from = match options.floor_scope {
            FloorScope::RemainingWeek => obs_used.first_unobserved(),
            FloorScope::FromSlot(slot) => slot,
        };
        let guaranteed_floor = aggregate::guaranteed_floor(&bands, floor_from);
        let slots = aggregate::slot_stats(&bands, &options.quantiles);

        PredictionResult {
            slots,
            guaranteed_floor,
            bands,
            indeterminate: false,
            truncated,
            relaxed,
        }
    }
}
