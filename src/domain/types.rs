use serde::{Deserialize, Serialize};

/// Number of derived prices in a full week of half-days (12 charted + 1 reserved).
pub const SEQ_SLOTS: usize = 13;
/// Observation slots: buy price at index 0 followed by the 13 half-days.
pub const OBS_SLOTS: usize = SEQ_SLOTS + 1;
/// Half-day slots actually reported and charted (trailing slot is reserved).
pub const REPORTED_SLOTS: usize = 12;

/// The hidden generative pattern a week's prices follow.
/// Closed set; exhaustive matching is the point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShapeType {
    Fluctuating,
    LargeSpike,
    Decreasing,
    SmallSpike,
}

pub const SHAPE_COUNT: usize = 4;

impl ShapeType {
    pub const ALL: [ShapeType; SHAPE_COUNT] = [
        ShapeType::Fluctuating,
        ShapeType::LargeSpike,
        ShapeType::Decreasing,
        ShapeType::SmallSpike,
    ];

    pub fn index(self) -> usize {
        match self {
            ShapeType::Fluctuating => 0,
            ShapeType::LargeSpike => 1,
            ShapeType::Decreasing => 2,
            ShapeType::SmallSpike => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ShapeType::Fluctuating => "fluctuating",
            ShapeType::LargeSpike => "large-spike",
            ShapeType::Decreasing => "decreasing",
            ShapeType::SmallSpike => "small-spike",
        }
    }
}

impl std::fmt::Display for ShapeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ShapeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fluctuating" => Ok(ShapeType::Fluctuating),
            "large-spike" | "large_spike" | "largespike" => Ok(ShapeType::LargeSpike),
            "decreasing" => Ok(ShapeType::Decreasing),
            "small-spike" | "small_spike" | "smallspike" => Ok(ShapeType::SmallSpike),
            other => Err(format!("unknown shape: {}", other)),
        }
    }
}

/// Multiplier ordering rule within one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Any,
}

/// One contiguous run of slots governed by a single multiplier range.
/// Multipliers are stored in integer hundredths of the base price so
/// price derivation stays exact integer arithmetic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSpec {
    pub len_min: u8,
    pub len_max: u8,
    pub rate_min_cents: u32,
    pub rate_max_cents: u32,
    pub trend: Trend,
    /// Branch weight multiplied into every candidate entering this phase.
    pub weight: f64,
}

/// A shape plus its ordered phases. Phase length sums must be able to
/// cover exactly SEQ_SLOTS slots (checked at catalog load).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeDefinition {
    pub shape: ShapeType,
    pub phases: Vec<PhaseSpec>,
}

impl ShapeDefinition {
    pub fn min_total_len(&self) -> usize {
        self.phases.iter().map(|p| p.len_min as usize).sum()
    }

    pub fn max_total_len(&self) -> usize {
        self.phases.iter().map(|p| p.len_max as usize).sum()
    }
}

/// One concrete full-week hypothesis produced by the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSequence {
    pub shape: ShapeType,
    /// Base price the sequence was derived from.
    pub base: u32,
    /// Derived integer prices for slots 1..=13.
    pub prices: Vec<u32>,
    /// Relative likelihood weight. Raw from the generator; normalized
    /// against the prior row by the aggregator.
    pub weight: f64,
}

/// Surviving candidates of one shape, for overlay rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeBand {
    pub shape: ShapeType,
    /// Sum of the normalized candidate weights (the shape's posterior mass).
    pub total_weight: f64,
    pub candidates: Vec<CandidateSequence>,
}

/// A single requested quantile of the weighted slot distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileValue {
    /// Quantile level in [0, 1].
    pub q: f64,
    pub value: f64,
}

/// Aggregate statistics for one half-day slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotStats {
    /// Observation slot index (1-based half-day).
    pub slot: usize,
    pub min: u32,
    pub max: u32,
    pub mean: f64,
    pub quantiles: Vec<QuantileValue>,
}

/// Output of a prediction call. Indeterminate results carry no stats and
/// no floor; callers degrade to "no data" instead of handling an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Stats for slots 1..=REPORTED_SLOTS. Empty when indeterminate.
    pub slots: Vec<SlotStats>,
    /// Lowest price still guaranteed for the remainder of the week.
    pub guaranteed_floor: Option<u32>,
    /// Surviving candidates grouped by shape, normalized weights.
    pub bands: Vec<ShapeBand>,
    /// No shape is consistent with the observations, even after relaxation.
    pub indeterminate: bool,
    /// The candidate cap cut generation short; bounds may be loose.
    pub truncated: bool,
    /// The relaxation fallback dropped the earliest observed slot.
    pub relaxed: bool,
}

impl PredictionResult {
    pub fn indeterminate() -> Self {
        Self {
            slots: Vec::new(),
            guaranteed_floor: None,
            bands: Vec::new(),
            indeterminate: true,
            truncated: false,
            relaxed: false,
        }
    }

    /// Band with the highest posterior mass, if any.
    pub fn most_likely(&self) -> Option<&ShapeBand> {
        self.bands.iter().max_by(|a, b| {
            a.total_weight
                .partial_cmp(&b.total_weight)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}

/// Which slots the guaranteed floor scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FloorScope {
    /// From the first unobserved half-day slot to the end of the week.
    RemainingWeek,
    /// From a fixed observation slot index onward.
    FromSlot(usize),
}

/// Caller-facing knobs for a prediction call.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictOptions {
    /// Quantile levels in [0, 1].
    pub quantiles: Vec<f64>,
    pub floor_scope: FloorScope,
}

impl Default for PredictOptions {
    fn default() -> Self {
        Self {
            quantiles: vec![0.25, 0.5, 0.75],
            floor_scope: FloorScope::RemainingWeek,
        }
    }
}
