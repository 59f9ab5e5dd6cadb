use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{
    PhaseSpec, ShapeDefinition, ShapeType, Trend, SEQ_SLOTS, SHAPE_COUNT,
};

/// Admissible buy-price range shared by all shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasePriceRange {
    pub min: u32,
    pub max: u32,
}

impl BasePriceRange {
    pub fn contains(&self, price: u32) -> bool {
        price >= self.min && price <= self.max
    }
}

/// One row of the shape-transition prior table. Indexed by ShapeType,
/// sums to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorRow([f64; SHAPE_COUNT]);

impl PriorRow {
    pub fn new(probs: [f64; SHAPE_COUNT]) -> Self {
        Self(probs)
    }

    pub fn get(&self, shape: ShapeType) -> f64 {
        self.0[shape.index()]
    }

    fn sum(&self) -> f64 {
        self.0.iter().sum()
    }
}

/// Prior distribution over shapes, conditioned on last week's shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorTable {
    unknown: PriorRow,
    by_previous: [PriorRow; SHAPE_COUNT],
}

impl PriorTable {
    pub fn new(unknown: PriorRow, by_previous: [PriorRow; SHAPE_COUNT]) -> Self {
        Self {
            unknown,
            by_previous,
        }
    }

    pub fn row(&self, previous: Option<ShapeType>) -> &PriorRow {
        match previous {
            Some(shape) => &self.by_previous[shape.index()],
            None => &self.unknown,
        }
    }
}

/// Immutable generative-model description loaded once at startup. The
/// engine takes it by reference; nothing in here changes after load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternCatalog {
    version: String,
    base_range: BasePriceRange,
    definitions: Vec<ShapeDefinition>,
    priors: PriorTable,
}

impl PatternCatalog {
    /// Build and validate a catalog. A malformed catalog is a startup
    /// error; predictions must never run against one.
    pub fn new(
        version: impl Into<String>,
        base_range: BasePriceRange,
        definitions: Vec<ShapeDefinition>,
        priors: PriorTable,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut catalog = Self {
            version: version.into(),
            base_range,
            definitions,
            priors,
        };
        catalog.validate()?;
        // Fixed order: definition_of becomes a plain index.
        catalog.definitions.sort_by_key(|d| d.shape.index());
        Ok(catalog)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn base_range(&self) -> BasePriceRange {
        self.base_range
    }

    pub fn definition_of(&self, shape: ShapeType) -> &ShapeDefinition {
        // validate() guarantees one definition per shape, sorted by index
        &self.definitions[shape.index()]
    }

    pub fn priors_given(&self, previous: Option<ShapeType>) -> &PriorRow {
        self.priors.row(previous)
    }

    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.base_range.min < 1 || self.base_range.min > self.base_range.max {
            return Err(format!(
                "invalid base price range {}..{}",
                self.base_range.min, self.base_range.max
            )
            .into());
        }

        for shape in ShapeType::ALL {
            let count = self.definitions.iter().filter(|d| d.shape == shape).count();
            if count != 1 {
                return Err(
                    format!("catalog must define shape '{}' exactly once", shape).into(),
                );
            }
        }

        for def in &self.definitions {
            if def.phases.is_empty() {
                return Err(format!("shape '{}' has no phases", def.shape).into());
            }
            for (i, phase) in def.phases.iter().enumerate() {
                if phase.len_min > phase.len_max {
                    return Err(format!(
                        "shape '{}' phase {}: len_min {} > len_max {}",
                        def.shape, i, phase.len_min, phase.len_max
                    )
                    .into());
                }
                if phase.rate_min_cents > phase.rate_max_cents {
                    return Err(format!(
                        "shape '{}' phase {}: rate_min {} > rate_max {}",
                        def.shape, i, phase.rate_min_cents, phase.rate_max_cents
                    )
                    .into());
                }
                if !phase.weight.is_finite() || phase.weight <= 0.0 || phase.weight > 1.0 {
                    return Err(format!(
                        "shape '{}' phase {}: weight must be in (0, 1], got {}",
                        def.shape, i, phase.weight
                    )
                    .into());
                }
            }
            // Phases must be able to cover the week exactly.
            if def.min_total_len() > SEQ_SLOTS || def.max_total_len() < SEQ_SLOTS {
                return Err(format!(
                    "shape '{}' cannot cover {} slots (min {}, max {})",
                    def.shape,
                    SEQ_SLOTS,
                    def.min_total_len(),
                    def.max_total_len()
                )
                .into());
            }
        }

        let mut rows: Vec<(&str, &PriorRow)> = vec![("unknown", &self.priors.unknown)];
        for shape in ShapeType::ALL {
            rows.push((shape.name(), &self.priors.by_previous[shape.index()]));
        }
        for (name, row) in rows {
            if row.0.iter().any(|p| !p.is_finite() || *p < 0.0) {
                return Err(format!("prior row '{}' has a negative probability", name).into());
            }
            if (row.sum() - 1.0).abs() > 1e-6 {
                return Err(format!(
                    "prior row '{}' sums to {:.6}, expected 1",
                    name,
                    row.sum()
                )
                .into());
            }
        }

        Ok(())
    }
}

// ── Asset file schema ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CatalogAsset {
    version: String,
    base_price: BasePriceRange,
    shapes: Vec<ShapeAsset>,
    priors: HashMap<String, HashMap<ShapeType, f64>>,
}

#[derive(Debug, Deserialize)]
struct ShapeAsset {
    shape: ShapeType,
    phases: Vec<PhaseAsset>,
}

#[derive(Debug, Deserialize)]
struct PhaseAsset {
    len_min: u8,
    len_max: u8,
    /// Multipliers relative to the base price, e.g. 0.85..0.90.
    rate_min: f64,
    rate_max: f64,
    trend: Trend,
    #[serde(default = "default_weight")]
    weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

fn rate_to_cents(rate: f64, context: &str) -> Result<u32, Box<dyn std::error::Error>> {
    if !rate.is_finite() || rate < 0.0 || rate > 100.0 {
        return Err(format!("{}: multiplier {} out of range", context, rate).into());
    }
    Ok((rate * 100.0).round() as u32)
}

fn prior_row_from(
    name: &str,
    map: &HashMap<ShapeType, f64>,
) -> Result<PriorRow, Box<dyn std::error::Error>> {
    let mut probs = [0.0; SHAPE_COUNT];
    for shape in ShapeType::ALL {
        let p = map
            .get(&shape)
            .ok_or_else(|| format!("prior row '{}' missing shape '{}'", name, shape))?;
        probs[shape.index()] = *p;
    }
    Ok(PriorRow(probs))
}

/// Load and validate a catalog asset from a JSON file. Any problem here
/// is fatal for startup.
pub fn load_catalog(path: &str) -> Result<PatternCatalog, Box<dyn std::error::Error>> {
    if !Path::new(path).exists() {
        return Err(format!("catalog asset not found: {}", path).into());
    }
    let raw = std::fs::read_to_string(path)?;
    let asset: CatalogAsset =
        serde_json::from_str(&raw).map_err(|e| format!("catalog {}: {}", path, e))?;

    let mut definitions = Vec::with_capacity(asset.shapes.len());
    for shape_asset in &asset.shapes {
        let mut phases = Vec::with_capacity(shape_asset.phases.len());
        for (i, p) in shape_asset.phases.iter().enumerate() {
            let context = format!("shape '{}' phase {}", shape_asset.shape, i);
            phases.push(PhaseSpec {
                len_min: p.len_min,
                len_max: p.len_max,
                rate_min_cents: rate_to_cents(p.rate_min, &context)?,
                rate_max_cents: rate_to_cents(p.rate_max, &context)?,
                trend: p.trend,
                weight: p.weight,
            });
        }
        definitions.push(ShapeDefinition {
            shape: shape_asset.shape,
            phases,
        });
    }

    let unknown = asset
        .priors
        .get("unknown")
        .ok_or("catalog priors missing 'unknown' row")?;
    let unknown = prior_row_from("unknown", unknown)?;
    let mut by_previous = Vec::with_capacity(SHAPE_COUNT);
    for shape in ShapeType::ALL {
        let row = asset
            .priors
            .get(shape.name())
            .ok_or_else(|| format!("catalog priors missing row '{}'", shape))?;
        by_previous.push(prior_row_from(shape.name(), row)?);
    }
    let by_previous: [PriorRow; SHAPE_COUNT] = by_previous
        .try_into()
        .map_err(|_| "prior table size mismatch")?;

    PatternCatalog::new(
        asset.version,
        asset.base_price,
        definitions,
        PriorTable {
            unknown,
            by_previous,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PhaseSpec, Trend};
    use std::io::Write;

    fn flat_phase(len: u8, cents: u32) -> PhaseSpec {
        PhaseSpec {
            len_min: len,
            len_max: len,
            rate_min_cents: cents,
            rate_max_cents: cents,
            trend: Trend::Any,
            weight: 1.0,
        }
    }

    fn full_week_def(shape: ShapeType, cents: u32) -> ShapeDefinition {
        ShapeDefinition {
            shape,
            phases: vec![flat_phase(13, cents)],
        }
    }

    fn uniform_priors() -> PriorTable {
        let row = || PriorRow([0.25; SHAPE_COUNT]);
        PriorTable {
            unknown: row(),
            by_previous: [row(), row(), row(), row()],
        }
    }

    fn valid_defs() -> Vec<ShapeDefinition> {
        ShapeType::ALL
            .iter()
            .map(|&s| full_week_def(s, 100))
            .collect()
    }

    #[test]
    fn test_valid_catalog_builds() {
        let catalog = PatternCatalog::new(
            "test",
            BasePriceRange { min: 90, max: 110 },
            valid_defs(),
            uniform_priors(),
        )
        .unwrap();
        assert_eq!(catalog.version(), "test");
        assert_eq!(
            catalog.definition_of(ShapeType::Decreasing).shape,
            ShapeType::Decreasing
        );
    }

    #[test]
    fn test_missing_shape_rejected() {
        let mut defs = valid_defs();
        defs.pop();
        let err = PatternCatalog::new(
            "test",
            BasePriceRange { min: 90, max: 110 },
            defs,
            uniform_priors(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("exactly once"));
    }

    #[test]
    fn test_length_invariant_rejected() {
        let mut defs = valid_defs();
        // min sum 14 > 13
        defs[0].phases = vec![flat_phase(14, 100)];
        let err = PatternCatalog::new(
            "test",
            BasePriceRange { min: 90, max: 110 },
            defs,
            uniform_priors(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("cannot cover"));
    }

    #[test]
    fn test_short_max_length_rejected() {
        let mut defs = valid_defs();
        // max sum 12 < 13
        defs[0].phases = vec![PhaseSpec {
            len_min: 1,
            len_max: 12,
            rate_min_cents: 100,
            rate_max_cents: 100,
            trend: Trend::Any,
            weight: 1.0,
        }];
        assert!(PatternCatalog::new(
            "test",
            BasePriceRange { min: 90, max: 110 },
            defs,
            uniform_priors(),
        )
        .is_err());
    }

    #[test]
    fn test_bad_prior_sum_rejected() {
        let mut priors = uniform_priors();
        priors.unknown = PriorRow([0.25, 0.25, 0.25, 0.15]);
        let err = PatternCatalog::new(
            "test",
            BasePriceRange { min: 90, max: 110 },
            valid_defs(),
            priors,
        )
        .unwrap_err();
        assert!(err.to_string().contains("sums to"));
    }

    #[test]
    fn test_bad_base_range_rejected() {
        assert!(PatternCatalog::new(
            "test",
            BasePriceRange { min: 110, max: 90 },
            valid_defs(),
            uniform_priors(),
        )
        .is_err());
        assert!(PatternCatalog::new(
            "test",
            BasePriceRange { min: 0, max: 90 },
            valid_defs(),
            uniform_priors(),
        )
        .is_err());
    }

    #[test]
    fn test_inverted_rate_range_rejected() {
        let mut defs = valid_defs();
        defs[1].phases[0].rate_min_cents = 200;
        defs[1].phases[0].rate_max_cents = 100;
        assert!(PatternCatalog::new(
            "test",
            BasePriceRange { min: 90, max: 110 },
            defs,
            uniform_priors(),
        )
        .is_err());
    }

    #[test]
    fn test_priors_row_selection() {
        let mut priors = uniform_priors();
        priors.by_previous[ShapeType::Decreasing.index()] =
            PriorRow([0.1, 0.2, 0.3, 0.4]);
        let catalog = PatternCatalog::new(
            "test",
            BasePriceRange { min: 90, max: 110 },
            valid_defs(),
            priors,
        )
        .unwrap();
        let row = catalog.priors_given(Some(ShapeType::Decreasing));
        assert!((row.get(ShapeType::SmallSpike) - 0.4).abs() < 1e-12);
        let unknown = catalog.priors_given(None);
        assert!((unknown.get(ShapeType::Fluctuating) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_load_shipped_asset() {
        let path = format!("{}/assets/catalog.json", env!("CARGO_MANIFEST_DIR"));
        let catalog = load_catalog(&path).unwrap();
        assert!(!catalog.version().is_empty());
        assert!(catalog.base_range().min >= 1);
        for shape in ShapeType::ALL {
            let def = catalog.definition_of(shape);
            assert!(def.min_total_len() <= 13);
            assert!(def.max_total_len() >= 13);
        }
    }

    #[test]
    fn test_load_missing_file() {
        assert!(load_catalog("/tmp/no_such_catalog_stalkcast.json").is_err());
    }

    #[test]
    fn test_load_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"{ not json").unwrap();
        assert!(load_catalog(path.to_str().unwrap()).is_err());
    }

    #[test]
    fn test_load_rejects_invalid_asset() {
        // Well-formed JSON, but a shape that cannot span the week.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.json");
        let json = r#"{
            "version": "t",
            "base_price": { "min": 90, "max": 110 },
            "shapes": [
                { "shape": "fluctuating", "phases": [ { "len_min": 1, "len_max": 2, "rate_min": 0.9, "rate_max": 1.4, "trend": "any" } ] },
                { "shape": "large-spike", "phases": [ { "len_min": 13, "len_max": 13, "rate_min": 0.9, "rate_max": 1.4, "trend": "any" } ] },
                { "shape": "decreasing", "phases": [ { "len_min": 13, "len_max": 13, "rate_min": 0.3, "rate_max": 0.9, "trend": "decreasing" } ] },
                { "shape": "small-spike", "phases": [ { "len_min": 13, "len_max": 13, "rate_min": 0.9, "rate_max": 1.4, "trend": "any" } ] }
            ],
            "priors": {
                "unknown": { "fluctuating": 0.25, "large-spike": 0.25, "decreasing": 0.25, "small-spike": 0.25 },
                "fluctuating": { "fluctuating": 0.25, "large-spike": 0.25, "decreasing": 0.25, "small-spike": 0.25 },
                "large-spike": { "fluctuating": 0.25, "large-spike": 0.25, "decreasing": 0.25, "small-spike": 0.25 },
                "decreasing": { "fluctuating": 0.25, "large-spike": 0.25, "decreasing": 0.25, "small-spike": 0.25 },
                "small-spike": { "fluctuating": 0.25, "large-spike": 0.25, "decreasing": 0.25, "small-spike": 0.25 }
            }
        }"#;
        std::fs::write(&path, json).unwrap();
        let err = load_catalog(path.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("cannot cover"));
    }

    #[test]
    fn test_base_range_contains() {
        let range = BasePriceRange { min: 90, max: 110 };
        assert!(range.contains(90));
        assert!(range.contains(110));
        assert!(!range.contains(89));
        assert!(!range.contains(111));
    }
}
