use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;

use crate::domain::{
    CandidateSequence, ObservationVector, PhaseSpec, ShapeDefinition, Trend, SEQ_SLOTS,
};

/// Enumeration knobs. The step fixes the multiplier grid (hundredths of
/// the base price); the cap bounds worst-case cost.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    /// Multiplier grid step in hundredths, e.g. 5 = 0.05.
    pub rate_step_cents: u32,
    /// Hard cap on candidates produced per shape.
    pub max_candidates: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            rate_step_cents: 5,
            max_candidates: 200_000,
        }
    }
}

/// Candidates for one shape plus whether the cap cut enumeration short.
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub candidates: Vec<CandidateSequence>,
    pub truncated: bool,
}

/// Integer price derivation: base × multiplier, round half up.
/// Game prices are integers, so this is exact arithmetic on hundredths.
pub fn derive_price(base: u32, rate_cents: u32) -> u32 {
    ((base as u64 * rate_cents as u64 + 50) / 100) as u32
}

/// All phase-length combinations summing to exactly `total`, each length
/// within its phase's declared range. Iterative backtracking over an
/// explicit choice stack; a prefix that cannot reach `total` is abandoned
/// immediately.
pub(crate) fn length_combos(phases: &[PhaseSpec], total: usize) -> Vec<Vec<usize>> {
    let n = phases.len();
    let mut suffix_min = vec![0usize; n + 1];
    let mut suffix_max = vec![0usize; n + 1];
    for i in (0..n).rev() {
        suffix_min[i] = suffix_min[i + 1] + phases[i].len_min as usize;
        suffix_max[i] = suffix_max[i + 1] + phases[i].len_max as usize;
    }
    if n == 0 || suffix_min[0] > total || suffix_max[0] < total {
        return Vec::new();
    }

    let mut combos = Vec::new();
    let mut state: Vec<usize> = Vec::with_capacity(n);
    let mut used = 0usize;
    // Next length value to try at the current depth.
    let mut next = 0usize;
    loop {
        let d = state.len();
        if d == n {
            if used == total {
                combos.push(state.clone());
            }
            match state.pop() {
                Some(v) => {
                    used -= v;
                    next = v + 1;
                }
                None => break,
            }
            continue;
        }
        let spec = &phases[d];
        let lo = next.max(spec.len_min as usize);
        let mut found = None;
        for len in lo..=spec.len_max as usize {
            if used + len + suffix_min[d + 1] > total {
                break;
            }
            if used + len + suffix_max[d + 1] < total {
                continue;
            }
            found = Some(len);
            break;
        }
        match found {
            Some(len) => {
                state.push(len);
                used += len;
                next = 0;
            }
            None => match state.pop() {
                Some(v) => {
                    used -= v;
                    next = v + 1;
                }
                None => break,
            },
        }
    }
    combos
}

/// Discretized multiplier values for one phase, ascending.
fn rate_grid(phase: &PhaseSpec, step: u32) -> Vec<u32> {
    let step = step.max(1);
    let mut grid = Vec::new();
    let mut rate = phase.rate_min_cents;
    while rate <= phase.rate_max_cents {
        grid.push(rate);
        rate += step;
    }
    grid
}

/// Enumerate every candidate week the shape can produce from `base`,
/// discarding partial assignments that already contradict an observed
/// slot. The ConsistencyFilter stays the semantic authority; pruning here
/// only keeps the candidate cap meaningful.
pub fn generate(
    def: &ShapeDefinition,
    base: u32,
    obs: &ObservationVector,
    config: &GeneratorConfig,
) -> GenerationOutput {
    let mut candidates = Vec::new();
    let mut truncated = false;

    let grids: Vec<Vec<(u32, u32)>> = def
        .phases
        .iter()
        .map(|p| {
            rate_grid(p, config.rate_step_cents)
                .into_iter()
                .map(|r| (r, derive_price(base, r)))
                .collect()
        })
        .collect();

    'combos: for lens in length_combos(&def.phases, SEQ_SLOTS) {
        // Slot -> phase index, plus the candidate's weight for this branch.
        let mut slot_phase = Vec::with_capacity(SEQ_SLOTS);
        let mut weight = 1.0;
        for (phase_idx, &len) in lens.iter().enumerate() {
            if len > 0 {
                weight *= def.phases[phase_idx].weight;
            }
            for _ in 0..len {
                slot_phase.push(phase_idx);
            }
        }

        // Per-slot options, pre-filtered against the observation at that
        // slot (observation index = sequence index + 1).
        let mut filtered: Vec<Vec<(u32, u32)>> = Vec::with_capacity(SEQ_SLOTS);
        for (s, &phase_idx) in slot_phase.iter().enumerate() {
            match obs.get(s + 1) {
                Some(v) => {
                    let opts: Vec<(u32, u32)> = grids[phase_idx]
                        .iter()
                        .filter(|(_, price)| *price == v)
                        .copied()
                        .collect();
                    if opts.is_empty() {
                        continue 'combos;
                    }
                    filtered.push(opts);
                }
                None => filtered.push(grids[phase_idx].clone()),
            }
        }
        let slot_options: Vec<&[(u32, u32)]> = filtered.iter().map(Vec::as_slice).collect();

        // Iterative backtracking over slots. Options are ascending, so a
        // decreasing-trend violation ends the scan for that slot.
        let mut choice: Vec<usize> = Vec::with_capacity(SEQ_SLOTS);
        let mut rates = [0u32; SEQ_SLOTS];
        let mut prices = [0u32; SEQ_SLOTS];
        let mut next_opt = 0usize;
        loop {
            let d = choice.len();
            if d == SEQ_SLOTS {
                if candidates.len() >= config.max_candidates {
                    truncated = true;
                    break 'combos;
                }
                candidates.push(CandidateSequence {
                    shape: def.shape,
                    base,
                    prices: prices.to_vec(),
                    weight,
                });
                match choice.pop() {
                    Some(j) => next_opt = j + 1,
                    None => break,
                }
                continue;
            }

            let opts = slot_options[d];
            let same_phase = d > 0 && slot_phase[d] == slot_phase[d - 1];
            let trend = def.phases[slot_phase[d]].trend;
            let mut found = None;
            let mut j = next_opt;
            while j < opts.len() {
                let (rate, _) = opts[j];
                if same_phase {
                    match trend {
                        Trend::Increasing if rate < rates[d - 1] => {
                            j += 1;
                            continue;
                        }
                        Trend::Decreasing if rate > rates[d - 1] => break,
                        _ => {}
                    }
                }
                found = Some(j);
                break;
            }
            match found {
                Some(j) => {
                    rates[d] = opts[j].0;
                    prices[d] = opts[j].1;
                    choice.push(j);
                    next_opt = 0;
                }
                None => match choice.pop() {
                    Some(j) => next_opt = j + 1,
                    None => break,
                },
            }
        }
    }

    debug!(
        shape = %def.shape,
        candidates = candidates.len(),
        truncated,
        "generation finished"
    );
    GenerationOutput {
        candidates,
        truncated,
    }
}

/// Sample one concrete week from a shape. Tooling/demo helper; the
/// prediction path never touches randomness.
pub fn sample_week(
    def: &ShapeDefinition,
    base: u32,
    config: &GeneratorConfig,
    rng: &mut StdRng,
) -> Option<Vec<u32>> {
    let combos = length_combos(&def.phases, SEQ_SLOTS);
    if combos.is_empty() {
        return None;
    }
    let lens = &combos[rng.gen_range(0..combos.len())];

    let mut prices = Vec::with_capacity(SEQ_SLOTS);
    for (phase_idx, &len) in lens.iter().enumerate() {
        if len == 0 {
            continue;
        }
        let phase = &def.phases[phase_idx];
        let grid = rate_grid(phase, config.rate_step_cents);
        let mut rates: Vec<u32> = (0..len)
            .map(|_| grid[rng.gen_range(0..grid.len())])
            .collect();
        match phase.trend {
            Trend::Increasing => rates.sort_unstable(),
            Trend::Decreasing => {
                rates.sort_unstable();
                rates.reverse();
            }
            Trend::Any => {}
        }
        for rate in rates {
            prices.push(derive_price(base, rate));
        }
    }
    Some(prices)
}
