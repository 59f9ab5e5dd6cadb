use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use stalkcast::catalog::load_catalog;
use stalkcast::data;
use stalkcast::domain::{
    slot_for, slot_label, FloorScope, ObservationVector, PredictOptions, PredictionResult,
    ShapeType, REPORTED_SLOTS,
};
use stalkcast::engine::{sample_week, GeneratorConfig, Predictor};

#[derive(Parser)]
#[command(name = "stalkcast", about = "Stalk-market price tracker and predictor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Predict the rest of the week from partial observations
    Predict {
        /// Comma-separated prices, slot 0 first; empty or '-' = unknown
        #[arg(short, long)]
        observations: Option<String>,
        /// Load observations recorded for this user instead
        #[arg(short, long)]
        user: Option<String>,
        #[arg(long, default_value = "assets/catalog.json")]
        catalog: String,
        /// Last week's shape, if known
        #[arg(short, long)]
        previous: Option<String>,
        /// Quantile levels as percentages
        #[arg(short, long, default_value = "25,50,75")]
        quantiles: String,
        /// Multiplier grid step
        #[arg(long, default_value = "0.05")]
        rate_step: f64,
        /// Candidate cap per shape
        #[arg(long, default_value = "200000")]
        max_candidates: usize,
        #[arg(long, default_value = "data")]
        data_dir: String,
        /// Emit the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record one observed price for a user
    Record {
        user: String,
        /// Day of week, 1 = Monday .. 6 = Saturday, or 0 for the buy price
        day: u8,
        /// "am" or "pm" (ignored for the buy price)
        half: String,
        price: u32,
        #[arg(long, default_value = "data")]
        data_dir: String,
    },
    /// Show a user's current-week observations
    Show {
        user: String,
        #[arg(long, default_value = "data")]
        data_dir: String,
    },
    /// Delete a user's stored observations
    Clear {
        user: String,
        #[arg(long, default_value = "data")]
        data_dir: String,
    },
    /// Sample one concrete week from a shape
    Simulate {
        shape: String,
        #[arg(long, default_value = "assets/catalog.json")]
        catalog: String,
        /// Buy price; sampled from the admissible range if omitted
        #[arg(short, long)]
        base: Option<u32>,
        #[arg(short, long, default_value = "0")]
        seed: u64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Predict {
            observations,
            user,
            catalog,
            previous,
            quantiles,
            rate_step,
            max_candidates,
            data_dir,
            json,
        } => run_predict(
            observations,
            user,
            &catalog,
            previous,
            &quantiles,
            rate_step,
            max_candidates,
            &data_dir,
            json,
        ),
        Commands::Record {
            user,
            day,
            half,
            price,
            data_dir,
        } => run_record(&user, day, &half, price, &data_dir),
        Commands::Show { user, data_dir } => run_show(&user, &data_dir),
        Commands::Clear { user, data_dir } => {
            data::clear_week(&data_dir, &user)?;
            println!("Cleared stored prices for {}", user);
            Ok(())
        }
        Commands::Simulate {
            shape,
            catalog,
            base,
            seed,
        } => run_simulate(&shape, &catalog, base, seed),
    }
}

fn parse_quantiles(spec: &str) -> Result<Vec<f64>, Box<dyn std::error::Error>> {
    let mut out = Vec::new();
    for cell in spec.split(',') {
        let cell = cell.trim();
        if cell.is_empty() {
            continue;
        }
        let q: f64 = cell.parse().map_err(|_| format!("bad quantile '{}'", cell))?;
        let q = if q > 1.0 { q / 100.0 } else { q };
        if !(0.0..=1.0).contains(&q) {
            return Err(format!("quantile '{}' out of range", cell).into());
        }
        out.push(q);
    }
    Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn run_predict(
    observations: Option<String>,
    user: Option<String>,
    catalog_path: &str,
    previous: Option<String>,
    quantiles: &str,
    rate_step: f64,
    max_candidates: usize,
    data_dir: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = load_catalog(catalog_path)?;

    let obs: ObservationVector = match (observations, user) {
        (Some(spec), _) => spec.parse()?,
        (None, Some(user)) => data::load_week(data_dir, &user, chrono::Utc::now().date_naive())?
            .ok_or_else(|| format!("no prices recorded for {} this week", user))?,
        (None, None) => return Err("provide --observations or --user".into()),
    };

    let previous = previous.map(|s| s.parse::<ShapeType>()).transpose()?;
    let options = PredictOptions {
        quantiles: parse_quantiles(quantiles)?,
        floor_scope: FloorScope::RemainingWeek,
    };
    if rate_step <= 0.0 || rate_step > 1.0 {
        return Err(format!("rate step {} out of range", rate_step).into());
    }
    let config = GeneratorConfig {
        rate_step_cents: (rate_step * 100.0).round().max(1.0) as u32,
        max_candidates,
    };

    let predictor = Predictor::with_config(&catalog, config);
    let result = predictor.predict(&obs, previous, &options);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print_result(&catalog.version().to_string(), &obs, &result, &options);
    Ok(())
}

fn print_result(
    version: &str,
    obs: &ObservationVector,
    result: &PredictionResult,
    options: &PredictOptions,
) {
    println!("=== stalkcast prediction (catalog {}) ===", version);
    println!(
        "Observations: {} ({} reported)",
        obs,
        obs.observed_count()
    );

    if result.indeterminate {
        println!("\nNo shape is consistent with these observations.");
        println!("Check the reported prices, or clear and start over.");
        return;
    }
    if result.relaxed {
        println!("Note: earliest observation contradicted every shape and was ignored.");
    }
    if result.truncated {
        println!("Note: candidate cap reached, bounds may be loose.");
    }

    let mut head = format!("  {:8} {:>6} {:>6} {:>6} {:>8}", "Slot", "Obs", "Min", "Max", "Mean");
    for q in &options.quantiles {
        head.push_str(&format!(" {:>7}", format!("P{:.0}", q * 100.0)));
    }
    println!("\n{}", head);
    for stats in &result.slots {
        let observed = obs
            .get(stats.slot)
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());
        let mut line = format!(
            "  {:8} {:>6} {:>6} {:>6} {:>8.1}",
            slot_label(stats.slot),
            observed,
            stats.min,
            stats.max,
            stats.mean
        );
        for qv in &stats.quantiles {
            line.push_str(&format!(" {:>7.1}", qv.value));
        }
        println!("{}", line);
    }

    if let Some(floor) = result.guaranteed_floor {
        println!("\nGuaranteed floor: {}", floor);
    }
    println!("\nShape likelihoods:");
    for band in &result.bands {
        println!(
            "  {:12} {:>5.1}%  ({} candidates)",
            band.shape.to_string(),
            band.total_weight * 100.0,
            band.candidates.len()
        );
    }
    if let Some(best) = result.most_likely() {
        println!("Most likely: {}", best.shape);
    }
}

fn run_record(
    user: &str,
    day: u8,
    half: &str,
    price: u32,
    data_dir: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let slot = if day == 0 {
        0
    } else {
        let am = match half.to_lowercase().as_str() {
            "am" | "a" => true,
            "pm" | "p" => false,
            other => return Err(format!("expected am/pm, got '{}'", other).into()),
        };
        slot_for(day, am)?
    };

    let today = chrono::Utc::now().date_naive();
    let obs = data::record_price(data_dir, user, slot, price, today)?;
    println!(
        "Recorded {} for {} at {} ({} slots reported)",
        price,
        user,
        slot_label(slot),
        obs.observed_count()
    );
    Ok(())
}

fn run_show(user: &str, data_dir: &str) -> Result<(), Box<dyn std::error::Error>> {
    let today = chrono::Utc::now().date_naive();
    match data::load_week(data_dir, user, today)? {
        Some(obs) => {
            println!("Prices for {} (week of {}):", user, data::week_start(today));
            for slot in 0..=REPORTED_SLOTS {
                let value = obs
                    .get(slot)
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("  {:8} {:>6}", slot_label(slot), value);
            }
        }
        None => println!("No prices recorded for {} this week", user),
    }
    Ok(())
}

fn run_simulate(
    shape: &str,
    catalog_path: &str,
    base: Option<u32>,
    seed: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = load_catalog(catalog_path)?;
    let shape: ShapeType = shape.parse()?;
    let mut rng = StdRng::seed_from_u64(seed);

    let range = catalog.base_range();
    let base = base.unwrap_or_else(|| rng.gen_range(range.min..=range.max));
    let def = catalog.definition_of(shape);
    let week = sample_week(def, base, &GeneratorConfig::default(), &mut rng)
        .ok_or_else(|| format!("shape '{}' cannot cover a full week", shape))?;

    println!("=== simulated {} week (base {}) ===", shape, base);
    for (i, price) in week.iter().take(REPORTED_SLOTS).enumerate() {
        println!("  {:8} {:>6}", slot_label(i + 1), price);
    }
    Ok(())
}
