use rand::SeedableRng;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use evorobot_engine::config::ExperimentConfig;
use evorobot_engine::sim::fitness::{EndPointBC, SingleGoalPoint};
use evorobot_engine::sim::network::{DenseGenome, GenomeDecoder};
use evorobot_engine::sim::{Environment, Evaluator, SimRng};
use evorobot_engine::util::point::Point2D;

const DEFAULT_POPULATION: usize = 32;

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("evorobot v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = match std::env::var("EXPERIMENT_CONFIG") {
        Ok(path) => ExperimentConfig::from_json_file(&path)?,
        Err(_) => ExperimentConfig::load_or_default(),
    };
    config.validate()?;
    info!(
        "Configuration loaded: robots={}, topology={:?}, collision={:?}, trials={}",
        config.number_robots, config.topology, config.collision, config.times_to_run_environments
    );

    let environment = match std::env::var("ENVIRONMENT_PATH") {
        Ok(path) => {
            let text = std::fs::read_to_string(&path)?;
            Environment::from_json(&text)?
        }
        Err(_) => {
            let mut env = Environment::bounded_arena("arena", 600.0, 400.0);
            env.start_point = Point2D::new(60.0, 200.0);
            env.poi.push(Point2D::new(540.0, 200.0));
            env
        }
    };
    info!("Environment '{}' with {} walls", environment.name, environment.walls.len());

    let population = std::env::var("POPULATION_SIZE")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_POPULATION);
    let seed = std::env::var("SEED")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let evaluator = Evaluator::new(
        config,
        vec![environment],
        Box::new(SingleGoalPoint::default()),
        Some(Box::new(EndPointBC::default())),
    )?;

    let mut rng = SimRng::seed_from_u64(seed);
    let genomes: Vec<Arc<dyn GenomeDecoder>> = (0..population)
        .map(|_| Arc::new(DenseGenome::random(&mut rng)) as Arc<dyn GenomeDecoder>)
        .collect();

    let results = evaluator.evaluate_population(&genomes);

    let best = results
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.fitness.total_cmp(&b.1.fitness));
    let mean = results.iter().map(|r| r.fitness).sum::<f64>() / results.len() as f64;
    let aborted: usize = results.iter().map(|r| r.aborted).sum();

    if let Some((index, result)) = best {
        info!(
            "Best genome #{}: fitness={:.4}, objectives={:?}",
            index, result.fitness, result.objectives
        );
    }
    info!("Mean fitness {:.4} over {} genomes", mean, results.len());
    if aborted > 0 {
        warn!("{} trials aborted with sentinel fitness", aborted);
    }

    println!("{}", evaluator.metrics().to_prometheus());

    Ok(())
}
