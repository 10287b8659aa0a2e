// AstroGuard CLI - run one impact scenario and print the JSON result

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use astroguard::{
    default_elevation_service, AsteroidCatalog, CachedSimulator, DeflectionDirection,
    ElevationService, EngineConfig, FixedElevation, SbdbClient, SimulationOrchestrator,
    SimulationRequest, StaticCatalog, AU,
};

#[derive(Parser)]
#[command(name = "astroguard", version, about = "Asteroid impact and deflection simulator")]
struct Cli {
    /// JSON config file; `ASTROGUARD_*` environment variables are used otherwise
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Simulate an impact and optional deflection
    Simulate {
        /// Asteroid designation (e.g. 99942)
        asteroid_id: String,
        #[arg(long, default_value_t = 34.05, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, default_value_t = -118.24, allow_hyphen_values = true)]
        lon: f64,
        /// Deflection delta-v (m/s)
        #[arg(long, default_value_t = 0.0)]
        delta_v: f64,
        /// prograde | retrograde | radial_out | radial_in | normal | anti_normal
        #[arg(long, default_value = "prograde")]
        direction: DeflectionDirection,
        /// Normalized time of the impulse in [0, 1]
        #[arg(long, default_value_t = 0.0)]
        deflect_at: f64,
        /// Use the built-in catalog and a fixed elevation instead of remote services
        #[arg(long)]
        offline: bool,
        /// Elevation (m) assumed in offline mode
        #[arg(long, default_value_t = 100.0, allow_hyphen_values = true)]
        elevation: f64,
    },
    /// List the built-in offline catalog
    Catalog,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<EngineConfig> {
    let config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            EngineConfig::from_json_str(&text)?
        }
        None => EngineConfig::from_env()?,
    };
    Ok(config)
}

async fn run_simulation<C: AsteroidCatalog, E: ElevationService>(
    catalog: C,
    elevation: E,
    config: &EngineConfig,
    request: &SimulationRequest,
) -> anyhow::Result<bool> {
    let orchestrator = SimulationOrchestrator::new(catalog, elevation, config);
    let simulator = CachedSimulator::new(orchestrator, config.service.cache_results);
    let result = simulator.simulate(request).await;
    println!("{}", serde_json::to_string_pretty(result.as_ref())?);
    Ok(result.success)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Simulate {
            asteroid_id,
            lat,
            lon,
            delta_v,
            direction,
            deflect_at,
            offline,
            elevation,
        } => {
            let request = SimulationRequest::new(asteroid_id, lat, lon, delta_v)
                .with_direction(direction)
                .with_deflection_time(deflect_at);

            let success = if offline {
                run_simulation(StaticCatalog::well_known(), FixedElevation(elevation), &config, &request)
                    .await?
            } else {
                let catalog = SbdbClient::new(&config.service)?;
                let terrain = default_elevation_service(&config.service)?;
                run_simulation(catalog, terrain, &config, &request).await?
            };

            if !success {
                std::process::exit(1);
            }
        }
        Command::Catalog => {
            let catalog = StaticCatalog::well_known();
            let mut entries: Vec<_> = catalog.entries().collect();
            entries.sort_by(|a, b| a.id.cmp(&b.id));
            for entry in entries {
                println!(
                    "{:>8}  {:<28} a={:.4} AU  e={:.4}  D={:.2} km",
                    entry.id,
                    entry.name,
                    entry.elements.semi_major_axis / AU,
                    entry.elements.eccentricity,
                    entry.profile.diameter_km
                );
            }
        }
    }

    Ok(())
}
