// Engine Configuration - orbital, physical and service parameters
// Every calibration constant lives here so tests can vary it independently.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, SimulationError};
use crate::physics_engine::MU_SUN;

const ENV_PREFIX: &str = "ASTROGUARD_";

// =============================================================================
// ORBIT PROPAGATION
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OrbitConfig {
    /// Central-body gravitational parameter μ (m³/s²)
    pub gravitational_parameter: f64,
    /// Samples per trajectory (t=0 and t=1 included)
    pub sample_count: usize,
    /// Fraction of one orbital period covered by t ∈ [0,1]
    pub time_span: f64,
    /// Newton-Raphson stopping threshold on |ΔE| (rad)
    pub kepler_tolerance: f64,
    /// Newton-Raphson iteration cap
    pub kepler_max_iterations: u32,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            gravitational_parameter: MU_SUN,
            sample_count: 100,
            time_span: 1.0,
            kepler_tolerance: 1e-8,
            kepler_max_iterations: 50,
        }
    }
}

impl OrbitConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.gravitational_parameter.is_finite() && self.gravitational_parameter > 0.0) {
            return Err(SimulationError::validation(
                "gravitational parameter must be positive",
            ));
        }
        if self.sample_count < 2 {
            return Err(SimulationError::validation(format!(
                "sample count must be at least 2, got {}",
                self.sample_count
            )));
        }
        if !(self.time_span.is_finite() && self.time_span > 0.0) {
            return Err(SimulationError::validation(format!(
                "time span must be positive, got {}",
                self.time_span
            )));
        }
        if !(self.kepler_tolerance > 0.0) || self.kepler_max_iterations == 0 {
            return Err(SimulationError::validation(
                "kepler tolerance and iteration cap must be positive",
            ));
        }
        Ok(())
    }
}

// =============================================================================
// IMPACT PHYSICS
// =============================================================================

/// Empirical scaling constants for impact consequences.
///
/// The crater law is `D_km = crater_coefficient * E_mt^crater_exponent`; the
/// defaults put a 1e8 Mt (Chicxulub-class) impact near 158 km and a 10 Mt
/// impact near 1.4 km (Barringer-class).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Bulk density used when the catalog has none (kg/m³)
    pub default_density: f64,
    /// Joules per megaton of TNT
    pub megaton_tnt_joules: f64,
    /// Crater diameter for a 1 Mt rock impact (km)
    pub crater_coefficient: f64,
    /// Energy exponent of the crater law (1/3.4)
    pub crater_exponent: f64,
    /// Multiplier applied to the crater diameter for water targets
    pub water_crater_factor: f64,
    /// Fireball radius as a fraction of the rock-equivalent crater diameter
    pub fireball_fraction: f64,
    /// Offset in M = (2/3)·log10(E_J) − offset (Collins et al. 2005)
    pub seismic_offset: f64,
    /// Energy a water impact must exceed to raise a tsunami (Mt)
    pub tsunami_threshold_mt: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            default_density: 3000.0,
            megaton_tnt_joules: 4.184e15,
            crater_coefficient: 0.7,
            crater_exponent: 1.0 / 3.4,
            water_crater_factor: 2.0 / 3.0,
            fireball_fraction: 0.4,
            seismic_offset: 5.87,
            tsunami_threshold_mt: 10.0,
        }
    }
}

impl PhysicsConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("default_density", self.default_density),
            ("megaton_tnt_joules", self.megaton_tnt_joules),
            ("crater_coefficient", self.crater_coefficient),
            ("crater_exponent", self.crater_exponent),
            ("water_crater_factor", self.water_crater_factor),
            ("fireball_fraction", self.fireball_fraction),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SimulationError::validation(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if !self.seismic_offset.is_finite() || !(self.tsunami_threshold_mt >= 0.0) {
            return Err(SimulationError::validation(
                "seismic offset must be finite and tsunami threshold non-negative",
            ));
        }
        Ok(())
    }
}

// =============================================================================
// EXTERNAL SERVICES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub sbdb_url: String,
    pub usgs_elevation_url: String,
    pub open_meteo_elevation_url: String,
    /// Per-request HTTP timeout (seconds)
    pub http_timeout_secs: f64,
    /// Upper bound on the whole terrain lookup (seconds)
    pub elevation_timeout_secs: f64,
    /// Approach velocity assumed when the catalog has none (km/s)
    pub default_velocity_km_s: f64,
    pub cache_results: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            sbdb_url: "https://ssd-api.jpl.nasa.gov/sbdb.api".to_string(),
            usgs_elevation_url: "https://epqs.nationalmap.gov/v1/json".to_string(),
            open_meteo_elevation_url: "https://api.open-meteo.com/v1/elevation".to_string(),
            http_timeout_secs: 10.0,
            elevation_timeout_secs: 5.0,
            default_velocity_km_s: 20.0,
            cache_results: true,
        }
    }
}

impl ServiceConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.http_timeout_secs)
    }

    pub fn elevation_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.elevation_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("http_timeout_secs", self.http_timeout_secs),
            ("elevation_timeout_secs", self.elevation_timeout_secs),
            ("default_velocity_km_s", self.default_velocity_km_s),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(SimulationError::validation(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// COMBINED CONFIG
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub orbit: OrbitConfig,
    pub physics: PhysicsConfig,
    pub service: ServiceConfig,
}

impl EngineConfig {
    /// Load `.env` (if present) and overlay `ASTROGUARD_*` variables on the defaults.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    /// Parse a (possibly partial) JSON document; missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| SimulationError::validation(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.orbit.validate()?;
        self.physics.validate()?;
        self.service.validate()
    }

    fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = Self::default();
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            config.apply_var(name, value.trim())?;
        }
        config.validate()?;
        Ok(config)
    }

    fn apply_var(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            "SAMPLE_COUNT" => self.orbit.sample_count = parse_var(name, value)?,
            "TIME_SPAN" => self.orbit.time_span = parse_var(name, value)?,
            "KEPLER_TOLERANCE" => self.orbit.kepler_tolerance = parse_var(name, value)?,
            "KEPLER_MAX_ITERATIONS" => self.orbit.kepler_max_iterations = parse_var(name, value)?,
            "DEFAULT_DENSITY" => self.physics.default_density = parse_var(name, value)?,
            "CRATER_COEFFICIENT" => self.physics.crater_coefficient = parse_var(name, value)?,
            "WATER_CRATER_FACTOR" => self.physics.water_crater_factor = parse_var(name, value)?,
            "FIREBALL_FRACTION" => self.physics.fireball_fraction = parse_var(name, value)?,
            "SEISMIC_OFFSET" => self.physics.seismic_offset = parse_var(name, value)?,
            "TSUNAMI_THRESHOLD_MT" => self.physics.tsunami_threshold_mt = parse_var(name, value)?,
            "SBDB_URL" => self.service.sbdb_url = value.to_string(),
            "USGS_ELEVATION_URL" => self.service.usgs_elevation_url = value.to_string(),
            "OPEN_METEO_ELEVATION_URL" => self.service.open_meteo_elevation_url = value.to_string(),
            "HTTP_TIMEOUT_SECS" => self.service.http_timeout_secs = parse_var(name, value)?,
            "ELEVATION_TIMEOUT_SECS" => self.service.elevation_timeout_secs = parse_var(name, value)?,
            "DEFAULT_VELOCITY_KM_S" => self.service.default_velocity_km_s = parse_var(name, value)?,
            "CACHE_RESULTS" => self.service.cache_results = parse_var(name, value)?,
            other => tracing::debug!("ignoring unknown setting {}{}", ENV_PREFIX, other),
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.parse::<T>().map_err(|_| {
        SimulationError::validation(format!("{}{}: cannot parse '{}'", ENV_PREFIX, name, value))
    })
}
