// Simulation Orchestrator - one impact scenario end to end
// Catalog lookup → terrain → trajectories → deflection → impact effects.

use serde::{Deserialize, Serialize, Serializer};
use std::time::Duration;

use crate::api_client::{AsteroidCatalog, ElevationService};
use crate::config::EngineConfig;
use crate::deflection::{validate_deflection_time, DeflectionDirection, DeflectionModel, Impulse};
use crate::error::{Result, SimulationError};
use crate::impact::{ImpactEffects, ImpactPhysicsCalculator, PhysicalProfile, TargetType};
use crate::propagator::{OrbitPropagator, Trajectory};

// =============================================================================
// REQUEST / SCENARIO
// =============================================================================

fn default_impact_lat() -> f64 {
    34.05
}

fn default_impact_lon() -> f64 {
    -118.24
}

/// Request body as sent by the API layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRequest {
    pub asteroid_id: String,
    #[serde(default = "default_impact_lat")]
    pub impact_lat: f64,
    #[serde(default = "default_impact_lon")]
    pub impact_lon: f64,
    /// Delta-v magnitude (m/s)
    #[serde(default)]
    pub mitigation_delta_v: f64,
    #[serde(default)]
    pub deflection_direction: DeflectionDirection,
    /// Normalized time of the impulse, t ∈ [0,1]
    #[serde(default)]
    pub deflection_time: f64,
}

impl SimulationRequest {
    pub fn new(
        asteroid_id: impl Into<String>,
        impact_lat: f64,
        impact_lon: f64,
        mitigation_delta_v: f64,
    ) -> Self {
        Self {
            asteroid_id: asteroid_id.into(),
            impact_lat,
            impact_lon,
            mitigation_delta_v,
            deflection_direction: DeflectionDirection::default(),
            deflection_time: 0.0,
        }
    }

    pub fn with_direction(mut self, direction: DeflectionDirection) -> Self {
        self.deflection_direction = direction;
        self
    }

    pub fn with_deflection_time(mut self, t_deflect: f64) -> Self {
        self.deflection_time = t_deflect;
        self
    }

    pub fn impulse(&self) -> Impulse {
        Impulse::new(self.mitigation_delta_v, self.deflection_direction)
    }

    pub fn validate(&self) -> Result<()> {
        if self.asteroid_id.trim().is_empty() {
            return Err(SimulationError::validation("asteroid id is required"));
        }
        if !(-90.0..=90.0).contains(&self.impact_lat) {
            return Err(SimulationError::validation(format!(
                "impact latitude must be within ±90°, got {}",
                self.impact_lat
            )));
        }
        if !(-180.0..=180.0).contains(&self.impact_lon) {
            return Err(SimulationError::validation(format!(
                "impact longitude must be within ±180°, got {}",
                self.impact_lon
            )));
        }
        self.impulse().validate()?;
        validate_deflection_time(self.deflection_time)
    }
}

/// Everything the engine needs about one impact, after collaborator lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactScenario {
    pub profile: PhysicalProfile,
    pub impact_lat: f64,
    pub impact_lon: f64,
    pub target_type: TargetType,
    pub impulse: Impulse,
    pub t_deflect: f64,
}

// =============================================================================
// RESULT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactReport {
    pub impact_energy_mt: f64,
    pub crater_diameter_km: f64,
    pub tsunami_risk: bool,
    pub seismic_magnitude: f64,
    pub fireball_radius_km: f64,
    pub target_type: TargetType,
    pub original_trajectory: Trajectory,
    pub deflected_trajectory: Trajectory,
    pub miss_distance_km: f64,
    pub asteroid_name: String,
    /// Degraded-but-recovered conditions (terrain fallback, Kepler non-convergence)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ImpactReport {
    fn new(
        effects: ImpactEffects,
        original_trajectory: Trajectory,
        deflected_trajectory: Trajectory,
        miss_distance_km: f64,
        asteroid_name: String,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            impact_energy_mt: effects.impact_energy_mt,
            crater_diameter_km: effects.crater_diameter_km,
            tsunami_risk: effects.tsunami_risk,
            seismic_magnitude: effects.seismic_magnitude,
            fireball_radius_km: effects.fireball_radius_km,
            target_type: effects.target_type,
            original_trajectory,
            deflected_trajectory,
            miss_distance_km,
            asteroid_name,
            warnings,
        }
    }
}

/// Either a complete report or an error, never a partial result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub success: bool,
    #[serde(flatten)]
    pub report: Option<ImpactReport>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_error"
    )]
    pub error: Option<SimulationError>,
}

fn serialize_error<S: Serializer>(
    error: &Option<SimulationError>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match error {
        Some(err) => serializer.serialize_str(&err.to_string()),
        None => serializer.serialize_none(),
    }
}

impl SimulationResult {
    pub fn succeeded(report: ImpactReport) -> Self {
        Self {
            success: true,
            report: Some(report),
            error: None,
        }
    }

    pub fn failed(error: SimulationError) -> Self {
        Self {
            success: false,
            report: None,
            error: Some(error),
        }
    }
}

impl From<Result<ImpactReport>> for SimulationResult {
    fn from(result: Result<ImpactReport>) -> Self {
        match result {
            Ok(report) => Self::succeeded(report),
            Err(err) => Self::failed(err),
        }
    }
}

// =============================================================================
// ORCHESTRATOR
// =============================================================================

pub struct SimulationOrchestrator<C, E> {
    catalog: C,
    elevation: E,
    propagator: OrbitPropagator,
    deflection: DeflectionModel,
    impact: ImpactPhysicsCalculator,
    elevation_timeout: Duration,
}

impl<C: AsteroidCatalog, E: ElevationService> SimulationOrchestrator<C, E> {
    pub fn new(catalog: C, elevation: E, config: &EngineConfig) -> Self {
        let propagator = OrbitPropagator::new(config.orbit.clone());
        Self {
            catalog,
            elevation,
            deflection: DeflectionModel::new(propagator.clone()),
            propagator,
            impact: ImpactPhysicsCalculator::new(config.physics.clone()),
            elevation_timeout: config.service.elevation_timeout(),
        }
    }

    /// Entry point for the API layer: failures become `{success: false, error}`.
    pub async fn simulate(&self, request: &SimulationRequest) -> SimulationResult {
        let result = self.run(request).await;
        if let Err(err) = &result {
            tracing::warn!(asteroid = %request.asteroid_id, %err, "simulation failed");
        }
        result.into()
    }

    pub async fn simulate_impact(
        &self,
        asteroid_id: &str,
        impact_lat: f64,
        impact_lon: f64,
        mitigation_delta_v: f64,
    ) -> SimulationResult {
        let request = SimulationRequest::new(asteroid_id, impact_lat, impact_lon, mitigation_delta_v);
        self.simulate(&request).await
    }

    pub async fn run(&self, request: &SimulationRequest) -> Result<ImpactReport> {
        request.validate()?;
        tracing::info!(
            asteroid = %request.asteroid_id,
            lat = request.impact_lat,
            lon = request.impact_lon,
            delta_v = request.mitigation_delta_v,
            "simulating impact scenario"
        );

        let entry = self
            .catalog
            .get_orbital_elements(request.asteroid_id.trim())
            .await?;
        entry.elements.validate()?;
        entry.profile.validate()?;

        let mut warnings = Vec::new();
        let target_type = self
            .resolve_target(request.impact_lat, request.impact_lon, &mut warnings)
            .await;

        let scenario = ImpactScenario {
            profile: entry.profile,
            impact_lat: request.impact_lat,
            impact_lon: request.impact_lon,
            target_type,
            impulse: request.impulse(),
            t_deflect: request.deflection_time,
        };

        let orbit = self.propagator.config();
        let original = self
            .propagator
            .propagate(&entry.elements, orbit.sample_count, orbit.time_span)?;

        let (deflected, miss_distance_km) = if scenario.impulse.is_zero() {
            (Trajectory::empty(), 0.0)
        } else {
            let outcome = self.deflection.deflect(&entry.elements, &scenario)?;
            (outcome.trajectory, outcome.miss_distance_km)
        };

        let effects = self.impact.compute_effects(&scenario.profile, target_type)?;

        for (label, trajectory) in [("original", &original), ("deflected", &deflected)] {
            let degraded = trajectory.degraded_count();
            if degraded > 0 {
                warnings.push(format!(
                    "{} trajectory: {} sample(s) at degraded precision",
                    label, degraded
                ));
            }
        }

        tracing::info!(
            asteroid = %entry.name,
            energy_mt = effects.impact_energy_mt,
            target = %target_type,
            miss_distance_km,
            "simulation complete"
        );

        Ok(ImpactReport::new(
            effects,
            original,
            deflected,
            miss_distance_km,
            entry.name,
            warnings,
        ))
    }

    /// Elevation lookup bounded by the configured timeout; any failure degrades to rock.
    async fn resolve_target(&self, lat: f64, lon: f64, warnings: &mut Vec<String>) -> TargetType {
        let lookup = self.elevation.get_elevation(lat, lon);
        let reason = match tokio::time::timeout(self.elevation_timeout, lookup).await {
            Ok(Ok(elevation)) if elevation.is_finite() => {
                return TargetType::from_elevation(elevation)
            }
            Ok(Ok(elevation)) => format!("non-finite elevation {}", elevation),
            Ok(Err(err)) => err.to_string(),
            Err(_) => format!("elevation lookup timed out after {:?}", self.elevation_timeout),
        };

        tracing::warn!(lat, lon, %reason, "terrain lookup failed, assuming rock");
        warnings.push(format!("terrain defaulted to rock: {}", reason));
        TargetType::Rock
    }
}
