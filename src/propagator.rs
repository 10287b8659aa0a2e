// Orbit Propagator - Keplerian elements to a time-sampled Cartesian trajectory
// Normalized time t ∈ [0,1] maps to mean anomaly M0 + t·2π·time_span.

use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;
use std::f64::consts::PI;

use crate::config::OrbitConfig;
use crate::error::{Result, SimulationError};
use crate::physics_engine::{OrbitState, OrbitalElements, Vector3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectorySample {
    /// Normalized time in [0,1]
    pub t: f64,
    /// Heliocentric ecliptic position (meters)
    pub position: Vector3,
    /// Kepler solve hit the iteration cap; position is the best estimate
    pub degraded: bool,
}

/// Ordered samples with strictly increasing `t`. Serializes as `[[x,y,z],...]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    samples: Vec<TrajectorySample>,
}

impl Trajectory {
    pub fn new(samples: Vec<TrajectorySample>) -> Self {
        Self { samples }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> &[TrajectorySample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn degraded_count(&self) -> usize {
        self.samples.iter().filter(|s| s.degraded).count()
    }
}

impl Serialize for Trajectory {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.samples.len()))?;
        for sample in &self.samples {
            seq.serialize_element(&sample.position.to_array())?;
        }
        seq.end()
    }
}

/// `count` evenly spaced normalized times; first is exactly 0, last exactly 1.
pub fn sample_times(count: usize) -> Vec<f64> {
    let last = (count.max(2) - 1) as f64;
    (0..count)
        .map(|k| if k + 1 == count { 1.0 } else { k as f64 / last })
        .collect()
}

#[derive(Debug, Clone)]
pub struct OrbitPropagator {
    config: OrbitConfig,
}

impl OrbitPropagator {
    pub fn new(config: OrbitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OrbitConfig {
        &self.config
    }

    pub fn mu(&self) -> f64 {
        self.config.gravitational_parameter
    }

    /// Sample `sample_count` positions over `time_span` orbital periods.
    pub fn propagate(
        &self,
        elements: &OrbitalElements,
        sample_count: usize,
        time_span: f64,
    ) -> Result<Trajectory> {
        elements.validate()?;
        if sample_count < 2 {
            return Err(SimulationError::validation(format!(
                "sample count must be at least 2, got {}",
                sample_count
            )));
        }
        if !(time_span.is_finite() && time_span > 0.0) {
            return Err(SimulationError::validation(format!(
                "time span must be positive, got {}",
                time_span
            )));
        }

        let samples: Vec<TrajectorySample> = sample_times(sample_count)
            .into_iter()
            .map(|t| {
                let orbit = self.state_at(elements, self.mean_anomaly_at(elements, t, time_span));
                TrajectorySample {
                    t,
                    position: orbit.state.position,
                    degraded: !orbit.converged,
                }
            })
            .collect();

        let degraded = samples.iter().filter(|s| s.degraded).count();
        if degraded > 0 {
            tracing::warn!(
                degraded,
                eccentricity = elements.eccentricity,
                "kepler solver hit its iteration cap; positions are best estimates"
            );
        }

        Ok(Trajectory::new(samples))
    }

    /// M = M0 + t·2π·time_span
    pub fn mean_anomaly_at(&self, elements: &OrbitalElements, t: f64, time_span: f64) -> f64 {
        elements.mean_anomaly + t * 2.0 * PI * time_span
    }

    pub fn state_at(&self, elements: &OrbitalElements, mean_anomaly: f64) -> OrbitState {
        elements.state_at(
            mean_anomaly,
            self.config.gravitational_parameter,
            self.config.kepler_tolerance,
            self.config.kepler_max_iterations,
        )
    }
}

impl Default for OrbitPropagator {
    fn default() -> Self {
        Self::new(OrbitConfig::default())
    }
}
