// Deflection Model - instantaneous delta-v impulse and the perturbed trajectory
// The impulse is applied at t_deflect; samples before that instant are untouched.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{Result, SimulationError};
use crate::physics_engine::{OrbitalElements, StateVector, Vector3, AU};
use crate::propagator::{OrbitPropagator, Trajectory, TrajectorySample};
use crate::simulation::ImpactScenario;

// =============================================================================
// IMPULSE
// =============================================================================

/// Axis of the impulse in the asteroid's local orbital frame at t_deflect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeflectionDirection {
    /// Along the velocity vector (kinetic impactor default)
    #[default]
    Prograde,
    Retrograde,
    /// Away from the Sun
    RadialOut,
    RadialIn,
    /// Along the orbit normal r × v
    Normal,
    AntiNormal,
}

impl DeflectionDirection {
    /// Unit vector for this axis at the given state.
    pub fn resolve(&self, state: &StateVector) -> Vector3 {
        let radial = state.position.normalize();
        let along = state.velocity.normalize();
        let normal = state.position.cross(&state.velocity).normalize();
        match self {
            Self::Prograde => along,
            Self::Retrograde => along.scale(-1.0),
            Self::RadialOut => radial,
            Self::RadialIn => radial.scale(-1.0),
            Self::Normal => normal,
            Self::AntiNormal => normal.scale(-1.0),
        }
    }
}

impl std::str::FromStr for DeflectionDirection {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "prograde" => Ok(Self::Prograde),
            "retrograde" => Ok(Self::Retrograde),
            "radial_out" | "radial" => Ok(Self::RadialOut),
            "radial_in" => Ok(Self::RadialIn),
            "normal" => Ok(Self::Normal),
            "anti_normal" => Ok(Self::AntiNormal),
            other => Err(SimulationError::validation(format!(
                "unknown deflection direction '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Impulse {
    /// Delta-v magnitude (m/s); zero means no deflection
    pub magnitude_m_s: f64,
    pub direction: DeflectionDirection,
}

impl Impulse {
    pub fn new(magnitude_m_s: f64, direction: DeflectionDirection) -> Self {
        Self {
            magnitude_m_s,
            direction,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.magnitude_m_s == 0.0
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.magnitude_m_s.is_finite() && self.magnitude_m_s >= 0.0) {
            return Err(SimulationError::validation(format!(
                "delta-v must be a non-negative finite value, got {}",
                self.magnitude_m_s
            )));
        }
        Ok(())
    }
}

pub fn validate_deflection_time(t_deflect: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&t_deflect) {
        return Err(SimulationError::validation(format!(
            "deflection time must be within [0, 1], got {}",
            t_deflect
        )));
    }
    Ok(())
}

// =============================================================================
// DEFLECTION MODEL
// =============================================================================

/// Bisection steps when refining a 1 AU crossing between two samples
const CROSSING_BISECTIONS: u32 = 60;

/// Where the undeflected path meets Earth's circular 1 AU orbit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloseApproach {
    /// Normalized epoch of the encounter
    pub t: f64,
    /// Earth's reference position at that epoch; always on the 1 AU circle
    pub earth_position: Vector3,
}

#[derive(Debug, Clone)]
pub struct DeflectionOutcome {
    pub trajectory: Trajectory,
    pub miss_distance_km: f64,
    /// Elements after the impulse; `None` when no impulse was applied
    pub deflected_elements: Option<OrbitalElements>,
    pub close_approach: CloseApproach,
}

#[derive(Debug, Clone, Default)]
pub struct DeflectionModel {
    propagator: OrbitPropagator,
}

impl DeflectionModel {
    pub fn new(propagator: OrbitPropagator) -> Self {
        Self { propagator }
    }

    pub fn deflect(
        &self,
        elements: &OrbitalElements,
        scenario: &ImpactScenario,
    ) -> Result<DeflectionOutcome> {
        let t_deflect = scenario.t_deflect;
        validate_deflection_time(t_deflect)?;
        scenario.impulse.validate()?;

        let config = self.propagator.config();
        let (sample_count, time_span) = (config.sample_count, config.time_span);
        let original = self.propagator.propagate(elements, sample_count, time_span)?;
        let close_approach = self.close_approach(elements, &original, t_deflect, time_span);

        if scenario.impulse.is_zero() {
            return Ok(DeflectionOutcome {
                trajectory: original,
                miss_distance_km: 0.0,
                deflected_elements: None,
                close_approach,
            });
        }

        // State at the instant of the impulse
        let mu = self.propagator.mu();
        let m_deflect = self
            .propagator
            .mean_anomaly_at(elements, t_deflect, time_span);
        let at_impulse = self.propagator.state_at(elements, m_deflect).state;

        let delta_v = scenario
            .impulse
            .direction
            .resolve(&at_impulse)
            .scale(scenario.impulse.magnitude_m_s);
        let perturbed = StateVector::new(at_impulse.position, at_impulse.velocity.add(&delta_v));
        let deflected = OrbitalElements::from_state_vector(&perturbed, mu)?;

        // Physical time keeps ticking at the original period; the new orbit
        // advances its mean anomaly at its own rate.
        let rate = elements.period(mu) / deflected.period(mu);
        let deflected_at = |t: f64| {
            let m = deflected.mean_anomaly + 2.0 * PI * time_span * (t - t_deflect) * rate;
            self.propagator.state_at(&deflected, m)
        };

        let samples: Vec<TrajectorySample> = original
            .samples()
            .iter()
            .map(|sample| {
                if sample.t < t_deflect {
                    return *sample;
                }
                let orbit = deflected_at(sample.t);
                TrajectorySample {
                    t: sample.t,
                    position: orbit.state.position,
                    degraded: !orbit.converged,
                }
            })
            .collect();

        let at_encounter = deflected_at(close_approach.t).state.position;
        let miss_distance_km = at_encounter.distance(&close_approach.earth_position) / 1000.0;

        tracing::debug!(
            delta_v = scenario.impulse.magnitude_m_s,
            t_deflect,
            close_approach_t = close_approach.t,
            miss_distance_km,
            new_semi_major_axis_au = deflected.semi_major_axis / AU,
            "deflection applied"
        );

        Ok(DeflectionOutcome {
            trajectory: Trajectory::new(samples),
            miss_distance_km,
            deflected_elements: Some(deflected),
            close_approach,
        })
    }

    /// First crossing of the 1 AU sphere by the undeflected path at or after
    /// `t_from`, refined by bisection between samples. Crossings before `t_from`
    /// are never the encounter, even when nearer 1 AU. An orbit that never
    /// crosses uses its sample nearest 1 AU, projected radially onto the circle.
    pub fn close_approach(
        &self,
        elements: &OrbitalElements,
        original: &Trajectory,
        t_from: f64,
        time_span: f64,
    ) -> CloseApproach {
        let position_at = |t: f64| {
            let m = self.propagator.mean_anomaly_at(elements, t, time_span);
            self.propagator.state_at(elements, m).state.position
        };
        let offset_from_earth_orbit = |t: f64| position_at(t).magnitude() - AU;

        let mut times = vec![t_from];
        times.extend(original.samples().iter().map(|s| s.t).filter(|&t| t > t_from));

        for pair in times.windows(2) {
            let (mut lo, mut hi) = (pair[0], pair[1]);
            let mut f_lo = offset_from_earth_orbit(lo);
            if f_lo * offset_from_earth_orbit(hi) > 0.0 {
                continue;
            }
            for _ in 0..CROSSING_BISECTIONS {
                let mid = 0.5 * (lo + hi);
                let f_mid = offset_from_earth_orbit(mid);
                if f_lo * f_mid <= 0.0 {
                    hi = mid;
                } else {
                    lo = mid;
                    f_lo = f_mid;
                }
            }
            let t = 0.5 * (lo + hi);
            return CloseApproach {
                t,
                earth_position: on_earth_orbit(&position_at(t)),
            };
        }

        let nearest = &original.samples()[nearest_to_earth_orbit(original, t_from)];
        CloseApproach {
            t: nearest.t,
            earth_position: on_earth_orbit(&nearest.position),
        }
    }
}

fn on_earth_orbit(position: &Vector3) -> Vector3 {
    position.normalize().scale(AU)
}

/// Index of the sample at or after `t_from` whose heliocentric distance is nearest 1 AU.
fn nearest_to_earth_orbit(trajectory: &Trajectory, t_from: f64) -> usize {
    let samples = trajectory.samples();
    samples
        .iter()
        .enumerate()
        .filter(|(_, s)| s.t >= t_from)
        .min_by(|(_, a), (_, b)| {
            let da = (a.position.magnitude() - AU).abs();
            let db = (b.position.magnitude() - AU).abs();
            da.total_cmp(&db)
        })
        .map(|(index, _)| index)
        .unwrap_or(samples.len().saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impact::{PhysicalProfile, TargetType};
    use approx::assert_relative_eq;

    // Aphelion at t=0, crosses 1 AU inbound at t≈0.42 and outbound at t≈0.58
    fn crossing_orbit() -> OrbitalElements {
        OrbitalElements {
            semi_major_axis: 1.3 * AU,
            eccentricity: 0.3,
            inclination: 0.05,
            longitude_ascending_node: 1.0,
            argument_perihelion: 0.5,
            mean_anomaly: PI,
        }
    }

    fn scenario(delta_v: f64, direction: DeflectionDirection, t_deflect: f64) -> ImpactScenario {
        ImpactScenario {
            profile: PhysicalProfile::new(0.5, 20.0, Some(2500.0)),
            impact_lat: 0.0,
            impact_lon: 0.0,
            target_type: TargetType::Rock,
            impulse: Impulse::new(delta_v, direction),
            t_deflect,
        }
    }

    #[test]
    fn test_zero_impulse_copies_original() {
        let model = DeflectionModel::default();
        let el = crossing_orbit();
        let out = model
            .deflect(&el, &scenario(0.0, DeflectionDirection::Prograde, 0.3))
            .unwrap();
        let original = OrbitPropagator::default().propagate(&el, 100, 1.0).unwrap();

        assert_eq!(out.trajectory, original);
        assert_eq!(out.miss_distance_km, 0.0);
        assert!(out.deflected_elements.is_none());
    }

    #[test]
    fn test_negligible_impulse_matches_original() {
        let model = DeflectionModel::default();
        let el = crossing_orbit();
        let out = model
            .deflect(&el, &scenario(1e-9, DeflectionDirection::Prograde, 0.0))
            .unwrap();
        let original = OrbitPropagator::default().propagate(&el, 100, 1.0).unwrap();

        for (a, b) in out.trajectory.samples().iter().zip(original.samples()) {
            assert!(a.position.distance(&b.position) <= 1e-6 * b.position.magnitude());
        }
        assert!(out.miss_distance_km < 1.0);
    }

    #[test]
    fn test_samples_before_impulse_untouched() {
        let model = DeflectionModel::default();
        let el = crossing_orbit();
        let out = model
            .deflect(&el, &scenario(10.0, DeflectionDirection::Prograde, 0.5))
            .unwrap();
        let original = OrbitPropagator::default().propagate(&el, 100, 1.0).unwrap();

        assert_eq!(out.trajectory.len(), original.len());
        for (a, b) in out.trajectory.samples().iter().zip(original.samples()) {
            if a.t < 0.5 {
                assert_eq!(a, b);
            }
        }
        // The last sample has drifted along-track
        let drift = out.trajectory.samples()[99]
            .position
            .distance(&original.samples()[99].position);
        assert!(drift > 1000.0);
    }

    #[test]
    fn test_prograde_raises_semi_major_axis() {
        let model = DeflectionModel::default();
        let el = crossing_orbit();
        let up = model
            .deflect(&el, &scenario(20.0, DeflectionDirection::Prograde, 0.2))
            .unwrap();
        let down = model
            .deflect(&el, &scenario(20.0, DeflectionDirection::Retrograde, 0.2))
            .unwrap();
        assert!(up.deflected_elements.unwrap().semi_major_axis > el.semi_major_axis);
        assert!(down.deflected_elements.unwrap().semi_major_axis < el.semi_major_axis);
    }

    #[test]
    fn test_miss_distance_grows_with_delta_v() {
        let model = DeflectionModel::default();
        let el = crossing_orbit();
        let misses: Vec<f64> = (0..=10)
            .map(|k| {
                let dv = 5.0 * k as f64;
                model
                    .deflect(&el, &scenario(dv, DeflectionDirection::Prograde, 0.0))
                    .unwrap()
                    .miss_distance_km
            })
            .collect();

        assert_eq!(misses[0], 0.0);
        assert!(misses.windows(2).all(|w| w[1] > w[0]), "{:?}", misses);
        // Roughly linear for small impulses
        assert_relative_eq!(misses[10] / misses[5], 2.0, max_relative = 0.05);
    }

    #[test]
    fn test_close_approach_near_one_au() {
        let model = DeflectionModel::default();
        let out = model
            .deflect(&crossing_orbit(), &scenario(1.0, DeflectionDirection::Prograde, 0.0))
            .unwrap();
        assert!(out.close_approach.t > 0.3 && out.close_approach.t < 0.5);
        assert_relative_eq!(out.close_approach.earth_position.magnitude(), AU, max_relative = 1e-12);
    }

    #[test]
    fn test_impulse_after_first_crossing_targets_next_one() {
        let model = DeflectionModel::default();
        let early = model
            .deflect(&crossing_orbit(), &scenario(5.0, DeflectionDirection::Prograde, 0.0))
            .unwrap();
        let late = model
            .deflect(&crossing_orbit(), &scenario(5.0, DeflectionDirection::Prograde, 0.5))
            .unwrap();

        assert!(early.close_approach.t < 0.5);
        assert!(late.close_approach.t > 0.5 && late.close_approach.t < 0.7);
        assert_relative_eq!(late.close_approach.earth_position.magnitude(), AU, max_relative = 1e-12);
        assert!(late.miss_distance_km > 0.0);
        assert!(late.miss_distance_km < early.miss_distance_km);
    }

    #[test]
    fn test_earth_reference_on_one_au_circle_without_crossing() {
        // Perihelion at 1.13 AU: the path never reaches Earth's orbit
        let outer = OrbitalElements {
            semi_major_axis: 1.4579 * AU,
            eccentricity: 0.2227,
            inclination: 10.83_f64.to_radians(),
            longitude_ascending_node: 304.3_f64.to_radians(),
            argument_perihelion: 178.9_f64.to_radians(),
            mean_anomaly: 271.1_f64.to_radians(),
        };
        let model = DeflectionModel::default();
        let out = model
            .deflect(&outer, &scenario(1.0, DeflectionDirection::Prograde, 0.0))
            .unwrap();

        let earth = out.close_approach.earth_position;
        assert_relative_eq!(earth.magnitude(), AU, max_relative = 1e-12);
        let at_encounter = out
            .trajectory
            .samples()
            .iter()
            .find(|s| s.t == out.close_approach.t)
            .unwrap();
        // Radially outward of Earth by the orbit's gap to 1 AU
        assert!(at_encounter.position.magnitude() > 1.1 * AU);
        assert!(out.miss_distance_km > 0.1 * AU / 1000.0);

        let untouched = model
            .deflect(&outer, &scenario(0.0, DeflectionDirection::Prograde, 0.0))
            .unwrap();
        assert_eq!(untouched.miss_distance_km, 0.0);
        assert_relative_eq!(untouched.close_approach.earth_position.magnitude(), AU, max_relative = 1e-12);
    }

    #[test]
    fn test_well_known_earth_references_on_one_au_circle() {
        let catalog = crate::api_client::StaticCatalog::well_known();
        let model = DeflectionModel::default();
        for entry in catalog.entries() {
            let out = model
                .deflect(&entry.elements, &scenario(1.0, DeflectionDirection::Prograde, 0.0))
                .unwrap();
            assert_relative_eq!(out.close_approach.earth_position.magnitude(), AU, max_relative = 1e-12);
            assert!(out.miss_distance_km.is_finite());
        }
    }

    #[test]
    fn test_deflection_time_out_of_range() {
        let model = DeflectionModel::default();
        for t in [-0.1, 1.5, f64::NAN] {
            let err = model
                .deflect(&crossing_orbit(), &scenario(1.0, DeflectionDirection::Prograde, t))
                .unwrap_err();
            assert!(matches!(err, SimulationError::Validation(_)));
        }
    }

    #[test]
    fn test_escape_impulse_rejected() {
        let model = DeflectionModel::default();
        let err = model
            .deflect(
                &crossing_orbit(),
                &scenario(40_000.0, DeflectionDirection::Prograde, 0.0),
            )
            .unwrap_err();
        assert!(matches!(err, SimulationError::Validation(_)));
    }

    #[test]
    fn test_direction_axes() {
        let state = StateVector::new(
            Vector3::new(AU, 0.0, 0.0),
            Vector3::new(0.0, 30_000.0, 0.0),
        );
        let pro = DeflectionDirection::Prograde.resolve(&state);
        let out = DeflectionDirection::RadialOut.resolve(&state);
        let normal = DeflectionDirection::Normal.resolve(&state);
        assert_relative_eq!(pro.y, 1.0);
        assert_relative_eq!(out.x, 1.0);
        assert_relative_eq!(normal.z, 1.0);
        assert_eq!(
            "anti-normal".parse::<DeflectionDirection>().unwrap(),
            DeflectionDirection::AntiNormal
        );
        assert!("sideways".parse::<DeflectionDirection>().is_err());
    }
}
