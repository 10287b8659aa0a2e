// Impact Physics - kinetic energy, crater scaling, fireball, seismic and tsunami estimates
// Scaling laws follow Holsapple-Schmidt energy scaling with tunable calibration.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

use crate::config::PhysicsConfig;
use crate::error::{Result, SimulationError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    #[default]
    Rock,
    Water,
}

impl TargetType {
    /// Terrain class from signed surface elevation: at or below sea level is water.
    pub fn from_elevation(elevation_m: f64) -> Self {
        if elevation_m <= 0.0 {
            TargetType::Water
        } else {
            TargetType::Rock
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetType::Rock => write!(f, "rock"),
            TargetType::Water => write!(f, "water"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalProfile {
    pub diameter_km: f64,
    pub velocity_km_s: f64,
    /// Bulk density (kg/m³); the configured default applies when unknown
    pub density_kg_m3: Option<f64>,
}

impl PhysicalProfile {
    pub fn new(diameter_km: f64, velocity_km_s: f64, density_kg_m3: Option<f64>) -> Self {
        Self {
            diameter_km,
            velocity_km_s,
            density_kg_m3,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.diameter_km.is_finite() && self.diameter_km > 0.0) {
            return Err(SimulationError::validation(format!(
                "diameter must be positive, got {} km",
                self.diameter_km
            )));
        }
        if !(self.velocity_km_s.is_finite() && self.velocity_km_s > 0.0) {
            return Err(SimulationError::validation(format!(
                "velocity must be positive, got {} km/s",
                self.velocity_km_s
            )));
        }
        if let Some(density) = self.density_kg_m3 {
            if !(density.is_finite() && density > 0.0) {
                return Err(SimulationError::validation(format!(
                    "density must be positive, got {} kg/m³",
                    density
                )));
            }
        }
        Ok(())
    }

    /// Mass of a uniform sphere (kg)
    pub fn mass_kg(&self, default_density: f64) -> f64 {
        let radius_m = self.diameter_km * 1000.0 / 2.0;
        let volume = (4.0 / 3.0) * PI * radius_m.powi(3);
        self.density_kg_m3.unwrap_or(default_density) * volume
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactEffects {
    pub impact_energy_mt: f64,
    pub crater_diameter_km: f64,
    pub fireball_radius_km: f64,
    pub seismic_magnitude: f64,
    pub tsunami_risk: bool,
    pub target_type: TargetType,
}

#[derive(Debug, Clone, Default)]
pub struct ImpactPhysicsCalculator {
    config: PhysicsConfig,
}

impl ImpactPhysicsCalculator {
    pub fn new(config: PhysicsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn compute_effects(
        &self,
        profile: &PhysicalProfile,
        target_type: TargetType,
    ) -> Result<ImpactEffects> {
        profile.validate()?;

        let kinetic_energy_j = self.kinetic_energy_joules(profile);
        let impact_energy_mt = kinetic_energy_j / self.config.megaton_tnt_joules;
        if !(kinetic_energy_j.is_finite() && impact_energy_mt.is_finite()) {
            return Err(SimulationError::validation(format!(
                "impact energy overflows for a {} km body at {} km/s",
                profile.diameter_km, profile.velocity_km_s
            )));
        }

        let rock_crater_km = self.rock_crater_diameter_km(impact_energy_mt);
        let crater_diameter_km = match target_type {
            TargetType::Rock => rock_crater_km,
            TargetType::Water => rock_crater_km * self.config.water_crater_factor,
        };

        Ok(ImpactEffects {
            impact_energy_mt,
            crater_diameter_km,
            fireball_radius_km: self.config.fireball_fraction * rock_crater_km,
            seismic_magnitude: self.seismic_magnitude(kinetic_energy_j),
            tsunami_risk: target_type == TargetType::Water
                && impact_energy_mt > self.config.tsunami_threshold_mt,
            target_type,
        })
    }

    /// KE = ½·m·v² (J)
    pub fn kinetic_energy_joules(&self, profile: &PhysicalProfile) -> f64 {
        let velocity_m_s = profile.velocity_km_s * 1000.0;
        0.5 * profile.mass_kg(self.config.default_density) * velocity_m_s * velocity_m_s
    }

    /// D = k·E^(1/3.4); continuous to zero as E → 0.
    fn rock_crater_diameter_km(&self, energy_mt: f64) -> f64 {
        if energy_mt <= 0.0 {
            return 0.0;
        }
        self.config.crater_coefficient * energy_mt.powf(self.config.crater_exponent)
    }

    /// Richter-equivalent M = (2/3)·log10(E) − offset, floored at zero.
    fn seismic_magnitude(&self, kinetic_energy_j: f64) -> f64 {
        if kinetic_energy_j <= 0.0 {
            return 0.0;
        }
        ((2.0 / 3.0) * kinetic_energy_j.log10() - self.config.seismic_offset).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn calculator() -> ImpactPhysicsCalculator {
        ImpactPhysicsCalculator::default()
    }

    #[test]
    fn test_reference_scenario_is_pinned() {
        let profile = PhysicalProfile::new(0.5, 20.0, Some(2500.0));
        let fx = calculator().compute_effects(&profile, TargetType::Rock).unwrap();

        assert_relative_eq!(fx.impact_energy_mt, 7821.444425165792, max_relative = 1e-9);
        assert_relative_eq!(fx.crater_diameter_km, 9.776478310931475, max_relative = 1e-9);
        assert_relative_eq!(fx.fireball_radius_km, 3.9105913243725903, max_relative = 1e-9);
        assert_relative_eq!(fx.seismic_magnitude, 7.139919093103043, max_relative = 1e-9);
        assert!(!fx.tsunami_risk);
        assert_eq!(fx.target_type, TargetType::Rock);
    }

    #[test]
    fn test_chicxulub_scale_crater() {
        // ~15 km body at 20 km/s
        let profile = PhysicalProfile::new(15.0, 20.0, Some(3000.0));
        let fx = calculator().compute_effects(&profile, TargetType::Rock).unwrap();
        assert!(fx.impact_energy_mt > 1e8);
        assert!(fx.crater_diameter_km > 150.0, "{}", fx.crater_diameter_km);
        assert!(fx.seismic_magnitude > 9.0);
    }

    #[test]
    fn test_energy_scaling() {
        let calc = calculator();
        let base = PhysicalProfile::new(0.3, 12.0, None);
        let e0 = calc.compute_effects(&base, TargetType::Rock).unwrap().impact_energy_mt;

        let faster = PhysicalProfile::new(0.3, 24.0, None);
        let e_fast = calc.compute_effects(&faster, TargetType::Rock).unwrap().impact_energy_mt;
        assert_relative_eq!(e_fast / e0, 4.0, max_relative = 1e-12);

        let bigger = PhysicalProfile::new(0.9, 12.0, None);
        let e_big = calc.compute_effects(&bigger, TargetType::Rock).unwrap().impact_energy_mt;
        assert_relative_eq!(e_big / e0, 27.0, max_relative = 1e-12);
    }

    #[test]
    fn test_default_density_applies() {
        let calc = calculator();
        let unknown = PhysicalProfile::new(1.0, 20.0, None);
        let explicit = PhysicalProfile::new(1.0, 20.0, Some(3000.0));
        assert_eq!(
            calc.kinetic_energy_joules(&unknown),
            calc.kinetic_energy_joules(&explicit)
        );
    }

    #[test]
    fn test_water_suppresses_crater_and_raises_tsunami() {
        let calc = calculator();
        let profile = PhysicalProfile::new(0.5, 20.0, Some(2500.0));
        let rock = calc.compute_effects(&profile, TargetType::Rock).unwrap();
        let water = calc.compute_effects(&profile, TargetType::Water).unwrap();

        assert!(water.crater_diameter_km < rock.crater_diameter_km);
        assert_eq!(water.fireball_radius_km, rock.fireball_radius_km);
        assert!(water.tsunami_risk);
        assert!(!rock.tsunami_risk);
    }

    #[test]
    fn test_tsunami_threshold_is_configurable() {
        let calc = ImpactPhysicsCalculator::new(PhysicsConfig {
            tsunami_threshold_mt: 1e6,
            ..PhysicsConfig::default()
        });
        let profile = PhysicalProfile::new(0.5, 20.0, Some(2500.0));
        let fx = calc.compute_effects(&profile, TargetType::Water).unwrap();
        assert!(!fx.tsunami_risk);
    }

    #[test]
    fn test_tiny_impactor_floors_seismic() {
        let profile = PhysicalProfile::new(1e-6, 0.001, Some(1000.0));
        let fx = calculator().compute_effects(&profile, TargetType::Rock).unwrap();
        assert_eq!(fx.seismic_magnitude, 0.0);
        assert!(fx.crater_diameter_km.is_finite() && fx.crater_diameter_km >= 0.0);
    }

    #[test]
    fn test_rejects_non_positive_inputs() {
        let calc = calculator();
        for profile in [
            PhysicalProfile::new(0.0, 20.0, None),
            PhysicalProfile::new(-1.0, 20.0, None),
            PhysicalProfile::new(1.0, 0.0, None),
            PhysicalProfile::new(1.0, f64::NAN, None),
            PhysicalProfile::new(1.0, 20.0, Some(0.0)),
        ] {
            assert!(matches!(
                calc.compute_effects(&profile, TargetType::Rock),
                Err(SimulationError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_overflowing_energy_rejected() {
        let calc = calculator();
        for profile in [
            PhysicalProfile::new(1e120, 20.0, None),
            PhysicalProfile::new(1.0, 1e160, None),
            PhysicalProfile::new(1e100, 20.0, Some(1e200)),
        ] {
            assert!(matches!(
                calc.compute_effects(&profile, TargetType::Water),
                Err(SimulationError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_tsunami_needs_energy_above_threshold() {
        let profile = PhysicalProfile::new(0.5, 20.0, Some(2500.0));
        let energy = calculator()
            .compute_effects(&profile, TargetType::Water)
            .unwrap()
            .impact_energy_mt;

        let at_threshold = ImpactPhysicsCalculator::new(PhysicsConfig {
            tsunami_threshold_mt: energy,
            ..PhysicsConfig::default()
        });
        assert!(!at_threshold.compute_effects(&profile, TargetType::Water).unwrap().tsunami_risk);

        let just_below = ImpactPhysicsCalculator::new(PhysicsConfig {
            tsunami_threshold_mt: energy * (1.0 - 1e-9),
            ..PhysicsConfig::default()
        });
        assert!(just_below.compute_effects(&profile, TargetType::Water).unwrap().tsunami_risk);
    }

    #[test]
    fn test_target_from_elevation() {
        assert_eq!(TargetType::from_elevation(-20.0), TargetType::Water);
        assert_eq!(TargetType::from_elevation(0.0), TargetType::Water);
        assert_eq!(TargetType::from_elevation(1.0), TargetType::Rock);
        assert_eq!(serde_json::to_string(&TargetType::Water).unwrap(), "\"water\"");
    }

    proptest! {
        #[test]
        fn prop_effects_finite_and_non_negative(
            diameter in 1e-4f64..=100.0,
            velocity in 1e-3f64..=100.0,
            water in any::<bool>(),
        ) {
            let target = if water { TargetType::Water } else { TargetType::Rock };
            let profile = PhysicalProfile::new(diameter, velocity, None);
            let fx = calculator().compute_effects(&profile, target).unwrap();
            for value in [fx.impact_energy_mt, fx.crater_diameter_km, fx.fireball_radius_km, fx.seismic_magnitude] {
                prop_assert!(value.is_finite() && value >= 0.0);
            }
            if !water {
                prop_assert!(!fx.tsunami_risk);
            }
        }

        #[test]
        fn prop_effects_monotonic(
            diameter in 1e-3f64..50.0,
            velocity in 1e-2f64..50.0,
            grow in 1.0f64..2.0,
        ) {
            let calc = calculator();
            let base = calc.compute_effects(&PhysicalProfile::new(diameter, velocity, None), TargetType::Rock).unwrap();
            let wider = calc.compute_effects(&PhysicalProfile::new(diameter * grow, velocity, None), TargetType::Rock).unwrap();
            let faster = calc.compute_effects(&PhysicalProfile::new(diameter, velocity * grow, None), TargetType::Rock).unwrap();
            for next in [&wider, &faster] {
                prop_assert!(next.impact_energy_mt >= base.impact_energy_mt);
                prop_assert!(next.crater_diameter_km >= base.crater_diameter_km);
                prop_assert!(next.fireball_radius_km >= base.fireball_radius_km);
            }
        }
    }
}
