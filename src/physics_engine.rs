// Physics Engine - Two-body orbital mechanics
// Implements Kepler's equation, 3-1-3 frame rotations and element/state conversions

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{Result, SimulationError};

// =============================================================================
// PHYSICAL CONSTANTS (SI Units)
// =============================================================================

/// Astronomical Unit in meters
pub const AU: f64 = 1.495978707e11;

/// Sun's gravitational parameter μ = G * M_sun (m³/s²)
pub const MU_SUN: f64 = 1.32712440018e20;

const TWO_PI: f64 = 2.0 * PI;

// =============================================================================
// 3D VECTOR MATHEMATICS
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn normalize(&self) -> Self {
        let mag = self.magnitude();
        if mag > 1e-15 {
            Self {
                x: self.x / mag,
                y: self.y / mag,
                z: self.z / mag,
            }
        } else {
            Self::zero()
        }
    }

    pub fn dot(&self, other: &Vector3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Vector3) -> Vector3 {
        Vector3 {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn scale(&self, s: f64) -> Self {
        Self {
            x: self.x * s,
            y: self.y * s,
            z: self.z * s,
        }
    }

    pub fn add(&self, other: &Vector3) -> Vector3 {
        Vector3 {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }

    pub fn sub(&self, other: &Vector3) -> Vector3 {
        Vector3 {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }

    pub fn distance(&self, other: &Vector3) -> f64 {
        self.sub(other).magnitude()
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

// =============================================================================
// STATE VECTOR (Position + Velocity)
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StateVector {
    pub position: Vector3, // meters (SI)
    pub velocity: Vector3, // m/s (SI)
}

impl StateVector {
    pub fn new(position: Vector3, velocity: Vector3) -> Self {
        Self { position, velocity }
    }

    /// Specific orbital energy ε = v²/2 − μ/r
    pub fn specific_energy(&self, mu: f64) -> f64 {
        let v = self.velocity.magnitude();
        0.5 * v * v - mu / self.position.magnitude()
    }
}

// =============================================================================
// PERIFOCAL → ECLIPTIC ROTATION
// =============================================================================

/// Rotation matrix R = Rz(Ω) · Rx(i) · Rz(ω), stored row-major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationMatrix {
    m: [[f64; 3]; 3],
}

impl RotationMatrix {
    pub fn rz(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            m: [[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    pub fn rx(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            m: [[1.0, 0.0, 0.0], [0.0, c, -s], [0.0, s, c]],
        }
    }

    /// 3-1-3 sequence from the perifocal frame to the ecliptic frame.
    pub fn perifocal_to_ecliptic(
        longitude_ascending_node: f64,
        inclination: f64,
        argument_perihelion: f64,
    ) -> Self {
        Self::rz(longitude_ascending_node)
            .mul(&Self::rx(inclination))
            .mul(&Self::rz(argument_perihelion))
    }

    pub fn mul(&self, other: &RotationMatrix) -> RotationMatrix {
        let mut m = [[0.0; 3]; 3];
        for (row, out) in m.iter_mut().enumerate() {
            for (col, cell) in out.iter_mut().enumerate() {
                *cell = (0..3).map(|k| self.m[row][k] * other.m[k][col]).sum();
            }
        }
        RotationMatrix { m }
    }

    pub fn apply(&self, v: &Vector3) -> Vector3 {
        let m = &self.m;
        Vector3::new(
            m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z,
            m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z,
            m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z,
        )
    }

    /// Image of the perifocal unit vector along `column` (0 = P, 1 = Q, 2 = W).
    pub fn column(&self, column: usize) -> Vector3 {
        Vector3::new(self.m[0][column], self.m[1][column], self.m[2][column])
    }
}

// =============================================================================
// KEPLER'S EQUATION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeplerSolution {
    /// Eccentric anomaly E (radians)
    pub eccentric_anomaly: f64,
    pub iterations: u32,
    /// False when the iteration cap was reached before |ΔE| < tolerance
    pub converged: bool,
}

/// Solve Kepler's equation M = E - e*sin(E) using Newton-Raphson from E0 = M.
pub fn solve_kepler_equation(
    mean_anomaly: f64,
    eccentricity: f64,
    tolerance: f64,
    max_iterations: u32,
) -> KeplerSolution {
    let mut e_anom = mean_anomaly; // Initial guess

    for iteration in 1..=max_iterations {
        let f = e_anom - eccentricity * e_anom.sin() - mean_anomaly;
        let f_prime = 1.0 - eccentricity * e_anom.cos();
        let delta = f / f_prime;
        e_anom -= delta;

        if delta.abs() < tolerance {
            return KeplerSolution {
                eccentric_anomaly: e_anom,
                iterations: iteration,
                converged: true,
            };
        }
    }

    KeplerSolution {
        eccentric_anomaly: e_anom,
        iterations: max_iterations,
        converged: false,
    }
}

/// ν = 2·atan2(√(1+e)·sin(E/2), √(1−e)·cos(E/2))
pub fn eccentric_to_true_anomaly(eccentric_anomaly: f64, eccentricity: f64) -> f64 {
    let half = eccentric_anomaly / 2.0;
    2.0 * ((1.0 + eccentricity).sqrt() * half.sin())
        .atan2((1.0 - eccentricity).sqrt() * half.cos())
}

pub fn true_to_eccentric_anomaly(true_anomaly: f64, eccentricity: f64) -> f64 {
    let half = true_anomaly / 2.0;
    2.0 * ((1.0 - eccentricity).sqrt() * half.sin())
        .atan2((1.0 + eccentricity).sqrt() * half.cos())
}

// =============================================================================
// KEPLERIAN ORBITAL ELEMENTS
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct OrbitalElements {
    /// Semi-major axis (meters)
    pub semi_major_axis: f64,
    /// Eccentricity (0-1 for elliptical)
    pub eccentricity: f64,
    /// Inclination (radians)
    pub inclination: f64,
    /// Longitude of ascending node (radians)
    pub longitude_ascending_node: f64,
    /// Argument of perihelion (radians)
    pub argument_perihelion: f64,
    /// Mean anomaly at epoch (radians)
    pub mean_anomaly: f64,
}

/// Cartesian state at one mean anomaly, with the Kepler solver outcome.
#[derive(Debug, Clone, Copy)]
pub struct OrbitState {
    pub state: StateVector,
    pub true_anomaly: f64,
    pub converged: bool,
}

impl OrbitalElements {
    /// Only bound, finite orbits are supported.
    pub fn validate(&self) -> Result<()> {
        let angles = [
            self.inclination,
            self.longitude_ascending_node,
            self.argument_perihelion,
            self.mean_anomaly,
        ];
        if !(self.semi_major_axis.is_finite() && self.semi_major_axis > 0.0) {
            return Err(SimulationError::validation(format!(
                "semi-major axis must be positive, got {}",
                self.semi_major_axis
            )));
        }
        if !(0.0..1.0).contains(&self.eccentricity) {
            return Err(SimulationError::validation(format!(
                "eccentricity must be in [0, 1), got {}",
                self.eccentricity
            )));
        }
        if angles.iter().any(|a| !a.is_finite()) {
            return Err(SimulationError::validation("orbital angles must be finite"));
        }
        Ok(())
    }

    /// Orbital period T = 2π·√(a³/μ) (seconds)
    pub fn period(&self, mu: f64) -> f64 {
        TWO_PI * (self.semi_major_axis.powi(3) / mu).sqrt()
    }

    pub fn rotation(&self) -> RotationMatrix {
        RotationMatrix::perifocal_to_ecliptic(
            self.longitude_ascending_node,
            self.inclination,
            self.argument_perihelion,
        )
    }

    /// Convert orbital elements to a Cartesian state vector at mean anomaly `m`.
    ///
    /// Position uses r = a(1 − e·cos E); velocity is the analytic derivative of
    /// the perifocal position, √(μ/p)·(−sin ν, e + cos ν, 0), rotated like position.
    pub fn state_at(
        &self,
        mean_anomaly: f64,
        mu: f64,
        tolerance: f64,
        max_iterations: u32,
    ) -> OrbitState {
        let a = self.semi_major_axis;
        let e = self.eccentricity;

        let kepler = solve_kepler_equation(mean_anomaly, e, tolerance, max_iterations);
        let true_anomaly = eccentric_to_true_anomaly(kepler.eccentric_anomaly, e);

        // Distance from focus
        let r = a * (1.0 - e * kepler.eccentric_anomaly.cos());

        // Position in orbital plane (perifocal frame)
        let (sin_nu, cos_nu) = true_anomaly.sin_cos();
        let position_pf = Vector3::new(r * cos_nu, r * sin_nu, 0.0);

        // Velocity in orbital plane
        let sqrt_mu_p = (mu / (a * (1.0 - e * e))).sqrt();
        let velocity_pf = Vector3::new(-sqrt_mu_p * sin_nu, sqrt_mu_p * (e + cos_nu), 0.0);

        let rotation = self.rotation();
        OrbitState {
            state: StateVector::new(rotation.apply(&position_pf), rotation.apply(&velocity_pf)),
            true_anomaly,
            converged: kepler.converged,
        }
    }

    /// Recover elements from a Cartesian state (angular momentum, eccentricity
    /// vector and vis-viva energy). The returned mean anomaly is the one at the
    /// instant of `state`.
    ///
    /// Degenerate geometry is resolved by convention: equatorial orbits take
    /// Ω = 0, circular orbits take ω = 0, so angles are never NaN.
    pub fn from_state_vector(state: &StateVector, mu: f64) -> Result<Self> {
        let r_vec = state.position;
        let v_vec = state.velocity;
        let r = r_vec.magnitude();
        if !(r.is_finite() && r > 0.0) || !v_vec.magnitude().is_finite() {
            return Err(SimulationError::validation("state vector must be finite and off-origin"));
        }

        let energy = state.specific_energy(mu);
        if energy >= 0.0 {
            return Err(SimulationError::validation(format!(
                "state is not on a bound orbit (specific energy {:.3e} J/kg)",
                energy
            )));
        }
        let semi_major_axis = -mu / (2.0 * energy);

        // Specific angular momentum
        let h_vec = r_vec.cross(&v_vec);
        let h = h_vec.magnitude();
        if h <= f64::EPSILON * r * v_vec.magnitude() {
            return Err(SimulationError::validation("rectilinear orbit has no orbital plane"));
        }
        let h_hat = h_vec.scale(1.0 / h);
        let inclination = h_hat.z.clamp(-1.0, 1.0).acos();

        // Node line n = k × h
        let node = Vector3::new(-h_vec.y, h_vec.x, 0.0);
        let longitude_ascending_node = if node.magnitude() > 1e-12 * h {
            node.y.atan2(node.x).rem_euclid(TWO_PI)
        } else {
            0.0
        };
        let (sin_o, cos_o) = longitude_ascending_node.sin_cos();
        let n_hat = Vector3::new(cos_o, sin_o, 0.0);
        let m_hat = h_hat.cross(&n_hat);

        // Eccentricity vector e = ((v² − μ/r)·r − (r·v)·v) / μ
        let v2 = v_vec.dot(&v_vec);
        let e_vec = r_vec
            .scale(v2 - mu / r)
            .sub(&v_vec.scale(r_vec.dot(&v_vec)))
            .scale(1.0 / mu);
        let eccentricity = e_vec.magnitude();
        if eccentricity >= 1.0 {
            return Err(SimulationError::validation(format!(
                "eccentricity {} is not elliptical",
                eccentricity
            )));
        }

        // Argument of latitude u = ω + ν
        let argument_latitude = r_vec.dot(&m_hat).atan2(r_vec.dot(&n_hat));
        let argument_perihelion = if eccentricity > 1e-11 {
            e_vec.dot(&m_hat).atan2(e_vec.dot(&n_hat)).rem_euclid(TWO_PI)
        } else {
            0.0
        };
        let true_anomaly = argument_latitude - argument_perihelion;

        let eccentric_anomaly = true_to_eccentric_anomaly(true_anomaly, eccentricity);
        let mean_anomaly = (eccentric_anomaly - eccentricity * eccentric_anomaly.sin())
            .rem_euclid(TWO_PI);

        Ok(OrbitalElements {
            semi_major_axis,
            eccentricity,
            inclination,
            longitude_ascending_node,
            argument_perihelion,
            mean_anomaly,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_elements() -> OrbitalElements {
        OrbitalElements {
            semi_major_axis: 1.458 * AU,
            eccentricity: 0.2227,
            inclination: 10.83_f64.to_radians(),
            longitude_ascending_node: 304.3_f64.to_radians(),
            argument_perihelion: 178.9_f64.to_radians(),
            mean_anomaly: 1.0,
        }
    }

    #[test]
    fn test_kepler_equation_circular() {
        // For circular orbit e=0, E = M
        let sol = solve_kepler_equation(1.0, 0.0, 1e-8, 50);
        assert!((sol.eccentric_anomaly - 1.0).abs() < 1e-10);
        assert!(sol.converged);
        assert_eq!(sol.iterations, 1);
    }

    #[test]
    fn test_kepler_equation_eccentric() {
        let sol = solve_kepler_equation(0.5, 0.5, 1e-12, 50);
        // Verify: E - 0.5*sin(E) should equal 0.5
        let check = sol.eccentric_anomaly - 0.5 * sol.eccentric_anomaly.sin();
        assert!((check - 0.5).abs() < 1e-10);
        assert!(sol.converged);
    }

    #[test]
    fn test_kepler_iteration_cap_is_reported() {
        let sol = solve_kepler_equation(0.3, 0.99, 1e-30, 3);
        assert!(!sol.converged);
        assert_eq!(sol.iterations, 3);
        assert!(sol.eccentric_anomaly.is_finite());
    }

    #[test]
    fn test_anomaly_conversions_invert() {
        for &e in &[0.0, 0.1, 0.6, 0.95] {
            for k in 0..12 {
                let nu = -3.0 + 0.5 * k as f64;
                let ecc = true_to_eccentric_anomaly(nu, e);
                let back = eccentric_to_true_anomaly(ecc, e);
                assert!((back - nu).abs() < 1e-10, "e={} nu={} back={}", e, nu, back);
            }
        }
    }

    #[test]
    fn test_rotation_is_orthonormal() {
        let rot = sample_elements().rotation();
        let p = rot.column(0);
        let q = rot.column(1);
        let w = rot.column(2);
        assert!((p.magnitude() - 1.0).abs() < 1e-12);
        assert!((q.magnitude() - 1.0).abs() < 1e-12);
        assert!(p.dot(&q).abs() < 1e-12);
        let pq = p.cross(&q);
        assert!(pq.sub(&w).magnitude() < 1e-12);
    }

    #[test]
    fn test_rotation_node_line() {
        // With ω = 0, perihelion lies on the ascending node at angle Ω
        let rot = RotationMatrix::perifocal_to_ecliptic(PI / 2.0, 0.3, 0.0);
        let p = rot.apply(&Vector3::new(1.0, 0.0, 0.0));
        assert!(p.x.abs() < 1e-12);
        assert!((p.y - 1.0).abs() < 1e-12);
        assert!(p.z.abs() < 1e-12);
    }

    #[test]
    fn test_period_one_au() {
        let earth_like = OrbitalElements {
            semi_major_axis: AU,
            eccentricity: 0.0167,
            inclination: 0.0,
            longitude_ascending_node: 0.0,
            argument_perihelion: 0.0,
            mean_anomaly: 0.0,
        };
        let days = earth_like.period(MU_SUN) / 86_400.0;
        assert!((days - 365.25).abs() < 0.1, "period {} days", days);
    }

    #[test]
    fn test_state_vis_viva() {
        let elements = sample_elements();
        let orbit = elements.state_at(2.0, MU_SUN, 1e-12, 50);
        let energy = orbit.state.specific_energy(MU_SUN);
        let expected = -MU_SUN / (2.0 * elements.semi_major_axis);
        assert!(((energy - expected) / expected).abs() < 1e-10);
    }

    #[test]
    fn test_state_round_trip() {
        let elements = sample_elements();
        let orbit = elements.state_at(elements.mean_anomaly, MU_SUN, 1e-14, 50);
        let recovered = OrbitalElements::from_state_vector(&orbit.state, MU_SUN).unwrap();

        assert!((recovered.semi_major_axis / elements.semi_major_axis - 1.0).abs() < 1e-10);
        assert!((recovered.eccentricity - elements.eccentricity).abs() < 1e-10);
        assert!((recovered.inclination - elements.inclination).abs() < 1e-10);
        assert!(
            (recovered.longitude_ascending_node - elements.longitude_ascending_node).abs() < 1e-9
        );
        assert!((recovered.argument_perihelion - elements.argument_perihelion).abs() < 1e-9);
        assert!((recovered.mean_anomaly - elements.mean_anomaly).abs() < 1e-9);
    }

    #[test]
    fn test_round_trip_equatorial_circular() {
        let elements = OrbitalElements {
            semi_major_axis: AU,
            eccentricity: 0.0,
            inclination: 0.0,
            longitude_ascending_node: 0.0,
            argument_perihelion: 0.0,
            mean_anomaly: 0.0,
        };
        let orbit = elements.state_at(1.3, MU_SUN, 1e-12, 50);
        let recovered = OrbitalElements::from_state_vector(&orbit.state, MU_SUN).unwrap();
        let again = recovered.state_at(recovered.mean_anomaly, MU_SUN, 1e-12, 50);

        assert!(recovered.inclination.abs() < 1e-12);
        assert!(again.state.position.distance(&orbit.state.position) < 1.0);
        assert!(again.state.velocity.distance(&orbit.state.velocity) < 1e-6);
    }

    #[test]
    fn test_unbound_state_rejected() {
        let r = Vector3::new(AU, 0.0, 0.0);
        let escape = (2.0 * MU_SUN / AU).sqrt();
        let state = StateVector::new(r, Vector3::new(0.0, escape * 1.01, 0.0));
        assert!(matches!(
            OrbitalElements::from_state_vector(&state, MU_SUN),
            Err(SimulationError::Validation(_))
        ));
    }

    #[test]
    fn test_elements_validation() {
        let mut elements = sample_elements();
        assert!(elements.validate().is_ok());
        elements.eccentricity = 1.0;
        assert!(elements.validate().is_err());
        elements.eccentricity = 0.1;
        elements.semi_major_axis = 0.0;
        assert!(elements.validate().is_err());
    }

    #[test]
    fn test_vector3_operations() {
        let v1 = Vector3::new(1.0, 2.0, 3.0);
        let v2 = Vector3::new(4.0, 5.0, 6.0);

        // Addition
        let sum = v1.add(&v2);
        assert!((sum.x - 5.0).abs() < 1e-10);
        assert!((sum.y - 7.0).abs() < 1e-10);
        assert!((sum.z - 9.0).abs() < 1e-10);

        // Dot product
        let dot = v1.dot(&v2);
        assert!((dot - 32.0).abs() < 1e-10);

        // Cross product
        let cross = v1.cross(&v2);
        assert!((cross.x - (-3.0)).abs() < 1e-10);
        assert!((cross.y - 6.0).abs() < 1e-10);
        assert!((cross.z - (-3.0)).abs() < 1e-10);
    }
}
