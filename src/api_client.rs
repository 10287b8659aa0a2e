// External collaborators - asteroid catalog and terrain elevation
// JPL Small-Body Database for orbits, USGS EPQS / Open-Meteo for elevation.

use serde::Deserialize;
use std::collections::HashMap;
use std::f64::consts::PI;
use std::future::Future;

use crate::config::ServiceConfig;
use crate::error::{Result, SimulationError};
use crate::impact::PhysicalProfile;
use crate::physics_engine::{OrbitalElements, AU};

const USER_AGENT: &str = "AstroGuard/1.0 (education)";

/// Geometric albedo assumed when sizing an object from its absolute magnitude
const DEFAULT_ALBEDO: f64 = 0.14;

/// EPQS answers this sentinel outside its coverage
const USGS_NO_DATA: f64 = -1_000_000.0;

// =============================================================================
// COLLABORATOR CONTRACTS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    pub elements: OrbitalElements,
    pub profile: PhysicalProfile,
}

pub trait AsteroidCatalog: Send + Sync {
    /// Orbit and physical profile for a designation; `NotFound` if unknown.
    fn get_orbital_elements(
        &self,
        asteroid_id: &str,
    ) -> impl Future<Output = Result<CatalogEntry>> + Send;
}

pub trait ElevationService: Send + Sync {
    /// Signed surface elevation in meters.
    fn get_elevation(&self, lat: f64, lon: f64) -> impl Future<Output = Result<f64>> + Send;
}

fn http_client(config: &ServiceConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.http_timeout())
        .user_agent(USER_AGENT)
        .build()
        .map_err(SimulationError::from)
}

fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

// =============================================================================
// SBDB RESPONSE TYPES
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SbdbResponse {
    pub object: Option<SbdbObject>,
    pub orbit: Option<SbdbOrbit>,
    pub phys_par: Option<Vec<SbdbField>>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SbdbObject {
    pub fullname: Option<String>,
    pub des: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SbdbOrbit {
    pub elements: Vec<SbdbField>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SbdbField {
    pub name: String,
    pub value: Option<String>,
}

fn field(fields: &[SbdbField], name: &str) -> Option<f64> {
    fields
        .iter()
        .find(|f| f.name == name)
        .and_then(|f| f.value.as_deref())
        .and_then(parse_number)
}

/// D(km) = 1329 / √p · 10^(−H/5)
fn diameter_from_magnitude(absolute_magnitude: f64, albedo: f64) -> f64 {
    1329.0 / albedo.sqrt() * 10f64.powf(-absolute_magnitude / 5.0)
}

impl SbdbResponse {
    /// Convert an SBDB payload to our internal format (AU → m, deg → rad).
    pub fn to_entry(&self, asteroid_id: &str, default_velocity_km_s: f64) -> Result<CatalogEntry> {
        let object = self.object.as_ref();
        let orbit = match (object, self.orbit.as_ref()) {
            (Some(_), Some(orbit)) => orbit,
            _ => {
                return Err(SimulationError::NotFound(
                    self.message
                        .clone()
                        .unwrap_or_else(|| asteroid_id.to_string()),
                ))
            }
        };

        let element = |name: &str| {
            field(&orbit.elements, name).ok_or_else(|| {
                SimulationError::upstream(format!("SBDB orbit for {} lacks '{}'", asteroid_id, name))
            })
        };
        let degrees = |name: &str| element(name).map(|deg| deg * PI / 180.0);

        let elements = OrbitalElements {
            semi_major_axis: element("a")? * AU, // Convert to meters
            eccentricity: element("e")?,
            inclination: degrees("i")?,
            longitude_ascending_node: degrees("om")?,
            argument_perihelion: degrees("w")?,
            mean_anomaly: degrees("ma")?,
        };

        let phys = self.phys_par.as_deref().unwrap_or_default();
        let diameter_km = field(phys, "diameter")
            .or_else(|| field(phys, "H").map(|h| diameter_from_magnitude(h, DEFAULT_ALBEDO)))
            .ok_or_else(|| {
                SimulationError::upstream(format!("SBDB entry {} has no size estimate", asteroid_id))
            })?;
        // SBDB density is g/cm³
        let density_kg_m3 = field(phys, "density").map(|rho| rho * 1000.0);

        let name = object
            .and_then(|o| o.fullname.clone().or_else(|| o.des.clone()))
            .map(|n| n.trim().to_string())
            .unwrap_or_else(|| asteroid_id.to_string());

        Ok(CatalogEntry {
            id: asteroid_id.to_string(),
            name,
            elements,
            profile: PhysicalProfile::new(diameter_km, default_velocity_km_s, density_kg_m3),
        })
    }
}

// =============================================================================
// SBDB CLIENT
// =============================================================================

pub struct SbdbClient {
    base_url: String,
    default_velocity_km_s: f64,
    client: reqwest::Client,
}

impl SbdbClient {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.sbdb_url.clone(),
            default_velocity_km_s: config.default_velocity_km_s,
            client: http_client(config)?,
        })
    }
}

impl AsteroidCatalog for SbdbClient {
    async fn get_orbital_elements(&self, asteroid_id: &str) -> Result<CatalogEntry> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("sstr", asteroid_id), ("phys-par", "1")])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SimulationError::NotFound(asteroid_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(SimulationError::upstream(format!(
                "SBDB returned status: {}",
                response.status()
            )));
        }

        let data: SbdbResponse = response
            .json()
            .await
            .map_err(|e| SimulationError::upstream(format!("Failed to parse SBDB response: {}", e)))?;

        data.to_entry(asteroid_id, self.default_velocity_km_s)
    }
}

// =============================================================================
// IN-MEMORY CATALOG
// =============================================================================

/// Catalog backed by a map; lookups ignore case and surrounding whitespace.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: HashMap<String, CatalogEntry>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: CatalogEntry) {
        self.entries.insert(Self::key(&entry.id), entry);
    }

    pub fn with_entry(mut self, entry: CatalogEntry) -> Self {
        self.insert(entry);
        self
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn key(id: &str) -> String {
        id.trim().to_ascii_lowercase()
    }

    /// A few well-characterized near-Earth asteroids for offline runs.
    pub fn well_known() -> Self {
        // id, name, a (AU), e, [i, Ω, ω, M] (deg), diameter (km), velocity (km/s), density
        let table: [(&str, &str, f64, f64, [f64; 4], f64, f64, f64); 4] = [
            ("99942", "99942 Apophis (2004 MN4)", 0.9224, 0.1911, [3.339, 203.96, 126.60, 142.9], 0.34, 12.6, 3200.0),
            ("101955", "101955 Bennu (1999 RQ36)", 1.1260, 0.2037, [6.035, 2.061, 66.22, 101.7], 0.49, 12.7, 1190.0),
            ("65803", "65803 Didymos (1996 GT)", 1.6427, 0.3839, [3.408, 73.20, 319.3, 98.3], 0.78, 15.0, 2170.0),
            ("433", "433 Eros (A898 PA)", 1.4579, 0.2227, [10.83, 304.3, 178.9, 271.1], 16.84, 20.0, 2670.0),
        ];

        let mut catalog = Self::new();
        for (id, name, a_au, e, angles_deg, d_km, v, rho) in table {
            let [i, om, w, ma] = angles_deg.map(f64::to_radians);
            catalog.insert(CatalogEntry {
                id: id.to_string(),
                name: name.to_string(),
                elements: OrbitalElements {
                    semi_major_axis: a_au * AU,
                    eccentricity: e,
                    inclination: i,
                    longitude_ascending_node: om,
                    argument_perihelion: w,
                    mean_anomaly: ma,
                },
                profile: PhysicalProfile::new(d_km, v, Some(rho)),
            });
        }
        catalog
    }
}

impl AsteroidCatalog for StaticCatalog {
    async fn get_orbital_elements(&self, asteroid_id: &str) -> Result<CatalogEntry> {
        self.entries
            .get(&Self::key(asteroid_id))
            .cloned()
            .ok_or_else(|| SimulationError::NotFound(asteroid_id.to_string()))
    }
}

// =============================================================================
// ELEVATION CLIENTS
// =============================================================================

pub struct UsgsElevationClient {
    base_url: String,
    client: reqwest::Client,
}

impl UsgsElevationClient {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.usgs_elevation_url.clone(),
            client: http_client(config)?,
        })
    }
}

/// EPQS has answered both `{"value": ...}` and the older nested
/// `USGS_Elevation_Point_Query_Service.Elevation_Query.Elevation` shape.
pub fn parse_usgs_elevation(body: &serde_json::Value) -> Result<f64> {
    let raw = body.get("value").or_else(|| {
        body.get("USGS_Elevation_Point_Query_Service")
            .and_then(|s| s.get("Elevation_Query"))
            .and_then(|q| q.get("Elevation"))
    });
    let elevation = match raw {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => parse_number(s),
        _ => None,
    }
    .ok_or_else(|| SimulationError::upstream("USGS response has no elevation"))?;

    if elevation <= USGS_NO_DATA {
        return Err(SimulationError::upstream("USGS has no data for this location"));
    }
    Ok(elevation)
}

impl ElevationService for UsgsElevationClient {
    async fn get_elevation(&self, lat: f64, lon: f64) -> Result<f64> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("x", lon.to_string()),
                ("y", lat.to_string()),
                ("units", "Meters".to_string()),
                ("wkid", "4326".to_string()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SimulationError::upstream(format!(
                "USGS returned status: {}",
                response.status()
            )));
        }
        let body: serde_json::Value = response.json().await?;
        parse_usgs_elevation(&body)
    }
}

pub struct OpenMeteoElevationClient {
    base_url: String,
    client: reqwest::Client,
}

impl OpenMeteoElevationClient {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.open_meteo_elevation_url.clone(),
            client: http_client(config)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    elevation: Option<Vec<f64>>,
}

impl ElevationService for OpenMeteoElevationClient {
    async fn get_elevation(&self, lat: f64, lon: f64) -> Result<f64> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("latitude", lat), ("longitude", lon)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SimulationError::upstream(format!(
                "Open-Meteo returned status: {}",
                response.status()
            )));
        }
        let data: OpenMeteoResponse = response.json().await?;
        data.elevation
            .and_then(|values| values.first().copied())
            .ok_or_else(|| SimulationError::upstream("Open-Meteo response has no elevation"))
    }
}

/// Ask `primary` first and `secondary` only if it fails.
pub struct FallbackElevation<P, S> {
    primary: P,
    secondary: S,
}

impl<P, S> FallbackElevation<P, S> {
    pub fn new(primary: P, secondary: S) -> Self {
        Self { primary, secondary }
    }
}

impl<P: ElevationService, S: ElevationService> ElevationService for FallbackElevation<P, S> {
    async fn get_elevation(&self, lat: f64, lon: f64) -> Result<f64> {
        match self.primary.get_elevation(lat, lon).await {
            Ok(elevation) => Ok(elevation),
            Err(err) => {
                tracing::debug!(%err, "primary elevation source failed, trying fallback");
                self.secondary.get_elevation(lat, lon).await
            }
        }
    }
}

/// Constant elevation, for offline runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedElevation(pub f64);

impl ElevationService for FixedElevation {
    async fn get_elevation(&self, _lat: f64, _lon: f64) -> Result<f64> {
        Ok(self.0)
    }
}

/// USGS with Open-Meteo fallback, the production terrain source.
pub fn default_elevation_service(
    config: &ServiceConfig,
) -> Result<FallbackElevation<UsgsElevationClient, OpenMeteoElevationClient>> {
    Ok(FallbackElevation::new(
        UsgsElevationClient::new(config)?,
        OpenMeteoElevationClient::new(config)?,
    ))
}
