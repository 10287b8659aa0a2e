// State Manager - thread-safe result cache
// Results are keyed on the full scenario tuple and never mutated once stored.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::api_client::{AsteroidCatalog, ElevationService};
use crate::deflection::DeflectionDirection;
use crate::simulation::{SimulationOrchestrator, SimulationRequest, SimulationResult};

/// Exact bit patterns of the request values; `-0.0` and `0.0` share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScenarioKey {
    asteroid_id: String,
    impact_lat: u64,
    impact_lon: u64,
    delta_v: u64,
    direction: DeflectionDirection,
    t_deflect: u64,
}

fn bits(value: f64) -> u64 {
    (value + 0.0).to_bits()
}

impl From<&SimulationRequest> for ScenarioKey {
    fn from(request: &SimulationRequest) -> Self {
        Self {
            asteroid_id: request.asteroid_id.trim().to_ascii_lowercase(),
            impact_lat: bits(request.impact_lat),
            impact_lon: bits(request.impact_lon),
            delta_v: bits(request.mitigation_delta_v),
            direction: request.deflection_direction,
            t_deflect: bits(request.deflection_time),
        }
    }
}

#[derive(Default)]
pub struct ResultCache {
    results: RwLock<HashMap<ScenarioKey, Arc<SimulationResult>>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ScenarioKey) -> Option<Arc<SimulationResult>> {
        self.results.read().get(key).cloned()
    }

    /// First writer wins; an existing entry is returned untouched.
    pub fn insert(&self, key: ScenarioKey, result: SimulationResult) -> Arc<SimulationResult> {
        self.results
            .write()
            .entry(key)
            .or_insert_with(|| Arc::new(result))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.results.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.read().is_empty()
    }
}

/// Orchestrator front that memoizes successful results.
pub struct CachedSimulator<C, E> {
    orchestrator: SimulationOrchestrator<C, E>,
    cache: Arc<ResultCache>,
    enabled: bool,
}

impl<C: AsteroidCatalog, E: ElevationService> CachedSimulator<C, E> {
    pub fn new(orchestrator: SimulationOrchestrator<C, E>, enabled: bool) -> Self {
        Self {
            orchestrator,
            cache: Arc::new(ResultCache::new()),
            enabled,
        }
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// Failures are not cached: an upstream outage must not stick.
    pub async fn simulate(&self, request: &SimulationRequest) -> Arc<SimulationResult> {
        if !self.enabled {
            return Arc::new(self.orchestrator.simulate(request).await);
        }

        let key = ScenarioKey::from(request);
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(asteroid = %request.asteroid_id, "result cache hit");
            return hit;
        }

        let result = self.orchestrator.simulate(request).await;
        if result.success {
            self.cache.insert(key, result)
        } else {
            Arc::new(result)
        }
    }
}
