// AstroGuard - asteroid impact consequence and deflection engine
// Library entry point: one scenario per call, pure and stateless apart from the optional cache.

pub mod api_client;
pub mod config;
pub mod deflection;
pub mod error;
pub mod impact;
pub mod physics_engine;
pub mod propagator;
pub mod simulation;
pub mod state_manager;

pub use api_client::{
    default_elevation_service, AsteroidCatalog, CatalogEntry, ElevationService, FallbackElevation,
    FixedElevation, OpenMeteoElevationClient, SbdbClient, StaticCatalog, UsgsElevationClient,
};
pub use config::{EngineConfig, OrbitConfig, PhysicsConfig, ServiceConfig};
pub use deflection::{CloseApproach, DeflectionDirection, DeflectionModel, DeflectionOutcome, Impulse};
pub use error::{Result, SimulationError};
pub use impact::{ImpactEffects, ImpactPhysicsCalculator, PhysicalProfile, TargetType};
pub use physics_engine::{OrbitalElements, StateVector, Vector3, AU, MU_SUN};
pub use propagator::{OrbitPropagator, Trajectory, TrajectorySample};
pub use simulation::{
    ImpactReport, ImpactScenario, SimulationOrchestrator, SimulationRequest, SimulationResult,
};
pub use state_manager::{CachedSimulator, ResultCache, ScenarioKey};
