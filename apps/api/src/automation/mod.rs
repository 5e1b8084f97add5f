// Automation runs: the run engine, daily schedule computation and the shared
// publish-and-record step used by both the engine and the due-post sweep.

pub mod delivery;
pub mod engine;
pub mod schedule;

pub use engine::{AutomationEngine, EngineConfig};
