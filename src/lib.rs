//! Overhead - proximity tracker for aircraft and amateur balloons
//!
//! Polls OpenSky Network or SondeHub Amateur around a saved observer
//! location, follows every object the provider reports, and keeps a
//! per-location history of closest approaches.

pub mod domain;
pub mod export;
pub mod geo;
pub mod history_repo;
mod json_file;
pub mod locations;
pub mod locations_repo;
pub mod logging;
pub mod poller;
pub mod position;
pub mod providers;
pub mod proximity_tracker;
pub mod session_repo;
pub mod settings;
pub mod stats;

pub use domain::TrackerDomain;
pub use locations::ObserverLocation;
pub use position::PositionReport;
pub use proximity_tracker::{DisplayBundle, ProximityTracker};
