pub mod admission;
pub mod auth;
pub mod configuration;
pub mod deadline;
pub mod directory;
pub mod domain;
pub mod error;
pub mod startup;
pub mod store;
pub mod telemetry;
