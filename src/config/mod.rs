// src/config/mod.rs

//! Plan file loading and resolution.
//!
//! - [`model`] defines the TOML-backed data model.
//! - [`loader`] reads a plan file from disk.
//! - [`validate`] turns a [`RawPlanFile`] into a checked [`PlanFile`].
//! - [`registry`] binds item names to tasks and resolves a plan into
//!   [`DependencyEntry`](crate::dag::DependencyEntry)s.

pub mod loader;
pub mod model;
pub mod registry;
pub mod validate;

pub use loader::{default_plan_path, load_and_validate, load_from_path, parse_plan};
pub use model::{ItemConfig, PlanFile, PlanSection, RawPlanFile};
pub use registry::TaskRegistry;
