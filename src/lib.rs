//! Character customization and asset baking.
//!
//! A pre-built rigged character is appended into a [`Scene`](scene::Scene) from the asset library
//! ([`library::spawn_character`]), tweaked through the parameter model in [`customizer`],
//! optionally texture-baked per mesh ([`texture_bake::bake_textures`]) and finally frozen into a
//! standalone rig/mesh/material hierarchy ([`hierarchy::bake_hierarchy`]).
//!
//! The scene is an explicit value passed into every pipeline. Services that only the host
//! application can provide (procedural modifier evaluation, rendering) are reached through the
//! traits in [`host`].

pub mod config;
pub mod customizer;
pub mod hierarchy;
pub mod host;
pub mod library;
pub mod lookup;
pub mod math;
pub mod naming;
pub mod scene;
pub mod texture_bake;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{AssetLocator, Config};
pub use scene::Scene;
