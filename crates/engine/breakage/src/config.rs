//! Breakage configuration
//!
//! Loaded from TOML. Every field has a default, so partial files are fine:
//!
//! ```toml
//! verbose = true
//! multiplayer = false
//!
//! [fracture]
//! filter_angle_deg = 15.0
//! crumble_effect = "glass_crumble"
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Log a recoverable failure, only when the config asks for it
macro_rules! verbose {
    ($config:expr, $($arg:tt)+) => {
        if $config.verbose {
            tracing::warn!($($arg)+);
        }
    };
}
pub(crate) use verbose;

/// Breakage system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakageConfig {
    /// Log recoverable failures (bad geometry, spurious events, skipped clones)
    pub verbose: bool,
    /// Multiplayer sessions never use client-local particles for debris
    pub multiplayer: bool,
    /// Particle debris alive at once before new debris is skipped
    pub max_debris_particles: u32,
    /// Particle lifetime when the break request does not give one (seconds)
    pub particle_lifetime: f32,
    /// Self-removal timeout for debris entities (seconds, 0 disables)
    pub debris_timeout: f32,
    /// Generated pieces with a smaller bounds volume become particles
    pub min_entity_volume: f32,
    /// Post-step dispatches an out-of-order event may wait for its predecessor
    pub held_event_max_dispatches: u32,
    /// Entity class for spawned fragments
    pub spawn_class: String,
    /// Entity class for lightweight static-scenery proxies
    pub proxy_class: String,
    /// Entity class for replay clones
    pub clone_class: String,
    pub fracture: FractureConfig,
}

impl Default for BreakageConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            multiplayer: false,
            max_debris_particles: 128,
            particle_lifetime: 8.0,
            debris_timeout: 20.0,
            min_entity_volume: 2e-4,
            held_event_max_dispatches: 8,
            spawn_class: "BreakableDebris".to_string(),
            proxy_class: "StaticProxy".to_string(),
            clone_class: "ReplayClone".to_string(),
            fracture: FractureConfig::default(),
        }
    }
}

/// Planar fracture and effect settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FractureConfig {
    /// Chunks with a smaller interior angle are merged into a neighbour
    pub filter_angle_deg: f32,
    /// Blast radius for a zero-impulse break
    pub blast_radius: f32,
    /// Extra radius per unit of explosion impulse
    pub impulse_radius_scale: f32,
    /// Crumble effect used when the material has none
    pub crumble_effect: Option<String>,
    /// Distance between crumble effects along piece outlines
    pub crumble_spacing: f32,
    pub explosion_effect: Option<String>,
    pub deform_effect: Option<String>,
    pub carve_effect: Option<String>,
    pub joint_effect: Option<String>,
}

impl Default for FractureConfig {
    fn default() -> Self {
        Self {
            filter_angle_deg: 20.0,
            blast_radius: 0.25,
            impulse_radius_scale: 0.01,
            crumble_effect: None,
            crumble_spacing: 0.25,
            explosion_effect: None,
            deform_effect: None,
            carve_effect: None,
            joint_effect: None,
        }
    }
}

impl FractureConfig {
    pub fn filter_angle(&self) -> f32 {
        self.filter_angle_deg.to_radians()
    }
}

impl BreakageConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load config from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load config from file, or return default if missing or invalid
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load breakage config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save config to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}
