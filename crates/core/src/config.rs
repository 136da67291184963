//! Per-element options and scheduler configuration
//!
//! Both are plain serde structs that can be read from TOML. Malformed
//! option values fall back to their defaults instead of failing: checking
//! against a plain viewport is better than breaking a render path.

use crate::error::SchedulerError;
use crate::geometry::{resolve_offsets, OffsetProps, Offsets};
use crate::handle::{Container, NodeId};
use crate::policy::{GroupingPolicy, TimingPolicy};
use anyhow::{Context, Result};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// Options recognized for a single watched element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LazyLoadOptions {
    /// Scroll container (default: viewport)
    #[serde(default, deserialize_with = "lenient_node")]
    pub container: Option<NodeId>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub offset: f64,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub offset_vertical: f64,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub offset_horizontal: f64,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub offset_top: f64,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub offset_bottom: f64,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub offset_left: f64,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub offset_right: f64,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub threshold: f64,

    /// Rate-limit interval in ms (default: 250, <= 0 disables)
    #[serde(default = "default_throttle", deserialize_with = "lenient_throttle")]
    pub throttle: i64,

    /// Debounce instead of throttle when limiting (default: true)
    #[serde(default = "default_true", deserialize_with = "lenient_debounce")]
    pub debounce: bool,
}

impl Default for LazyLoadOptions {
    fn default() -> Self {
        Self {
            container: None,
            offset: 0.0,
            offset_vertical: 0.0,
            offset_horizontal: 0.0,
            offset_top: 0.0,
            offset_bottom: 0.0,
            offset_left: 0.0,
            offset_right: 0.0,
            threshold: 0.0,
            throttle: default_throttle(),
            debounce: true,
        }
    }
}

impl LazyLoadOptions {
    /// Parse options from a TOML document
    pub fn from_toml_str(input: &str) -> std::result::Result<Self, SchedulerError> {
        toml::from_str(input).map_err(|e| SchedulerError::Config(e.to_string()))
    }

    /// Resolved scroll container
    pub fn container(&self) -> Container {
        Container::from(self.container)
    }

    /// Legacy offset props as given
    pub fn offset_props(&self) -> OffsetProps {
        OffsetProps {
            offset: self.offset,
            offset_vertical: self.offset_vertical,
            offset_horizontal: self.offset_horizontal,
            offset_top: self.offset_top,
            offset_bottom: self.offset_bottom,
            offset_left: self.offset_left,
            offset_right: self.offset_right,
            threshold: self.threshold,
        }
    }

    /// Resolved four-sided offsets
    pub fn offsets(&self) -> Offsets {
        resolve_offsets(&self.offset_props())
    }

    /// Resolved timing policy
    pub fn timing_policy(&self) -> TimingPolicy {
        TimingPolicy::from_options(self.throttle, self.debounce)
    }
}

/// Scheduler-wide configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Listener grouping (default: by_container_and_policy)
    #[serde(default)]
    pub grouping: GroupingPolicy,
}

impl SchedulerConfig {
    /// Parse configuration from a TOML document
    pub fn from_toml_str(input: &str) -> std::result::Result<Self, SchedulerError> {
        toml::from_str(input).map_err(|e| SchedulerError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}

fn default_throttle() -> i64 {
    250
}

fn default_true() -> bool {
    true
}

/// Any TOML value; anything not understood is discarded
#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient {
    Int(i64),
    Float(f64),
    Bool(bool),
    Other(IgnoredAny),
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    Ok(match Lenient::deserialize(deserializer)? {
        Lenient::Int(v) => v as f64,
        Lenient::Float(v) if v.is_finite() => v,
        _ => 0.0,
    })
}

fn lenient_throttle<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
    Ok(match Lenient::deserialize(deserializer)? {
        Lenient::Int(v) => v,
        Lenient::Float(v) if v.is_finite() => v as i64,
        _ => default_throttle(),
    })
}

fn lenient_debounce<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    Ok(match Lenient::deserialize(deserializer)? {
        Lenient::Bool(v) => v,
        _ => default_true(),
    })
}

fn lenient_node<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<NodeId>, D::Error> {
    Ok(match Lenient::deserialize(deserializer)? {
        Lenient::Int(v) if v >= 0 => Some(NodeId(v as u64)),
        _ => None,
    })
}
