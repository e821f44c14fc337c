//! Tunable parameters of the routing core.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parameters shared by the world grid, the road graph and the route controller.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct RoutingConfig {
    /// The side length of one world cell, in world units.
    pub cell_size: f64,
    /// Half the side length of the square world centred on the origin.
    pub world_half_extent: f64,
    /// The number of ticks between two consecutive route sweeps.
    pub sweep_interval: u32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            cell_size: 1.0,
            world_half_extent: 200.0,
            sweep_interval: 30,
        }
    }
}

#[cfg(feature = "serde")]
impl RoutingConfig {
    /// Parses a configuration from JSON. Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// The attributes of a vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct VehicleAttributes {
    /// The travel speed in world units per second.
    pub move_speed: f64,
    /// The heading interpolation rate, per second.
    pub rotate_speed: f64,
    /// How long the vehicle stops at either end of its route, in seconds.
    pub stop_time: f64,
}

impl Default for VehicleAttributes {
    fn default() -> Self {
        Self {
            move_speed: 1.0,
            rotate_speed: 7.5,
            stop_time: 2.0,
        }
    }
}
