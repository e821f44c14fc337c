//! Route search, lane geometry, route state and the controller keeping routes valid.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use controller::RouteController;
pub use path::Path;
pub use route::{Route, RouteColor};

mod controller;
mod geometry;
mod path;
mod route;
mod search;

/// Unique ID of a [Route], allocated in creation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RouteId(u16);

impl RouteId {
    /// Gets the numeric value of the ID.
    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
