//! Multi-objective fitness of an infrastructure snapshot.

use std::fmt::{Display, Formatter};

use serde::Serialize;

/// Fraction below which one total overload value is considered strictly better
/// than another. The 1% tolerance avoids chasing noise near the threshold.
const OVERLOAD_TOLERANCE: f64 = 0.99;

/// Score of a snapshot: total overload of all active PMs, number of active PMs
/// and number of VM migrations relative to the initial mapping.
///
/// The order is not total: overload dominates with a 1% tolerance, ties are
/// broken by the active PM count and then by the migration count.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Fitness {
    pub total_overload: f64,
    pub active_pms: u32,
    pub migrations: u32,
}

impl Fitness {
    pub fn new(total_overload: f64, active_pms: u32, migrations: u32) -> Self {
        Self {
            total_overload,
            active_pms,
            migrations,
        }
    }

    /// Domination-style comparison used by all search strategies.
    pub fn better_than(&self, other: &Fitness) -> bool {
        if self.total_overload < OVERLOAD_TOLERANCE * other.total_overload {
            return true;
        }
        if other.total_overload < OVERLOAD_TOLERANCE * self.total_overload {
            return false;
        }
        if self.active_pms != other.active_pms {
            return self.active_pms < other.active_pms;
        }
        self.migrations < other.migrations
    }
}

impl Display for Fitness {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "overload = {:.4}, active PMs = {}, migrations = {}",
            self.total_overload, self.active_pms, self.migrations
        )
    }
}
