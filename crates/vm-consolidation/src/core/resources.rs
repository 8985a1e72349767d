//! Resource vector arithmetic.

use serde::Serialize;

/// Result of comparing two resource vectors.
///
/// Resource vectors are only partially ordered: `Less` and `Equal` require the
/// relation to hold componentwise, every other combination (including
/// incomparable vectors) is reported as `Greater`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceOrder {
    Less,
    Equal,
    Greater,
}

/// Amount of computing resources: CPU cores, per-core processing rate and memory.
///
/// The derived total processing capacity is `cores * core_rate`, so a vector
/// with zero cores always has zero processing capacity.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct ResourceVector {
    pub cores: f64,
    pub core_rate: f64,
    pub memory: u64,
}

impl ResourceVector {
    /// Creates a resource vector with the given components.
    /// Zero cores force zero per-core rate to keep total processing consistent.
    pub fn new(cores: f64, core_rate: f64, memory: u64) -> Self {
        let core_rate = if cores == 0. { 0. } else { core_rate };
        Self {
            cores,
            core_rate,
            memory,
        }
    }

    /// The empty vector.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Total processing capacity of the vector.
    pub fn total_processing(&self) -> f64 {
        self.cores * self.core_rate
    }

    /// Sum of two vectors. Cores, memory and total processing are additive;
    /// the per-core rate of the result is derived from the summed processing,
    /// so aggregating heterogeneous VMs never loses capacity.
    pub fn add(&self, other: &ResourceVector) -> ResourceVector {
        let cores = self.cores + other.cores;
        let total = self.total_processing() + other.total_processing();
        let core_rate = if cores == 0. { 0. } else { total / cores };
        ResourceVector::new(cores, core_rate, self.memory + other.memory)
    }

    /// Difference of two vectors, clamped at zero, with the same
    /// additive-processing semantics as [`add`](Self::add).
    pub fn subtract(&self, other: &ResourceVector) -> ResourceVector {
        let cores = (self.cores - other.cores).max(0.);
        let total = (self.total_processing() - other.total_processing()).max(0.);
        let core_rate = if cores == 0. { 0. } else { total / cores };
        ResourceVector::new(cores, core_rate, self.memory.saturating_sub(other.memory))
    }

    /// Partial-order comparison, see [`ResourceOrder`].
    pub fn compare(&self, other: &ResourceVector) -> ResourceOrder {
        if self.cores == other.cores && self.core_rate == other.core_rate && self.memory == other.memory {
            return ResourceOrder::Equal;
        }
        if self.cores <= other.cores && self.core_rate <= other.core_rate && self.memory <= other.memory {
            return ResourceOrder::Less;
        }
        ResourceOrder::Greater
    }

    /// Whether this vector fits within `other` componentwise.
    pub fn fits_into(&self, other: &ResourceVector) -> bool {
        self.compare(other) != ResourceOrder::Greater
    }

    /// Whether consumed processing or memory exceeds the given share of `total`.
    pub fn exceeds_share(&self, total: &ResourceVector, share: f64) -> bool {
        self.total_processing() > share * total.total_processing()
            || self.memory as f64 > share * total.memory as f64
    }

    /// Whether both consumed processing and memory are below the given share of `total`.
    pub fn below_share(&self, total: &ResourceVector, share: f64) -> bool {
        self.total_processing() < share * total.total_processing()
            && (self.memory as f64) < share * total.memory as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_cores_mean_zero_processing() {
        let r = ResourceVector::new(0., 1000., 64);
        assert_eq!(r.total_processing(), 0.);
        assert_eq!(r.core_rate, 0.);
    }

    #[test]
    fn compare_is_partial() {
        let a = ResourceVector::new(2., 1000., 8);
        let b = ResourceVector::new(4., 1000., 16);
        let c = ResourceVector::new(1., 1000., 32);
        assert_eq!(a.compare(&b), ResourceOrder::Less);
        assert_eq!(b.compare(&a), ResourceOrder::Greater);
        assert_eq!(a.compare(&a), ResourceOrder::Equal);
        // incomparable vectors are reported as greater in both directions
        assert_eq!(a.compare(&c), ResourceOrder::Greater);
        assert_eq!(c.compare(&a), ResourceOrder::Greater);
    }

    #[test]
    fn subtract_clamps_at_zero() {
        let a = ResourceVector::new(2., 1000., 8);
        let b = ResourceVector::new(4., 1000., 16);
        let d = a.subtract(&b);
        assert_eq!(d.cores, 0.);
        assert_eq!(d.total_processing(), 0.);
        assert_eq!(d.memory, 0);
    }

    #[test]
    fn add_preserves_total_processing() {
        let a = ResourceVector::new(2., 2000., 8);
        let b = ResourceVector::new(6., 1000., 16);
        let sum = a.add(&b);
        assert_eq!(sum.cores, 8.);
        assert_eq!(sum.total_processing(), 10000.);
        assert_eq!(sum.memory, 24);
        let back = sum.subtract(&b);
        assert_eq!(back.total_processing(), a.total_processing());
        assert_eq!(back.memory, a.memory);
    }

    #[test]
    fn threshold_shares() {
        let total = ResourceVector::new(10., 1000., 100);
        let consumed = ResourceVector::new(8., 1000., 20);
        assert!(consumed.exceeds_share(&total, 0.75));
        assert!(!consumed.exceeds_share(&total, 0.85));
        assert!(!consumed.below_share(&total, 0.3));
        let light = ResourceVector::new(1., 1000., 20);
        assert!(light.below_share(&total, 0.3));
    }
}
