//! Utility types for trait definitions.
use std::{fmt, time::Instant};

/// Type to handle FMM related errors
#[derive(Debug)]
pub enum FmmError {
    /// A configuration parameter is outside its valid range, or a kernel
    /// name is not recognised. Raised during precomputation.
    InvalidConfig(String),

    /// An input buffer has the wrong length for the geometry it is paired
    /// with, e.g. a charge vector that doesn't match the source count.
    ShapeMismatch {
        /// Length implied by the geometry
        expected: usize,
        /// Length actually supplied
        found: usize,
    },

    /// A check-to-equivalent operator has no non-zero singular values, which
    /// happens when all surface points are degenerate.
    NumericallySingular,

    /// Failure reported by a kernel evaluation, fatal to the in-flight call.
    Kernel(String),
}

impl fmt::Display for FmmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FmmError::InvalidConfig(e) => write!(f, "Invalid configuration: {e}"),
            FmmError::ShapeMismatch { expected, found } => {
                write!(f, "Shape mismatch: expected length {expected}, found {found}")
            }
            FmmError::NumericallySingular => {
                write!(f, "Check-to-equivalent operator is numerically singular")
            }
            FmmError::Kernel(e) => write!(f, "Kernel error: {e}"),
        }
    }
}

impl std::error::Error for FmmError {}

/// Enumeration of operator types for timing
#[derive(Debug, Clone, Copy)]
pub enum OperatorType {
    /// particle to multipole
    P2M,

    /// multipole to multipole (height)
    M2M(usize),

    /// multipole to local
    M2L,

    /// particle to local
    P2L,

    /// local to local (depth)
    L2L(usize),

    /// local to particle
    L2P,

    /// multipole to particle
    M2P,

    /// particle to particle
    P2P,
}

/// Wall clock time attributed to a single operator application
#[derive(Debug, Clone, Copy)]
pub struct OperatorTime {
    /// Operator name
    pub operator: OperatorType,

    /// Time in microseconds
    pub time: u64,
}

impl OperatorTime {
    /// Constructor
    pub fn new(operator: OperatorType, time: u64) -> Self {
        Self { operator, time }
    }

    /// Constructor from instant
    pub fn from_instant(operator: OperatorType, time: Instant) -> Self {
        let time = time.elapsed().as_micros() as u64;
        Self { operator, time }
    }
}

impl fmt::Display for OperatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorType::P2M => write!(f, "P2M"),
            OperatorType::M2M(height) => write!(f, "M2M({height})"),
            OperatorType::M2L => write!(f, "M2L"),
            OperatorType::P2L => write!(f, "P2L"),
            OperatorType::L2L(depth) => write!(f, "L2L({depth})"),
            OperatorType::L2P => write!(f, "L2P"),
            OperatorType::M2P => write!(f, "M2P"),
            OperatorType::P2P => write!(f, "P2P"),
        }
    }
}

impl fmt::Display for OperatorTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Operator: {}, Time: {} us", self.operator, self.time)
    }
}
