//! definition of the general mapping error type

use core::fmt;
use std::sync::Arc;
use crate::sdo::Object;

/**
    general object reporting a failure in the process-data mapping pipeline

    Its variants are meant to help finding which stage of the setup is responsible for the problem and how to deal with it.

    Every variant except the ones produced during field resolution is fatal to the session being set up: there is no partial-setup recovery, the caller shall abort and report. Field resolution never raises this type at all, out-of-range fields are carried as invalid in [crate::fields::ResolvedField] instead.
*/
#[derive(Clone, Debug)]
pub enum MappingError {
    /// a declared configuration field is missing or malformed
    ///
    /// these errors are raised before any device is touched
    Config(String),

    /// error caused by communication support (config file loading, ...)
    Io(Arc<std::io::Error>),

    /// the external master primitive rejected an operation or failed on its own
    Link(&'static str),

    /// an object read did not complete within its polling budget
    ///
    /// the object can generally be read again once the device mailbox is responsive
    Timeout(Object),

    /// the device replied to an object read with a width outside the accepted set
    SizeMismatch {
        object: Object,
        size: usize,
    },

    /// an assignment object declared no PDO at all
    NoAssignment(Object),

    /// a PDO mapping object declared no entry
    EmptyMapping(u16),

    /// an assignment object declared more PDOs than supported
    ///
    /// the count is reported as-is, it is never clamped to the supported maximum
    CapacityExceeded {
        object: Object,
        count: u8,
        max: usize,
    },

    /// storage for the registration list could not be obtained
    ResourceExhausted(&'static str),

    /// the external registration primitive rejected the submitted entry list
    Registration(&'static str),

    /// the external activation primitive failed or returned an inconsistent offset collection
    Activation(&'static str),
}

/// convenient alias to simplify return annotations
pub type MappingResult<T=()> = core::result::Result<T, MappingError>;

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(message) => write!(f, "config: {}", message),
            Self::Io(error) => write!(f, "io: {}", error),
            Self::Link(message) => write!(f, "link: {}", message),
            Self::Timeout(object) => write!(f, "timeout reading {:?}", object),
            Self::SizeMismatch{object, size} =>
                write!(f, "unexpected reply size {} for {:?}", size, object),
            Self::NoAssignment(object) =>
                write!(f, "assignment {:?} declares no PDO", object),
            Self::EmptyMapping(index) =>
                write!(f, "mapping 0x{:04x} declares no entry", index),
            Self::CapacityExceeded{object, count, max} =>
                write!(f, "assignment {:?} declares {} PDOs, at most {} are supported", object, count, max),
            Self::ResourceExhausted(what) => write!(f, "cannot allocate {}", what),
            Self::Registration(message) => write!(f, "registration: {}", message),
            Self::Activation(message) => write!(f, "activation: {}", message),
        }
    }
}

impl std::error::Error for MappingError {}

impl From<std::io::Error> for MappingError {
    fn from(src: std::io::Error) -> Self {
        MappingError::Io(Arc::new(src))
    }
}
