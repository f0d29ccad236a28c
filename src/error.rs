//! Error types for the solver.
//!
//! Construction-time validation returns [`PhysicsError`]; stepping a world never fails.

use std::fmt;

/// Main error type for world construction, spawning and snapshot loading.
#[derive(Debug)]
pub enum PhysicsError {
    /// A physical or configuration parameter is outside its valid range.
    InvalidParameter { field: &'static str, value: f64 },
    /// Static geometry that has no well-defined projection.
    DegenerateGeometry(&'static str),
    /// An entity name or handle that is not present in the world.
    UnknownEntity(String),
    /// A body name or handle that is not present in the world.
    UnknownBody(String),
    /// A distance constraint from an entity to itself.
    SelfConstraint(String),
    /// A name that is already taken by another object of the same kind.
    DuplicateName(String),
    /// Malformed snapshot contents.
    Snapshot(String),
    /// Snapshot JSON could not be encoded or decoded.
    Json(serde_json::Error),
}

impl fmt::Display for PhysicsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidParameter { field, value } => {
                write!(f, "Invalid parameter: {field} = {value}")
            }
            Self::DegenerateGeometry(msg) => write!(f, "Degenerate geometry: {msg}"),
            Self::UnknownEntity(name) => write!(f, "Unknown entity: {name}"),
            Self::UnknownBody(name) => write!(f, "Unknown body: {name}"),
            Self::SelfConstraint(name) => write!(f, "Cannot connect entity {name} to itself"),
            Self::DuplicateName(name) => write!(f, "Duplicate name: {name}"),
            Self::Snapshot(msg) => write!(f, "Snapshot error: {msg}"),
            Self::Json(err) => write!(f, "JSON error: {err}"),
        }
    }
}

impl std::error::Error for PhysicsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

/// Convenient Result type alias for fallible solver operations.
pub type Result<T> = std::result::Result<T, PhysicsError>;

impl From<serde_json::Error> for PhysicsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

/// Rejects `value` unless it is finite and `check` holds.
pub(crate) fn ensure(field: &'static str, value: f64, check: impl FnOnce(f64) -> bool) -> Result<()> {
    if value.is_finite() && check(value) {
        Ok(())
    } else {
        Err(PhysicsError::InvalidParameter { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_rejects_nan_even_when_check_passes() {
        assert!(ensure("mass", 1.0, |v| v >= 0.0).is_ok());
        assert!(ensure("mass", -1.0, |v| v >= 0.0).is_err());
        assert!(ensure("mass", f64::NAN, |_| true).is_err());
        assert!(ensure("mass", f64::INFINITY, |_| true).is_err());
    }

    #[test]
    fn display_names_the_field() {
        let err = PhysicsError::InvalidParameter {
            field: "stiffness",
            value: 1.5,
        };
        assert_eq!(err.to_string(), "Invalid parameter: stiffness = 1.5");
    }
}
