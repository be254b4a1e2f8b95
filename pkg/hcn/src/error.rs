use thiserror::Error;

/// Kind of host object an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Network,
    Endpoint,
    LoadBalancer,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectKind::Network => write!(f, "network"),
            ObjectKind::Endpoint => write!(f, "endpoint"),
            ObjectKind::LoadBalancer => write!(f, "load balancer"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{kind} {key} not found")]
    NotFound { kind: ObjectKind, key: String },

    /// Any other host-side failure: connectivity, validation, conflicts.
    #[error("host network API error: {0}")]
    Api(String),

    #[error("invalid input: {0}")]
    Invalid(String),
}

impl Error {
    pub fn not_found(kind: ObjectKind, key: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            key: key.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = Error::not_found(ObjectKind::LoadBalancer, "LB-1");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "load balancer LB-1 not found");
        assert!(!Error::Api("timeout".to_string()).is_not_found());
    }
}
