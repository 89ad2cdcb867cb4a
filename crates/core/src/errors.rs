use thiserror::Error;

use crate::domain::product::ProductId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("cannot compare an empty embedding vector")]
    EmptyVector,
    #[error("embedding dimension mismatch: {left} != {right}")]
    DimensionMismatch { left: usize, right: usize },
    #[error("product {product_id} has no {field}")]
    MissingEmbedding { product_id: ProductId, field: &'static str },
    #[error("no complementary categories are mapped for sub-category `{sub_category}`")]
    NoCandidates { sub_category: String },
    #[error("no remaining candidate can fill slot `{slot}`")]
    SlotUnfillable { slot: String },
    #[error("spending range for `{category}` has max below avg")]
    InvalidSpendRange { category: String },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// Whether the background task should be retried by its caller.
    ///
    /// `NotFound` is retryable because a product row can land after its
    /// processing task was enqueued.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Integration(_) | Self::NotFound(_))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "The requested product or shopper does not exist.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(_) => {
                Self::BadRequest { message: "domain validation failed".to_owned(), correlation_id }
            }
            ApplicationError::NotFound(message) => Self::NotFound { message, correlation_id },
            ApplicationError::Persistence(message) | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::product::ProductId;
    use crate::errors::{ApplicationError, DomainError, InterfaceError};

    #[test]
    fn domain_error_maps_to_bad_request_interface_error() {
        let interface = ApplicationError::from(DomainError::MissingEmbedding {
            product_id: ProductId::nil(),
            field: "complementary_embedding",
        })
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn missing_product_maps_to_not_found() {
        let interface =
            ApplicationError::NotFound("product 42".to_owned()).into_interface("req-2");

        assert!(matches!(interface, InterfaceError::NotFound { .. }));
        assert_eq!(interface.correlation_id(), "req-2");
    }

    #[test]
    fn integration_error_maps_to_service_unavailable_and_is_retryable() {
        let error = ApplicationError::Integration("embedding endpoint timed out".to_owned());
        assert!(error.is_retryable());

        let interface = error.into_interface("req-3");
        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(
            interface.user_message(),
            "The service is temporarily unavailable. Please retry shortly."
        );
    }

    #[test]
    fn domain_and_configuration_errors_are_not_retryable() {
        assert!(!ApplicationError::from(DomainError::EmptyVector).is_retryable());
        assert!(!ApplicationError::Configuration("bad weights".to_owned()).is_retryable());
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface =
            ApplicationError::Configuration("invalid tiers".to_owned()).into_interface("req-4");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
