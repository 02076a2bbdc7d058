use std::error::Error;

/// The error raised while answering a request to the gateway.
///
/// Lower layers (cache, API invoker, translator) never produce a client-facing error on their
/// own: they either return data or degrade to an empty result. Only the execution pipeline and
/// the composition engine map a condition to one of these variants.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// A request parameter is missing or malformed.
    #[error("Erroneous request: {0}")]
    BadRequest(String),
    /// The HTTP method is not supported by the endpoint.
    #[error("Unsupported HTTP method {0}")]
    MethodNotAllowed(String),
    /// An upstream authentication or processing step failed in a way the caller has to fix.
    #[error("Invalid request: {0}")]
    UpstreamAuthentication(String),
    /// Some triple patterns of the query cannot be answered by any registered service.
    #[error("Some triple patterns could not be matched with any service: {}", .patterns.join(", "))]
    CompositionUnmatched {
        /// The unmatched patterns in SPARQL syntax.
        patterns: Vec<String>,
    },
    /// The graph store is unreachable or rejected an operation.
    #[error("Graph store failure: {0}")]
    UpstreamFatal(#[source] Box<dyn Error + Send + Sync + 'static>),
    /// A configuration value or internal invariant is violated.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Builds a [GatewayError::UpstreamFatal] from any error.
    pub fn upstream_fatal(error: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        Self::UpstreamFatal(error.into())
    }

    /// The HTTP status code that corresponds to this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::MethodNotAllowed(_) => 405,
            Self::UpstreamAuthentication(_) | Self::CompositionUnmatched { .. } => 422,
            Self::UpstreamFatal(_) | Self::Internal(_) => 500,
        }
    }

    /// A short diagnostic text that can be returned to the client.
    ///
    /// Upstream payloads are never part of it as they may contain credentials.
    pub fn public_message(&self) -> String {
        match self {
            Self::UpstreamFatal(_) => {
                "Internal error: the graph store could not process the request.".to_owned()
            }
            Self::CompositionUnmatched { .. } => {
                "Invalid request: some triple patterns could not be matched with any service."
                    .to_owned()
            }
            _ => self.to_string(),
        }
    }
}

/// An error raised while reading or validating a service descriptor.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DescriptorError {
    /// The template refers to a placeholder that no argument declares.
    #[error("Placeholder {{{placeholder}}} of service '{service}' has no declared argument")]
    UndeclaredPlaceholder {
        /// The service name.
        service: String,
        /// The placeholder name.
        placeholder: String,
    },
    /// Two arguments share the same name.
    #[error("Argument '{argument}' of service '{service}' is declared twice")]
    DuplicateArgument {
        /// The service name.
        service: String,
        /// The argument name.
        argument: String,
    },
    /// An argument has neither or both of a predicate and a shape.
    #[error("Argument '{argument}' of service '{service}' must have exactly one of a predicate or a shape")]
    InvalidBinding {
        /// The service name.
        service: String,
        /// The argument name.
        argument: String,
    },
    /// The service name is not a valid path-like name.
    #[error("Invalid service name '{0}'")]
    InvalidName(String),
    /// Any other problem with the description.
    #[error("Invalid description of service '{service}': {message}")]
    Invalid {
        /// The service name.
        service: String,
        /// What is wrong.
        message: String,
    },
}

impl From<DescriptorError> for GatewayError {
    fn from(error: DescriptorError) -> Self {
        match error {
            DescriptorError::InvalidName(_) => Self::BadRequest(error.to_string()),
            _ => Self::Internal(error.to_string()),
        }
    }
}
