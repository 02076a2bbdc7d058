pub mod arguments;
pub mod descriptor;
pub mod error;
pub mod vocab;

pub use arguments::{unwind, ArgumentCombination, ResolvedArguments};
pub use descriptor::{
    ArgumentBinding, ArgumentDescriptor, Capability, DescriptorSource, ServiceDescriptor,
};
pub use error::{DescriptorError, GatewayError};

pub type GatewayResult<T> = Result<T, GatewayError>;
