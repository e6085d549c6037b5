pub mod core;
pub mod error;

pub use crate::core::ProviderRegistry;

pub use error::DispatchError;
pub use error::Error;
pub use error::ProviderError;
pub use error::ProviderErrorKind;
