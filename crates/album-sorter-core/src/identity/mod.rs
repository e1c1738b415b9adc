//! Album identity: tag-based resolution, alias canonicalization and
//! reconstruction from directory names when tags are missing.

pub mod alias;
pub mod normalize;
pub mod reconstruct;
pub mod remix;
pub mod resolver;

pub use alias::{AliasResolver, AliasWarning};
pub use reconstruct::{reconstruct, Reconstruction, ReconstructionResult};
pub use resolver::resolve_identity;
