//! Chain state module.
//!
//! The facade in this module is the only owner of chain state. Validation is delegated to a
//! collaborator behind the `ChainCollaborator` trait; `LightChain` is the in-process collaborator
//! the binary runs with.

/// Facade over the chain-state collaborator
pub mod facade;
/// In-process header-linking collaborator
pub mod light;
/// Network, snapshot and error types
pub mod types;

pub use facade::{ChainCollaborator, ChainStateFacade, SharedChain};
pub use light::LightChain;
pub use types::*;
