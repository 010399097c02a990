pub mod ethers_provider;
pub mod memory;
pub mod provider;

pub use provider::{ChainError, ChainStateProvider};
