pub mod debounce;
pub mod quote;
pub mod router;
pub mod service;
pub mod tvl;
