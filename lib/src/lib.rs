pub mod actions;
pub mod api;
pub mod calls;
pub mod executor;
pub mod gate;
pub mod permissions;
pub mod provisioning;
pub mod signature;
pub mod signer_cache;
pub mod sol;
pub mod types;
pub mod utils;

pub use types::*;
