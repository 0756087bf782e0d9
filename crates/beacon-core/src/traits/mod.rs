//! Store traits consumed by the dispatcher.

mod delivery_log_store;
mod subscription_store;

pub use delivery_log_store::*;
pub use subscription_store::*;
