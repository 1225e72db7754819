pub mod context;
pub mod hub;

pub use context::ConnectionContext;
pub use hub::ClientHub;
