pub mod broadcaster;
pub mod completion;
pub mod connection;
pub mod coordinator;
pub mod direct;
pub mod error;
pub mod files;
pub mod messages;
pub mod registry;
pub mod search;
pub mod uploads;

pub use coordinator::{Coordinator, CoordinatorHandle, CoordinatorSettings, Repositories};
pub use error::GatewayError;
