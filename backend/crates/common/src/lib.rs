pub mod error;

pub use error::{HubsyncError, HubsyncResult};
