pub mod key;
pub mod types;

pub use key::{InstanceKey, KeyError};
pub use types::{InstanceRecord, StateCollection};
