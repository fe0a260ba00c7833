//! Status producers, one per [`StatusDomain`](crate::status::StatusDomain).

pub mod command;
pub mod resources;
pub mod service;
pub mod tasks;

pub use command::{CommandOutput, run_with_timeout};
pub use resources::ResourceProducer;
pub use service::ServiceProducer;
pub use tasks::TaskProducer;
