pub mod bus;
pub mod payload;

pub use bus::{EventBus, EventError, Subscription, global};
pub use payload::{Event, Payload};
