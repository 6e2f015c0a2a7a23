pub mod delivery;
pub mod due;
pub mod filter;
pub mod render;
mod sweep;

pub use delivery::{deliver_articles, deliver_unsent, DeliveryReport};
pub use sweep::{Scheduler, SchedulerState, SweepReport};
