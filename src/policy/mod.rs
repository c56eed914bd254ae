pub mod purge;
pub mod trigger;

pub use trigger::trigger_fires;
