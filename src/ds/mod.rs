pub mod ordered;
pub mod popularity;

pub use ordered::OrderedMap;
pub use popularity::{solve_decay_rate, PopularityTracker};
