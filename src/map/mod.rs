pub mod cursor;
pub mod lookup;
pub mod strong;
pub mod weak;

pub use cursor::CursorState;
pub use lookup::Lookup;
pub use strong::StrongIdentityMap;
pub use weak::{Iter, WeakIdentityMap};
