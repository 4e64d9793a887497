pub mod analyze;
pub mod backends;
pub mod catalog;
pub mod inspect;
pub mod runs;
pub mod util;

pub use analyze::*;
pub use backends::*;
pub use catalog::*;
pub use inspect::*;
pub use runs::*;
pub use util::*;
