mod tracing;

pub use self::tracing::{init, init_with_level};
