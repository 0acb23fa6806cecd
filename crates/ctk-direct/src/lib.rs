pub mod kubectl;
pub mod watch;

pub use kubectl::*;
