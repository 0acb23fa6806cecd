pub mod command;
mod group;
pub mod scripted;
pub mod stream;
pub mod system;

pub use command::*;
pub use scripted::{Reply, ScriptedRunner};
pub use stream::*;
pub use system::*;
