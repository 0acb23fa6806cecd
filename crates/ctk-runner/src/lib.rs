pub mod assert;
pub mod cluster;
pub mod config;
pub mod controller;
pub mod doctor;
pub mod expect;
pub mod harness;
pub mod scope;

pub use assert::*;
pub use cluster::*;
pub use config::*;
pub use controller::*;
pub use doctor::*;
pub use expect::*;
pub use harness::*;
pub use scope::*;
