pub mod files;
pub mod managed;
pub mod manifest;
pub mod query;
pub mod suffix;

pub use files::*;
pub use managed::*;
pub use manifest::*;
pub use query::*;
pub use suffix::*;
