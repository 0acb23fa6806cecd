pub mod conditions;
pub mod error;
pub mod ids;
pub mod lifecycle;
pub mod model;
pub mod output;
pub mod steps;

pub use conditions::*;
pub use error::*;
pub use ids::*;
pub use lifecycle::*;
pub use model::*;
pub use output::*;
pub use steps::*;
