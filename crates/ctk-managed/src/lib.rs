pub mod gcloud;
pub mod poll;

pub use gcloud::*;
