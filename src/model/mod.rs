pub mod app_version;
pub mod common;
pub mod endpoint;
pub mod graph;
pub mod validators;
pub mod version;

pub use app_version::*;
pub use common::*;
pub use endpoint::*;
pub use graph::*;
pub use version::*;
