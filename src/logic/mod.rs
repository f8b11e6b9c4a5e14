pub mod admin;
pub mod app_support;
pub mod availability;
pub mod clock;
pub mod deletion;
pub mod errors;
pub mod gate;
pub mod redirect;
pub mod traversal;
pub mod url;

pub use app_support::*;
pub use availability::*;
pub use clock::*;
pub use errors::*;
pub use gate::*;
pub use redirect::*;
pub use traversal::*;
pub use url::*;
