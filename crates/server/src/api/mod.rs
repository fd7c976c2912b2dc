pub mod catalog;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod playback;
pub mod routes;
pub mod search;

pub use error::ApiError;
pub use routes::create_router;
