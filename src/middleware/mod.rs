pub mod auth;
pub mod timing;

pub use auth::{bearer_token, require_auth};
pub use timing::{timing_middleware, RequestTimer, UNMATCHED_PATH};
