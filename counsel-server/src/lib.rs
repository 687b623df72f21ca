pub mod error;
pub mod http;
pub mod request_log;
pub mod routes;

pub use error::ApiError;
pub use http::{build_router, start_http_server, HttpState};
pub use request_log::{PgRequestLogStore, RequestLogStore};
