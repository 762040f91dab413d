//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, entry handlers)
//!     → request.rs (request ID)
//!     → routing (tag operation / bypass / render)
//!     → handlers (cache tier chain)
//!     → response.rs (buffered response → client)
//! ```

pub mod date;
pub mod directive;
pub mod headers;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::BufferedResponse;
pub use server::{AppState, HttpServer};
