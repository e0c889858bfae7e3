pub mod gemini;
pub(crate) mod http_errors;
pub mod service;
mod transport;

pub use gemini::GeminiGateway;
pub use service::ServiceGateway;
