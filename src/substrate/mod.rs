// Dispatch substrates - where delegated work actually goes

pub mod http;
pub mod local;

pub use http::HttpDispatchClient;
pub use local::{AssignedTask, EchoWorker, LocalDispatcher, Worker};
