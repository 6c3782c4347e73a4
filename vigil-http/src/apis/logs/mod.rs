pub mod handler;

pub use handler::{handle_history, handle_stream, HistoryResponse};
