pub mod conversation;
pub mod request_log;
pub mod summary;

pub use conversation::{format_example_history, history_to_messages, ChatMessage, ExampleHistoryEntry, Role};
pub use request_log::{NewRequestLog, RequestLog};
pub use summary::SummarizationResponse;
