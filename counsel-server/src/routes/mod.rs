//! Route handlers, one module per endpoint group.

pub mod advice;
pub mod categorize;
pub mod chat;
pub mod examples;
pub mod summarization;
