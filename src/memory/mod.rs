//! Agent Memory System
//!
//! Rolling summary and log compaction for long conversations

pub mod summarizer;

pub use summarizer::{CompactionPolicy, ConversationSummarizer, SummaryReport};
