//! Configuration module for Lete.
//!
//! A single immutable [`Settings`] value is constructed once at process start
//! and passed explicitly to each component.

mod settings;

pub use settings::{
    CaptioningSettings, ChunkingSettings, EmbeddingSettings, GeneralSettings, JobStoreSettings,
    QuerySettings, QueueSettings, RetrySettings, Settings, TranscriptionSettings,
    VectorStoreSettings,
};
