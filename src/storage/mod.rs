pub mod files;
pub mod sink;

// Re-export common types
pub use files::FileSink;
pub use sink::ContentSink;
