pub mod analyzer;
pub mod controller;
pub mod fetcher;
pub mod frontier;
pub mod robots;
pub mod scheduler;

// Re-export common types
pub use analyzer::{analyze, PageAnalysis};
pub use controller::Crawler;
pub use fetcher::{FetchedPage, Fetcher};
pub use frontier::Frontier;
pub use robots::RobotsCache;
pub use scheduler::{Rejection, Scheduler};
