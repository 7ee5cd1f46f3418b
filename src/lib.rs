//! A polite, concurrent web crawler.
//!
//! A [`crawler::Crawler`] walks a site from a start address with a fixed pool of workers,
//! honouring robots.txt and robots META tags, and hands every indexable page to a
//! [`storage::ContentSink`].

pub mod cli;
pub mod crawler;
pub mod error;
pub mod storage;
pub mod utils;
