//! Channel video harvesting: command polling, history crawling, chunked
//! downloads and completion notices.

pub mod classify;
pub mod crawl;
pub mod download;
pub mod model;
pub mod notify;
pub mod pacing;
pub mod platform;
pub mod poller;
pub mod tasks;

#[cfg(test)]
pub mod mock;
