//! Application services layer.

pub mod accounts;
pub mod error;
pub mod feed;
pub mod pagination;
pub mod posts;
pub mod repos;
pub mod sessions;
pub mod subscriptions;
