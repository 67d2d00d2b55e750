pub mod handlers;
pub mod input;
pub mod lookup;
pub mod metadata;
pub mod metrics;
pub mod redis;
pub mod registry;
pub mod result;
pub mod store;
pub mod timestamp;
