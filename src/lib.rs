pub mod auction;
pub mod broadcast;
pub mod clock;
pub mod config;
pub mod handlers;
pub mod pricing;
pub mod purchase;
pub mod query;
pub mod queue;
pub mod scheduler;
pub mod store;
