pub mod api;
pub mod config;
pub mod normalize;
pub mod parser;
pub mod pipeline;
pub mod rate_limit;
pub mod reconcile;
pub mod report;
pub mod schema;
pub mod writer;
