pub mod config;
pub mod db;
pub mod demo;
pub mod domain;
pub mod error;
pub mod filter;
pub mod lifecycle;
pub mod observe;
pub mod pager;
pub mod policy;
pub mod predicate;
pub mod query;
pub mod sort;
pub mod stats;
pub mod store;

pub use query::{IncidentPage, ListParams, QueryEngine, SearchParams};
