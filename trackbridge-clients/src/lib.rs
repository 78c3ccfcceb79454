//! Blocking HTTP clients for Jira (REST v3) and Linear (GraphQL).
//!
//! Both implement the capability traits from `trackbridge_core::tracker`.

mod http;
pub mod jira;
pub mod linear;

pub use jira::JiraClient;
pub use linear::LinearClient;
