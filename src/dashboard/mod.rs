pub mod handler;
pub mod notice;
pub mod query;
pub mod session;
