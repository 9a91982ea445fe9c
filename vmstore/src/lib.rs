//! EduVMStore - catalog service for versioned, approvable VM templates
//!
//! This library provides the template lifecycle engine, the role-based
//! access policy and the REST API of the catalog server.

pub mod access;
pub mod api;
pub mod entity;
pub mod error;
pub mod favorites;
pub mod identity;
pub mod naming;
pub mod templates;
pub mod users;
