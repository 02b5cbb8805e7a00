//! Identity handling.
//!
//! The identity provider is an external collaborator: it issues signed bearer
//! tokens whose subject becomes the document owner id. Demo mode replaces it
//! with a cookie login against built-in users.

pub mod config;
pub mod demo_auth;
pub mod jwt;
pub mod middleware;
pub mod models;
