//! Luz y Verdad Server
//!
//! Membership, records and treasury backend for a masonic lodge.

pub mod api;
pub mod auth;
pub mod communications;
pub mod config;
pub mod db;
pub mod email;
pub mod library;
pub mod members;
pub mod notify;
pub mod permissions;
pub mod rituals;
pub mod system;
pub mod treasury;
pub mod util;
