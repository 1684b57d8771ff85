//! LegoCharm provider
//!
//! Reconciles LegoCharm users and their per-domain access grants against the
//! desired state handed over by an infrastructure orchestration host.

pub mod config;
pub mod framework;
pub mod legocharm;
pub mod provider;
pub mod resource;
