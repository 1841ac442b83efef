//! # precom-core
//!
//! Core types, ID prefixes, and error types for Precom.
//!
//! This crate provides the foundational types shared across all Precom crates:
//! - Entity structs for welding joints, master data, backups, and run logs
//! - Status enums with state machine transitions (backup, sync log, pipeline run)
//! - The `Lifecycle` tag shared by every soft-deletable entity
//! - NDT method and result-code vocabulary
//! - ID prefix constants
//! - Cross-cutting error types

pub mod entities;
pub mod enums;
pub mod errors;
pub mod ids;
pub mod lifecycle;
pub mod ndt;
