//! FlowSync Core - Domain logic and sync invariants
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Workflow`, `WorkflowRecord`, `Connection`, `SyncHistoryEntry`
//! - **Canonical hasher** - deterministic content fingerprints used for change detection
//! - **Port definitions** - Traits for adapters: `IWorkflowGateway`, `IRecordStore`, `IBlobStore`
//! - **Configuration** - YAML-backed settings shared by the engine and the CLI
//!
//! # Architecture
//!
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement
//! (`flowsync-cache` for local persistence, `flowsync-remote` for the
//! remote workflow service).

pub mod config;
pub mod domain;
pub mod hasher;
pub mod ports;
