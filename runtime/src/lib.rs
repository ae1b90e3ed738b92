// Copyright 2026 Periscope Contributors
// SPDX-License-Identifier: Apache-2.0

//! Periscope runtime library — declarative telemetry queries over
//! Redfish resource trees.
//!
//! A query pairs path expressions like `/Chassis[*]/Sensors[*]` with
//! the properties to extract from matching resources; the engine walks
//! the remote tree once, coalescing fetches shared between subqueries,
//! and emits typed, normalized record sets.

#![allow(clippy::new_without_default)]

pub mod query;
pub mod redfish;
pub mod testing;
pub mod time;
