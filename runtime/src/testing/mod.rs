//! Test support: an in-memory mock Redfish service and a real-HTTP
//! mock server for transport round-trip tests.

pub mod mock;
pub mod server;
