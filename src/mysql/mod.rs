// MySQL module - the `mysql_async` backend behind the session seam
//
// This module is split into several sub-modules:
// - connection: blocking connection/connector driven by a per-connection runtime
// - params: conversion from middleware values to driver parameters
// - query: conversion from driver rows to middleware rows

pub mod connection;
pub mod params;
pub mod query;

// Re-export the public API
pub use connection::{MysqlConnection, MysqlConnector};
