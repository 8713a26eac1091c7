//! Courier wires the store, the delivery pipeline and the HTTP boundary
//! together into one process.

pub mod controller;
