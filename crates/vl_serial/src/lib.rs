#![doc = include_str!("../README.md")]

// -----------------------------------------------------------------------------
// Extern Self

// Generated code refers to `vl_serial::...`, derive tests inside this crate
// need the same path to resolve.
extern crate self as vl_serial;

// -----------------------------------------------------------------------------
// Modules

mod error;

pub mod config;
pub mod data;
pub mod event;
pub mod handler;
pub mod info;
pub mod metadata;
pub mod naming;
pub mod serializer;
pub mod visitor;

// -----------------------------------------------------------------------------
// Top-Level exports

pub mod __macro_exports;

pub use error::{Error, Result};
pub use vl_serial_derive as derive;
