//! screenshare-probe library crate.
//!
//! The capture lifecycle (controller, hosts, status persistence) and the
//! terminal presentation are exposed here for the binary and for
//! integration testing.

pub mod app;
pub mod capture;
pub mod cli;
pub mod config;
pub mod controller;
pub mod preview;
pub mod status;
pub mod store;
pub mod view;

pub use controller::{CaptureController, SessionEvent, SessionId, SessionSnapshot};
pub use status::{CaptureMetadata, CaptureStatus, DisplaySurface};
