//! SIXAXIS / DualShock 3 HID protocol: wire constants, the operational-mode
//! handshake, and input report parsing.
//!
//! This crate is intentionally I/O-free and allocation-free on hot paths.
//! It provides pure functions and types that can be tested without hardware.

#![deny(static_mut_refs)]

pub mod ids;
pub mod input;
pub mod setup;

pub use ids::{SONY_VENDOR_ID, product_ids, requests};
pub use input::{
    Buttons, DpadPressure, FacePressure, MIN_REPORT_LEN, ShoulderPressure, SixaxisReport, Stick,
    parse_input_report,
};
pub use setup::operational_mode_request;
