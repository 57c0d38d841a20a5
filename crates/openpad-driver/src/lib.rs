//! Host-side SIXAXIS controller driver.
//!
//! [`ControllerDriver`] owns a [`UsbHostBus`](openpad_usb_host::UsbHostBus)
//! implementation and advances a fixed enumeration sequence one phase per
//! tick: open → device info → device descriptor → config descriptor →
//! claim → prepare. Once ready it re-arms an interrupt-IN read every tick
//! and exposes the latest decoded report. Detach tears everything down and
//! returns the driver to idle, where a fresh attach starts over.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod driver;
pub mod phase;

pub use driver::ControllerDriver;
pub use phase::Phase;

use openpad_usb_host::TransportError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("No usable HID interface or interrupt-IN endpoint in the active configuration")]
    NoControllerEndpoint,

    #[error("Driver state inconsistent: {0}")]
    InvalidState(&'static str),
}

pub type DriverResult<T> = Result<T, DriverError>;
