//! USB host transport abstraction for the OpenPad driver stack.
//!
//! The driver core never talks to a concrete USB library directly; it goes
//! through the [`UsbHostBus`] trait defined here. A scriptable in-memory bus
//! lives in [`transport::mock`] and a libusb-backed implementation is
//! available behind the `rusb` feature.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod descriptor;
pub mod transport;

#[cfg(feature = "rusb")]
pub mod rusb_backend;

pub use descriptor::*;
pub use transport::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Host transport not initialized")]
    NotInitialized,

    #[error("Failed to open device at address {0}")]
    OpenFailed(u8),

    #[error("Unknown or stale device handle")]
    UnknownHandle,

    #[error("Descriptor request failed: {0}")]
    DescriptorError(String),

    #[error("Failed to claim interface {0}")]
    ClaimFailed(u8),

    #[error("Failed to release interface {0}")]
    ReleaseFailed(u8),

    #[error("Control transfer failed: {0}")]
    ControlError(String),

    #[error("Interrupt transfer failed: {0}")]
    TransferError(String),

    #[error("Device disconnected")]
    Disconnected,
}

pub type TransportResult<T> = Result<T, TransportError>;
