//! Sony USB vendor/product IDs and class-request constants.

#![deny(static_mut_refs)]

/// Sony Corp. USB vendor ID.
pub const SONY_VENDOR_ID: u16 = 0x054C;

/// Known controller product IDs.
pub mod product_ids {
    /// SIXAXIS / DualShock 3 controller.
    pub const SIXAXIS: u16 = 0x0268;
}

/// HID class request constants for the sixaxis handshake.
pub mod requests {
    /// HID GET_REPORT class request code.
    pub const GET_REPORT: u8 = 0x01;
    /// wValue selecting Feature report 0xF2 (report type 3 in the high byte).
    pub const ENABLE_OPERATIONAL_WVALUE: u16 = 0x03F2;
    /// wLength of the operational-mode feature report.
    pub const ENABLE_OPERATIONAL_LEN: u16 = 17;
}
