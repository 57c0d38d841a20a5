//! The operational-mode handshake request.

#![deny(static_mut_refs)]

use openpad_usb_host::{SetupPacket, request_type};

use crate::ids::requests;

/// Build the GET_REPORT(Feature 0xF2) setup packet that switches the pad
/// into the reporting mode its interrupt endpoint uses.
///
/// Without this read the SIXAXIS stays silent over USB; the Linux hid-sony
/// driver carries the same quirk.
pub fn operational_mode_request(interface: u8) -> SetupPacket {
    SetupPacket {
        request_type: request_type::DIR_IN
            | request_type::TYPE_CLASS
            | request_type::RECIP_INTERFACE,
        request: requests::GET_REPORT,
        value: requests::ENABLE_OPERATIONAL_WVALUE,
        index: u16::from(interface),
        length: requests::ENABLE_OPERATIONAL_LEN,
    }
}
