//! Raw USB configuration descriptor parsing.
//!
//! The active configuration descriptor is one linear buffer of records,
//! each prefixed with `bLength`/`bDescriptorType`. The walker here scans
//! that buffer once and picks out the HID interface to claim and the
//! interrupt-IN endpoint to poll.

use tracing::debug;

/// Standard descriptor type tags (USB 2.0 §9.4).
pub mod descriptor_types {
    pub const DEVICE: u8 = 0x01;
    pub const CONFIGURATION: u8 = 0x02;
    pub const STRING: u8 = 0x03;
    pub const INTERFACE: u8 = 0x04;
    pub const ENDPOINT: u8 = 0x05;
    /// HID class descriptor, nested between interface and endpoints.
    pub const HID: u8 = 0x21;
}

/// `bInterfaceClass` value for Human Interface Devices.
pub const CLASS_HID: u8 = 0x03;
/// Direction bit of `bEndpointAddress` (set = IN).
pub const ENDPOINT_DIR_IN: u8 = 0x80;
/// Transfer-type bits of `bmAttributes`.
pub const ENDPOINT_TRANSFER_TYPE_MASK: u8 = 0x03;
/// Interrupt transfer type.
pub const TRANSFER_TYPE_INTERRUPT: u8 = 0x03;

/// One raw record within a configuration descriptor buffer.
#[derive(Debug, Clone, Copy)]
pub struct DescriptorRecord<'a> {
    /// `bDescriptorType` tag.
    pub kind: u8,
    /// The whole record, header included.
    pub bytes: &'a [u8],
}

/// Iterator over the records of a configuration descriptor buffer.
///
/// Iteration covers exactly the records whose full extent falls within the
/// configuration's declared `wTotalLength` (clamped to the buffer itself).
/// A record that misreports its length cannot be recovered from; the scan
/// simply stops at the first header that would run past the end.
pub struct DescriptorRecords<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> DescriptorRecords<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        let total = config_total_length(buf)
            .map(usize::from)
            .unwrap_or(buf.len());
        Self {
            buf: &buf[..total.min(buf.len())],
            offset: 0,
        }
    }
}

impl<'a> Iterator for DescriptorRecords<'a> {
    type Item = DescriptorRecord<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let header = self.buf.get(self.offset..self.offset + 2)?;
        let len = usize::from(header[0]);
        if len < 2 {
            // Malformed record; a zero length would never advance.
            return None;
        }
        let bytes = self.buf.get(self.offset..self.offset + len)?;
        self.offset += len;
        Some(DescriptorRecord {
            kind: header[1],
            bytes,
        })
    }
}

/// `wTotalLength` of a configuration descriptor buffer, if the header is
/// present and carries the configuration type tag.
pub fn config_total_length(buf: &[u8]) -> Option<u16> {
    if buf.len() >= 4 && buf[1] == descriptor_types::CONFIGURATION {
        Some(u16::from_le_bytes([buf[2], buf[3]]))
    } else {
        None
    }
}

/// The fields of an interface descriptor this driver cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    pub number: u8,
    pub alternate_setting: u8,
    pub class: u8,
}

impl InterfaceDescriptor {
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 9 || bytes[1] != descriptor_types::INTERFACE {
            return None;
        }
        Some(Self {
            number: bytes[2],
            alternate_setting: bytes[3],
            class: bytes[5],
        })
    }
}

/// The fields of an endpoint descriptor this driver cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub address: u8,
    pub attributes: u8,
    pub max_packet_size: u16,
}

impl EndpointDescriptor {
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 7 || bytes[1] != descriptor_types::ENDPOINT {
            return None;
        }
        Some(Self {
            address: bytes[2],
            attributes: bytes[3],
            max_packet_size: u16::from_le_bytes([bytes[4], bytes[5]]),
        })
    }

    pub fn is_in(&self) -> bool {
        self.address & ENDPOINT_DIR_IN != 0
    }

    pub fn is_interrupt(&self) -> bool {
        self.attributes & ENDPOINT_TRANSFER_TYPE_MASK == TRANSFER_TYPE_INTERRUPT
    }
}

/// Scan result: the interface to claim and the endpoint to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerEndpoints {
    pub interface_number: u8,
    pub alternate_setting: u8,
    pub endpoint_address: u8,
    pub max_packet_size: u16,
}

/// Walk `config` for the HID interface to claim and the interrupt-IN
/// endpoint to poll.
///
/// Selection is first-match-wins for the interface and last-match-wins for
/// the endpoint, in scan order. The endpoint is accepted even when it sits
/// under a different interface than the claimed one; first interrupt-IN
/// under the claimed interface would be the conventional pick, but the
/// shipped controller path behaves this way and the tests pin it.
pub fn find_controller_endpoints(config: &[u8]) -> Option<ControllerEndpoints> {
    let mut interface: Option<(u8, u8)> = None;
    let mut endpoint: Option<(u8, u16)> = None;

    for record in DescriptorRecords::new(config) {
        match record.kind {
            descriptor_types::INTERFACE => {
                if let Some(intf) = InterfaceDescriptor::parse(record.bytes) {
                    if intf.class == CLASS_HID && interface.is_none() {
                        debug!(
                            number = intf.number,
                            alternate = intf.alternate_setting,
                            "found HID interface"
                        );
                        interface = Some((intf.number, intf.alternate_setting));
                    }
                }
            }
            descriptor_types::ENDPOINT => {
                if let Some(ep) = EndpointDescriptor::parse(record.bytes) {
                    if ep.is_in() && ep.is_interrupt() {
                        debug!(
                            address = ep.address,
                            max_packet = ep.max_packet_size,
                            "found interrupt-IN endpoint"
                        );
                        endpoint = Some((ep.address, ep.max_packet_size));
                    }
                }
            }
            _ => {}
        }
    }

    let (interface_number, alternate_setting) = interface?;
    let (endpoint_address, max_packet_size) = endpoint?;
    Some(ControllerEndpoints {
        interface_number,
        alternate_setting,
        endpoint_address,
        max_packet_size,
    })
}
