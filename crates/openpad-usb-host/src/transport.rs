//! The host-transport seam the driver core depends on.

use std::time::Duration;

use crate::TransportResult;

/// Opaque handle to an opened device, issued by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(u32);

impl DeviceHandle {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// Bus speed of a connected device. Diagnostics only; no control-flow
/// decision depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceSpeed {
    Low,
    Full,
    High,
}

impl std::fmt::Display for DeviceSpeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceSpeed::Low => write!(f, "Low"),
            DeviceSpeed::Full => write!(f, "Full"),
            DeviceSpeed::High => write!(f, "High"),
        }
    }
}

/// The subset of the device descriptor surfaced for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub vendor_id: u16,
    pub product_id: u16,
    pub device_class: u8,
    pub max_packet_size_0: u8,
}

/// Control-plane notifications from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    /// A device appeared on the bus.
    Attached { address: u8 },
    /// A tracked device left the bus.
    Detached { address: u8 },
    /// A notification this driver does not understand; logged and ignored.
    Unknown(u8),
}

/// `bmRequestType` bit constants.
pub mod request_type {
    pub const DIR_IN: u8 = 0x80;
    pub const TYPE_CLASS: u8 = 0x20;
    pub const RECIP_INTERFACE: u8 = 0x01;
}

/// An endpoint-0 setup packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupPacket {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

/// Capability the driver core depends on: device enumeration at the bus
/// level, transfer submission/completion and event delivery.
///
/// All methods take `&mut self`: the driver invokes the bus from a single
/// tick context and backends must not call back into the driver. Bounded
/// waits that expire without data are `Ok`/`None`, never errors.
pub trait UsbHostBus {
    /// Prepare the backend and register for device notifications.
    fn initialize(&mut self) -> TransportResult<()> {
        Ok(())
    }

    fn open_device(&mut self, address: u8) -> TransportResult<DeviceHandle>;

    fn device_info(&mut self, device: DeviceHandle) -> TransportResult<DeviceSpeed>;

    fn device_descriptor(&mut self, device: DeviceHandle) -> TransportResult<DeviceDescriptor>;

    /// Raw active configuration descriptor bytes, `wTotalLength` included.
    fn active_config_descriptor(&mut self, device: DeviceHandle) -> TransportResult<Vec<u8>>;

    fn claim_interface(
        &mut self,
        device: DeviceHandle,
        number: u8,
        alternate_setting: u8,
    ) -> TransportResult<()>;

    fn release_interface(&mut self, device: DeviceHandle, number: u8) -> TransportResult<()>;

    fn close_device(&mut self, device: DeviceHandle) -> TransportResult<()>;

    /// Synchronous IN control transfer on endpoint 0.
    fn control_in(
        &mut self,
        device: DeviceHandle,
        setup: &SetupPacket,
        buf: &mut [u8],
    ) -> TransportResult<usize>;

    /// Arm one interrupt-IN read. Fire and forget; the completion is
    /// delivered through [`UsbHostBus::service_transfers`].
    fn submit_interrupt_in(
        &mut self,
        device: DeviceHandle,
        endpoint: u8,
        len: usize,
    ) -> TransportResult<()>;

    /// Pump transfer completions for at most `timeout`. A completed
    /// interrupt read is copied into `sink` in place (latest wins) and its
    /// length returned.
    fn service_transfers(
        &mut self,
        timeout: Duration,
        sink: &mut [u8],
    ) -> TransportResult<Option<usize>>;

    /// Next attach/detach notification, waiting at most `timeout`.
    fn next_device_event(&mut self, timeout: Duration) -> Option<BusEvent>;
}

pub mod mock {
    use std::collections::VecDeque;
    use std::time::Duration;

    use super::{BusEvent, DeviceDescriptor, DeviceHandle, DeviceSpeed, SetupPacket, UsbHostBus};
    use crate::{TransportError, TransportResult};

    /// Scriptable in-memory bus for driver tests and simulated sessions.
    ///
    /// Descriptors, events and interrupt reports are queued up front;
    /// failure switches make individual transport calls fail; call
    /// histories allow assertions on what the driver did.
    pub struct MockHostBus {
        events: VecDeque<BusEvent>,
        config_descriptor: Vec<u8>,
        device_descriptor: DeviceDescriptor,
        speed: DeviceSpeed,
        control_response: Vec<u8>,
        interrupt_reports: VecDeque<Vec<u8>>,
        in_flight: Option<Vec<u8>>,
        next_handle: u32,
        open: Option<(u8, DeviceHandle)>,
        fail_open: bool,
        fail_claim: bool,
        fail_control: bool,
        claims: Vec<(u8, u8)>,
        releases: Vec<u8>,
        closes: u32,
        control_requests: Vec<SetupPacket>,
        submitted_reads: Vec<(u8, usize)>,
    }

    impl MockHostBus {
        pub fn new() -> Self {
            Self {
                events: VecDeque::new(),
                config_descriptor: Vec::new(),
                device_descriptor: DeviceDescriptor::default(),
                speed: DeviceSpeed::Full,
                control_response: Vec::new(),
                interrupt_reports: VecDeque::new(),
                in_flight: None,
                next_handle: 1,
                open: None,
                fail_open: false,
                fail_claim: false,
                fail_control: false,
                claims: Vec::new(),
                releases: Vec::new(),
                closes: 0,
                control_requests: Vec::new(),
                submitted_reads: Vec::new(),
            }
        }

        pub fn set_config_descriptor(&mut self, bytes: Vec<u8>) {
            self.config_descriptor = bytes;
        }

        pub fn set_device_descriptor(&mut self, descriptor: DeviceDescriptor) {
            self.device_descriptor = descriptor;
        }

        pub fn set_speed(&mut self, speed: DeviceSpeed) {
            self.speed = speed;
        }

        pub fn set_control_response(&mut self, bytes: Vec<u8>) {
            self.control_response = bytes;
        }

        pub fn set_fail_open(&mut self, fail: bool) {
            self.fail_open = fail;
        }

        pub fn set_fail_claim(&mut self, fail: bool) {
            self.fail_claim = fail;
        }

        pub fn set_fail_control(&mut self, fail: bool) {
            self.fail_control = fail;
        }

        pub fn push_event(&mut self, event: BusEvent) {
            self.events.push_back(event);
        }

        /// Queue one interrupt report; delivered on the next armed read.
        pub fn queue_report(&mut self, bytes: Vec<u8>) {
            self.interrupt_reports.push_back(bytes);
        }

        pub fn is_open(&self) -> bool {
            self.open.is_some()
        }

        pub fn claims(&self) -> &[(u8, u8)] {
            &self.claims
        }

        pub fn releases(&self) -> &[u8] {
            &self.releases
        }

        pub fn close_count(&self) -> u32 {
            self.closes
        }

        pub fn control_requests(&self) -> &[SetupPacket] {
            &self.control_requests
        }

        pub fn submitted_reads(&self) -> &[(u8, usize)] {
            &self.submitted_reads
        }

        fn check(&self, device: DeviceHandle) -> TransportResult<()> {
            match self.open {
                Some((_, handle)) if handle == device => Ok(()),
                _ => Err(TransportError::UnknownHandle),
            }
        }
    }

    impl Default for MockHostBus {
        fn default() -> Self {
            Self::new()
        }
    }

    impl UsbHostBus for MockHostBus {
        fn open_device(&mut self, address: u8) -> TransportResult<DeviceHandle> {
            if self.fail_open {
                return Err(TransportError::OpenFailed(address));
            }
            let handle = DeviceHandle::new(self.next_handle);
            self.next_handle += 1;
            self.open = Some((address, handle));
            Ok(handle)
        }

        fn device_info(&mut self, device: DeviceHandle) -> TransportResult<DeviceSpeed> {
            self.check(device)?;
            Ok(self.speed)
        }

        fn device_descriptor(&mut self, device: DeviceHandle) -> TransportResult<DeviceDescriptor> {
            self.check(device)?;
            Ok(self.device_descriptor)
        }

        fn active_config_descriptor(&mut self, device: DeviceHandle) -> TransportResult<Vec<u8>> {
            self.check(device)?;
            Ok(self.config_descriptor.clone())
        }

        fn claim_interface(
            &mut self,
            device: DeviceHandle,
            number: u8,
            alternate_setting: u8,
        ) -> TransportResult<()> {
            self.check(device)?;
            if self.fail_claim {
                return Err(TransportError::ClaimFailed(number));
            }
            self.claims.push((number, alternate_setting));
            Ok(())
        }

        fn release_interface(&mut self, device: DeviceHandle, number: u8) -> TransportResult<()> {
            self.check(device)?;
            self.releases.push(number);
            Ok(())
        }

        fn close_device(&mut self, device: DeviceHandle) -> TransportResult<()> {
            self.check(device)?;
            self.open = None;
            self.in_flight = None;
            self.closes += 1;
            Ok(())
        }

        fn control_in(
            &mut self,
            device: DeviceHandle,
            setup: &SetupPacket,
            buf: &mut [u8],
        ) -> TransportResult<usize> {
            self.check(device)?;
            if self.fail_control {
                return Err(TransportError::ControlError("scripted failure".to_string()));
            }
            self.control_requests.push(*setup);
            let len = self.control_response.len().min(buf.len());
            buf[..len].copy_from_slice(&self.control_response[..len]);
            Ok(len)
        }

        fn submit_interrupt_in(
            &mut self,
            device: DeviceHandle,
            endpoint: u8,
            len: usize,
        ) -> TransportResult<()> {
            self.check(device)?;
            self.submitted_reads.push((endpoint, len));
            if self.in_flight.is_none() {
                self.in_flight = self.interrupt_reports.pop_front();
            }
            Ok(())
        }

        fn service_transfers(
            &mut self,
            _timeout: Duration,
            sink: &mut [u8],
        ) -> TransportResult<Option<usize>> {
            match self.in_flight.take() {
                Some(data) => {
                    let len = data.len().min(sink.len());
                    sink[..len].copy_from_slice(&data[..len]);
                    Ok(Some(len))
                }
                None => Ok(None),
            }
        }

        fn next_device_event(&mut self, _timeout: Duration) -> Option<BusEvent> {
            self.events.pop_front()
        }
    }

}
