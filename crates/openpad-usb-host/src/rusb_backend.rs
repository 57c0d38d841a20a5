//! libusb-backed [`UsbHostBus`] implementation via the `rusb` crate.
//!
//! Discovery is poll-based: each call to [`UsbHostBus::next_device_event`]
//! rescans the bus for the target VID/PID and synthesizes attach/detach
//! notifications from the diff. Interrupt reads are performed with a short
//! timeout inside [`UsbHostBus::service_transfers`], so the single-threaded
//! contract of the trait holds without a background event thread.

use std::collections::HashMap;
use std::time::Duration;

use rusb::{Context, Device, UsbContext};
use tracing::{debug, warn};

use crate::{
    BusEvent, DeviceDescriptor, DeviceHandle, DeviceSpeed, SetupPacket, TransportError,
    TransportResult, UsbHostBus,
};

/// GET_DESCRIPTOR standard request.
const REQUEST_GET_DESCRIPTOR: u8 = 0x06;
/// wValue selecting the active configuration descriptor.
const CONFIGURATION_DESCRIPTOR_VALUE: u16 = 0x0200;
/// Timeout for synchronous control transfers.
const CONTROL_TIMEOUT: Duration = Duration::from_millis(500);

pub struct RusbHostBus {
    context: Context,
    vendor_id: u16,
    product_id: u16,
    tracked: Option<u8>,
    devices: HashMap<u8, Device<Context>>,
    handles: HashMap<u32, (Device<Context>, rusb::DeviceHandle<Context>)>,
    next_handle: u32,
    armed: Option<(DeviceHandle, u8, usize)>,
}

impl RusbHostBus {
    /// Create a bus watching for one controller family (VID/PID pair).
    pub fn new(vendor_id: u16, product_id: u16) -> TransportResult<Self> {
        let context = Context::new().map_err(|err| {
            warn!(error = %err, "libusb context init failed");
            TransportError::NotInitialized
        })?;
        Ok(Self {
            context,
            vendor_id,
            product_id,
            tracked: None,
            devices: HashMap::new(),
            handles: HashMap::new(),
            next_handle: 1,
            armed: None,
        })
    }

    fn scan(&mut self) -> Option<(u8, Device<Context>)> {
        let list = self.context.devices().ok()?;
        for device in list.iter() {
            let Ok(descriptor) = device.device_descriptor() else {
                continue;
            };
            if descriptor.vendor_id() == self.vendor_id
                && descriptor.product_id() == self.product_id
            {
                return Some((device.address(), device));
            }
        }
        None
    }

    fn entry(
        &mut self,
        device: DeviceHandle,
    ) -> TransportResult<&mut (Device<Context>, rusb::DeviceHandle<Context>)> {
        self.handles
            .get_mut(&device.raw())
            .ok_or(TransportError::UnknownHandle)
    }
}

fn map_transfer_error(err: rusb::Error) -> TransportError {
    match err {
        rusb::Error::NoDevice => TransportError::Disconnected,
        other => TransportError::TransferError(other.to_string()),
    }
}

impl UsbHostBus for RusbHostBus {
    fn open_device(&mut self, address: u8) -> TransportResult<DeviceHandle> {
        let device = self
            .devices
            .get(&address)
            .cloned()
            .ok_or(TransportError::OpenFailed(address))?;
        let handle = device.open().map_err(|err| {
            warn!(address, error = %err, "libusb open failed");
            TransportError::OpenFailed(address)
        })?;
        let id = DeviceHandle::new(self.next_handle);
        self.next_handle += 1;
        self.handles.insert(id.raw(), (device, handle));
        Ok(id)
    }

    fn device_info(&mut self, device: DeviceHandle) -> TransportResult<DeviceSpeed> {
        let (dev, _) = self.entry(device)?;
        Ok(match dev.speed() {
            rusb::Speed::Low => DeviceSpeed::Low,
            rusb::Speed::Full => DeviceSpeed::Full,
            _ => DeviceSpeed::High,
        })
    }

    fn device_descriptor(&mut self, device: DeviceHandle) -> TransportResult<DeviceDescriptor> {
        let (dev, _) = self.entry(device)?;
        let descriptor = dev
            .device_descriptor()
            .map_err(|err| TransportError::DescriptorError(err.to_string()))?;
        Ok(DeviceDescriptor {
            vendor_id: descriptor.vendor_id(),
            product_id: descriptor.product_id(),
            device_class: descriptor.class_code(),
            max_packet_size_0: descriptor.max_packet_size(),
        })
    }

    fn active_config_descriptor(&mut self, device: DeviceHandle) -> TransportResult<Vec<u8>> {
        let (_, handle) = self.entry(device)?;
        // Header first, for wTotalLength, then the whole buffer.
        let mut header = [0u8; 9];
        handle
            .read_control(
                rusb::request_type(
                    rusb::Direction::In,
                    rusb::RequestType::Standard,
                    rusb::Recipient::Device,
                ),
                REQUEST_GET_DESCRIPTOR,
                CONFIGURATION_DESCRIPTOR_VALUE,
                0,
                &mut header,
                CONTROL_TIMEOUT,
            )
            .map_err(|err| TransportError::DescriptorError(err.to_string()))?;
        let total = usize::from(u16::from_le_bytes([header[2], header[3]]));
        let mut buf = vec![0u8; total.max(header.len())];
        let read = handle
            .read_control(
                rusb::request_type(
                    rusb::Direction::In,
                    rusb::RequestType::Standard,
                    rusb::Recipient::Device,
                ),
                REQUEST_GET_DESCRIPTOR,
                CONFIGURATION_DESCRIPTOR_VALUE,
                0,
                &mut buf,
                CONTROL_TIMEOUT,
            )
            .map_err(|err| TransportError::DescriptorError(err.to_string()))?;
        buf.truncate(read);
        Ok(buf)
    }

    fn claim_interface(
        &mut self,
        device: DeviceHandle,
        number: u8,
        alternate_setting: u8,
    ) -> TransportResult<()> {
        let (_, handle) = self.entry(device)?;
        handle
            .claim_interface(number)
            .map_err(|err| {
                warn!(number, error = %err, "interface claim failed");
                TransportError::ClaimFailed(number)
            })?;
        if alternate_setting != 0 {
            handle
                .set_alternate_setting(number, alternate_setting)
                .map_err(|_| TransportError::ClaimFailed(number))?;
        }
        Ok(())
    }

    fn release_interface(&mut self, device: DeviceHandle, number: u8) -> TransportResult<()> {
        let (_, handle) = self.entry(device)?;
        handle
            .release_interface(number)
            .map_err(|_| TransportError::ReleaseFailed(number))
    }

    fn close_device(&mut self, device: DeviceHandle) -> TransportResult<()> {
        // Dropping the rusb handle closes the device.
        self.handles
            .remove(&device.raw())
            .map(|_| ())
            .ok_or(TransportError::UnknownHandle)
    }

    fn control_in(
        &mut self,
        device: DeviceHandle,
        setup: &SetupPacket,
        buf: &mut [u8],
    ) -> TransportResult<usize> {
        let (_, handle) = self.entry(device)?;
        let len = usize::from(setup.length).min(buf.len());
        handle
            .read_control(
                setup.request_type,
                setup.request,
                setup.value,
                setup.index,
                &mut buf[..len],
                CONTROL_TIMEOUT,
            )
            .map_err(|err| TransportError::ControlError(err.to_string()))
    }

    fn submit_interrupt_in(
        &mut self,
        device: DeviceHandle,
        endpoint: u8,
        len: usize,
    ) -> TransportResult<()> {
        self.entry(device)?;
        self.armed = Some((device, endpoint, len));
        Ok(())
    }

    fn service_transfers(
        &mut self,
        timeout: Duration,
        sink: &mut [u8],
    ) -> TransportResult<Option<usize>> {
        let Some((device, endpoint, len)) = self.armed.take() else {
            return Ok(None);
        };
        let (_, handle) = self.entry(device)?;
        let want = len.min(sink.len());
        match handle.read_interrupt(endpoint, &mut sink[..want], timeout) {
            Ok(read) => Ok(Some(read)),
            Err(rusb::Error::Timeout) => Ok(None),
            Err(err) => Err(map_transfer_error(err)),
        }
    }

    fn next_device_event(&mut self, _timeout: Duration) -> Option<BusEvent> {
        // Poll-based hotplug: the caller's tick interval provides pacing.
        let found = self.scan();
        match (self.tracked, found) {
            (None, Some((address, device))) => {
                debug!(address, "controller appeared on the bus");
                self.tracked = Some(address);
                self.devices.insert(address, device);
                Some(BusEvent::Attached { address })
            }
            (Some(address), None) => {
                debug!(address, "controller left the bus");
                self.tracked = None;
                self.devices.remove(&address);
                Some(BusEvent::Detached { address })
            }
            _ => None,
        }
    }
}
