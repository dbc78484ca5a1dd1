//! Bulk transport to the bridge interface
//!
//! The [`Transport`] trait is the only place where bytes touch USB. The
//! session and command layers are generic over it so they can run against
//! a scripted bridge in tests.

use nusb::transfer::{Buffer, Bulk, In, Out};
use nusb::{Endpoint, MaybeFuture};

use crate::error::{Result, StLinkV3Error};
use crate::protocol::{EP_IN, EP_OUT, STLINK_V3_PID, STLINK_VID, USB_TIMEOUT};

/// Raw bulk pipe pair
pub trait Transport {
    /// Send `data` on the OUT endpoint, returning the number of bytes sent
    fn bulk_out(&mut self, data: &[u8]) -> Result<usize>;

    /// Receive into `buf` from the IN endpoint, returning the number of bytes read
    fn bulk_in(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// STLINK-V3 bridge interface opened through nusb
pub struct UsbTransport {
    /// Bulk OUT endpoint for frames and write data
    out_ep: Endpoint<Bulk, Out>,
    /// Bulk IN endpoint for answers and read data
    in_ep: Endpoint<Bulk, In>,
}

impl UsbTransport {
    /// Open the first STLINK-V3, or the one whose serial number is `serial`
    pub fn open(serial: Option<&str>) -> Result<Self> {
        let devices: Vec<_> = nusb::list_devices()
            .wait()
            .map_err(|e| StLinkV3Error::OpenFailed(e.to_string()))?
            .filter(|d| d.vendor_id() == STLINK_VID && d.product_id() == STLINK_V3_PID)
            .collect();

        if devices.is_empty() {
            return Err(StLinkV3Error::DeviceNotFound);
        }

        let device_info = match serial {
            Some(wanted) => devices
                .iter()
                .find(|d| d.serial_number() == Some(wanted))
                .ok_or_else(|| StLinkV3Error::SerialNotFound(wanted.to_string()))?,
            None => &devices[0],
        };

        log::info!(
            "Opening STLINK-V3 at bus {} address {}{}",
            device_info.bus_id(),
            device_info.device_address(),
            device_info
                .serial_number()
                .map(|s| format!(" serial={}", s))
                .unwrap_or_default()
        );

        let device = device_info
            .open()
            .wait()
            .map_err(|e| StLinkV3Error::OpenFailed(e.to_string()))?;

        // The bridge shares the composite device with the debug and VCP
        // functions; pick the interface that owns its IN endpoint.
        let config_desc = device
            .active_configuration()
            .map_err(|e| StLinkV3Error::OpenFailed(format!("Failed to get config: {}", e)))?;

        let iface_num = config_desc
            .interface_alt_settings()
            .find(|iface| iface.endpoints().any(|ep| ep.address() == EP_IN))
            .map(|iface| iface.interface_number())
            .ok_or(StLinkV3Error::EndpointNotFound(EP_IN))?;

        log::debug!("Using interface {}", iface_num);

        let interface = device
            .claim_interface(iface_num)
            .wait()
            .map_err(|e| StLinkV3Error::ClaimFailed(e.to_string()))?;

        let out_ep = interface
            .endpoint::<Bulk, Out>(EP_OUT)
            .map_err(|e| StLinkV3Error::ClaimFailed(e.to_string()))?;
        let in_ep = interface
            .endpoint::<Bulk, In>(EP_IN)
            .map_err(|e| StLinkV3Error::ClaimFailed(e.to_string()))?;

        Ok(Self { out_ep, in_ep })
    }
}

impl Transport for UsbTransport {
    fn bulk_out(&mut self, data: &[u8]) -> Result<usize> {
        let buf = Buffer::from(data.to_vec());
        let completion = self.out_ep.transfer_blocking(buf, USB_TIMEOUT);
        completion.status?;

        log::trace!("USB write {}/{} bytes", completion.actual_len, data.len());
        Ok(completion.actual_len)
    }

    fn bulk_in(&mut self, buf: &mut [u8]) -> Result<usize> {
        let max_packet_size = self.in_ep.max_packet_size();
        // Request length must be multiple of max packet size
        let request_len = buf.len().max(1).div_ceil(max_packet_size) * max_packet_size;
        let mut in_buf = Buffer::new(request_len);
        in_buf.set_requested_len(request_len);

        let completion = self.in_ep.transfer_blocking(in_buf, USB_TIMEOUT);
        completion.status?;

        let received = completion.actual_len;
        let copied = received.min(buf.len());
        buf[..copied].copy_from_slice(&completion.buffer[..copied]);

        log::trace!("USB read {} bytes (expected {})", received, buf.len());
        Ok(received)
    }
}
