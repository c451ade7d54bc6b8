//! Device trait and the base device
//!
//! A device owns a non-wildcard base address and a base uid. The transport
//! attaches an [`Outbox`] when the device is added and detaches it when the
//! device is removed or the transport shuts down. Sends while detached are
//! silently dropped.

use crate::error::{DeviceError, Result};
use crate::outbox::Outbox;
use bytes::Bytes;
use tracing::{debug, trace};
use xap_core::{Address, Heartbeat, Message, Uid};

/// A virtual xAP device driven by a transport
pub trait Device: Send {
    /// Base address (no wildcard, no endpoint)
    fn address(&self) -> &Address;

    /// Base uid
    fn uid(&self) -> &Uid;

    /// Heartbeat interval in seconds; 0 disables heartbeats
    fn interval(&self) -> u32;

    /// Give the device a way to send messages
    fn attach(&mut self, outbox: Outbox);

    /// Remove the device's transport
    fn detach(&mut self);

    /// Handle a message whose target matches this device
    fn receive_message(&mut self, message: &Message) -> Result<()>;

    /// The heartbeat this device broadcasts
    fn heartbeat(&self) -> Heartbeat {
        Heartbeat::new(self.address().clone(), self.uid(), self.interval())
    }

    /// Wire bytes of the heartbeat
    fn heartbeat_payload(&self) -> Bytes {
        Message::from(self.heartbeat()).to_bytes()
    }
}

/// Reject wildcard and endpoint-qualified device addresses
pub fn validate_address(address: &Address) -> Result<()> {
    if address.is_wildcard() || address.endpoint().is_some() {
        return Err(DeviceError::Validation(format!(
            "address must be a non-wildcarded xAP address without ':', not {}",
            address
        )));
    }
    Ok(())
}

/// Address, uid, interval and transport state shared by every device
#[derive(Debug, Clone)]
pub struct BaseDevice {
    address: Address,
    uid: Uid,
    interval: u32,
    outbox: Option<Outbox>,
}

impl BaseDevice {
    pub fn new(address: Address, uid: Uid, interval: u32) -> Result<Self> {
        validate_address(&address)?;
        Ok(Self {
            address,
            uid,
            interval,
            outbox: None,
        })
    }

    /// Change the device address
    pub fn set_address(&mut self, address: Address) -> Result<()> {
        validate_address(&address)?;
        self.address = address;
        Ok(())
    }

    pub fn set_uid(&mut self, uid: Uid) {
        self.uid = uid;
    }

    pub fn set_interval(&mut self, interval: u32) {
        self.interval = interval;
    }

    pub fn is_attached(&self) -> bool {
        self.outbox.is_some()
    }

    /// Queue a message on the attached transport; a no-op while detached
    pub fn send(&self, message: impl Into<Message>) {
        let message = message.into();
        match &self.outbox {
            Some(outbox) => {
                if !outbox.send(message) {
                    debug!("Transport for {} is closed, dropping message", self.address);
                }
            }
            None => trace!(
                "{} is detached, dropping {} message",
                self.address,
                message.kind()
            ),
        }
    }
}

impl Device for BaseDevice {
    fn address(&self) -> &Address {
        &self.address
    }

    fn uid(&self) -> &Uid {
        &self.uid
    }

    fn interval(&self) -> u32 {
        self.interval
    }

    fn attach(&mut self, outbox: Outbox) {
        self.outbox = Some(outbox);
    }

    fn detach(&mut self) {
        self.outbox = None;
    }

    fn receive_message(&mut self, message: &Message) -> Result<()> {
        debug!(
            "{} ignoring {} message from {}",
            self.address,
            message.kind(),
            message.source()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> BaseDevice {
        BaseDevice::new(
            Address::parse("ACME.Lighting.apartment").unwrap(),
            Uid::parse("FF345600").unwrap(),
            60,
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_bad_addresses() {
        let uid = Uid::parse("FF345600").unwrap();
        for bad in ["a.b.*", "a.b.c:ep", "a.>.c:ep", "a.b.>"] {
            let Ok(address) = Address::parse(bad) else {
                continue;
            };
            assert!(matches!(
                BaseDevice::new(address, uid.clone(), 60),
                Err(DeviceError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_send_while_detached_is_noop() {
        let device = base();
        assert!(!device.is_attached());
        device.send(device.heartbeat());
    }

    #[test]
    fn test_send_after_attach() {
        let mut device = base();
        let (outbox, mut rx) = Outbox::channel();
        device.attach(outbox);
        device.send(device.heartbeat());
        assert!(matches!(rx.try_recv().unwrap(), Message::Heartbeat(_)));

        device.detach();
        device.send(device.heartbeat());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_set_address_validates() {
        let mut device = base();
        assert!(device
            .set_address(Address::parse("a.b.*").unwrap())
            .is_err());
        assert_eq!(device.address().as_str(), "ACME.Lighting.apartment");
        device
            .set_address(Address::parse("ACME.Lighting.house").unwrap())
            .unwrap();
        assert_eq!(device.address().as_str(), "ACME.Lighting.house");
    }
}
