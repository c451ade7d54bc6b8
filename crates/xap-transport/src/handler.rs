//! Device registry and inbound message routing
//!
//! The handler does no I/O. The server feeds it datagrams and heartbeat
//! ticks and drains the [`Outbox`] it hands to devices.

use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use xap_core::{Address, Message, Registry};
use xap_device::{Device, Outbox};

use crate::error::Result;

/// Identifies a device added to a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(u64);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device-{}", self.0)
    }
}

/// Owns the devices of one transport and routes messages to them
pub struct XapHandler {
    registry: Arc<Registry>,
    outbox: Outbox,
    devices: Vec<(DeviceId, Box<dyn Device>)>,
    receivers: Vec<(Address, mpsc::UnboundedSender<Message>)>,
    next_id: u64,
}

impl XapHandler {
    pub fn new(registry: Arc<Registry>, outbox: Outbox) -> Self {
        Self {
            registry,
            outbox,
            devices: Vec::new(),
            receivers: Vec::new(),
            next_id: 1,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Add and attach a device
    pub fn add_device(&mut self, mut device: Box<dyn Device>) -> DeviceId {
        let id = DeviceId(self.next_id);
        self.next_id += 1;

        debug!("Adding {} as {}", device.address(), id);
        device.attach(self.outbox.clone());
        self.devices.push((id, device));
        id
    }

    /// Remove and detach a device
    pub fn remove_device(&mut self, id: DeviceId) -> Option<Box<dyn Device>> {
        let index = self.devices.iter().position(|(d, _)| *d == id)?;
        let (_, mut device) = self.devices.remove(index);
        device.detach();
        debug!("Removed {} ({})", device.address(), id);
        Some(device)
    }

    pub fn device(&self, id: DeviceId) -> Option<&dyn Device> {
        self.devices
            .iter()
            .find(|(d, _)| *d == id)
            .map(|(_, device)| device.as_ref())
    }

    pub fn device_mut(&mut self, id: DeviceId) -> Option<&mut (dyn Device + 'static)> {
        self.devices
            .iter_mut()
            .find(|(d, _)| *d == id)
            .map(|(_, device)| device.as_mut())
    }

    pub fn device_ids(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.devices.iter().map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Receive every dispatched message whose source matches `pattern`
    pub fn add_receiver(&mut self, pattern: Address) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.receivers.push((pattern, tx));
        rx
    }

    /// Decode and deliver one datagram. Undecodable datagrams are logged
    /// and returned as errors; they never affect the devices.
    pub fn receive_datagram(&mut self, data: &[u8]) -> Result<Message> {
        let message = match self.registry.decode(data) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping invalid xAP message: {}", e);
                trace!("Invalid datagram: {:?}", String::from_utf8_lossy(data));
                return Err(e.into());
            }
        };
        self.deliver(&message);
        Ok(message)
    }

    /// Route a message to matching receivers and to every device whose
    /// address the message's target matches. Returns the number of
    /// devices that handled it without error.
    pub fn deliver(&mut self, message: &Message) -> usize {
        self.receivers.retain(|(pattern, tx)| {
            if pattern.matches(message.source()) {
                tx.send(message.clone()).is_ok()
            } else {
                !tx.is_closed()
            }
        });

        let Some(target) = message.target() else {
            trace!("{} message from {} has no target", message.kind(), message.source());
            return 0;
        };

        let mut handled = 0;
        for (id, device) in self.devices.iter_mut() {
            if !target.base_matches(device.address()) {
                continue;
            }
            match device.receive_message(message) {
                Ok(()) => handled += 1,
                Err(e) => warn!(
                    "Error processing {} message with {} ({}): {}",
                    message.kind(),
                    device.address(),
                    id,
                    e
                ),
            }
        }
        if handled == 0 {
            trace!(
                "{} message ({} => {}) matched no devices",
                message.kind(),
                message.source(),
                target
            );
        }
        handled
    }

    /// Heartbeat interval of a device
    pub fn interval(&self, id: DeviceId) -> Option<u32> {
        self.device(id).map(|device| device.interval())
    }

    /// Heartbeat wire bytes of a device
    pub fn heartbeat_payload(&self, id: DeviceId) -> Option<Bytes> {
        self.device(id).map(|device| device.heartbeat_payload())
    }

    /// Detach every device; later sends from them are dropped
    pub fn detach_all(&mut self) {
        for (_, device) in self.devices.iter_mut() {
            device.detach();
        }
    }
}

impl fmt::Debug for XapHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let devices: Vec<String> = self
            .devices
            .iter()
            .map(|(id, device)| format!("{} {}", id, device.address()))
            .collect();
        f.debug_struct("XapHandler")
            .field("devices", &devices)
            .field("receivers", &self.receivers.len())
            .finish()
    }
}
