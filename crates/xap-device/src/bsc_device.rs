//! BSC device: a set of named, uid-indexed endpoints
//!
//! Incoming commands update output endpoints and produce one event (value
//! changed) or info (nothing changed) message per acting endpoint. Queries
//! produce info messages. Changes made by commands are also sent to every
//! watcher returned by [`BscDevice::watch`].

use crate::device::{BaseDevice, Device};
use crate::endpoint::{Endpoint, EndpointChange, EndpointSpec, EndpointValues};
use crate::error::{DeviceError, Result};
use crate::outbox::Outbox;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::mpsc;
use tracing::{debug, trace};
use xap_core::uid::MAX_SUB_UID;
use xap_core::{Address, BlockId, BscCommand, BscQuery, Level, Message, State, Uid};

/// A virtual xAP Basic Status and Control device
#[derive(Debug)]
pub struct BscDevice {
    base: BaseDevice,
    /// Endpoints by sub-uid
    endpoints: BTreeMap<u8, Endpoint>,
    /// Lowercased endpoint name to sub-uid
    names: HashMap<String, u8>,
    watchers: Vec<mpsc::UnboundedSender<EndpointChange>>,
}

impl BscDevice {
    /// A device with no endpoints
    pub fn new(address: Address, uid: Uid, interval: u32) -> Result<Self> {
        Ok(Self {
            base: BaseDevice::new(address, uid, interval)?,
            endpoints: BTreeMap::new(),
            names: HashMap::new(),
            watchers: Vec::new(),
        })
    }

    /// A device with an initial endpoint set
    pub fn with_endpoints(
        address: Address,
        uid: Uid,
        interval: u32,
        endpoints: impl IntoIterator<Item = EndpointSpec>,
    ) -> Result<Self> {
        let mut device = Self::new(address, uid, interval)?;
        for spec in endpoints {
            device.add_endpoint(spec)?;
        }
        Ok(device)
    }

    pub fn base(&self) -> &BaseDevice {
        &self.base
    }

    /// Receive a change notification whenever a command changes an
    /// endpoint
    pub fn watch(&mut self) -> mpsc::UnboundedReceiver<EndpointChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.watchers.push(tx);
        rx
    }

    // ========================================================================
    // Endpoint management
    // ========================================================================

    /// Add an endpoint and return its sub-uid. Nothing changes on error.
    /// An attached device announces the new endpoint with an info message.
    pub fn add_endpoint(&mut self, spec: EndpointSpec) -> Result<u8> {
        spec.validate()?;

        let key = spec.name.to_ascii_lowercase();
        if self.names.contains_key(&key) {
            return Err(DeviceError::Endpoint(format!(
                "duplicate endpoint name {}",
                spec.name
            )));
        }

        let uid = match spec.uid {
            Some(uid) => {
                // Range checked by validate()
                let uid = u8::try_from(uid)
                    .map_err(|_| DeviceError::Endpoint(format!("invalid uid {}", uid)))?;
                if self.endpoints.contains_key(&uid) {
                    return Err(DeviceError::Endpoint(format!("duplicate uid {}", uid)));
                }
                uid
            }
            None => self.find_free_uid().ok_or_else(|| {
                DeviceError::Endpoint(format!(
                    "all {} endpoint uids are in use",
                    MAX_SUB_UID
                ))
            })?,
        };

        let endpoint = Endpoint::from_spec(spec, uid);
        debug!(
            "{} adding {:?} endpoint {} with uid {:02X}",
            self.base.address(),
            endpoint.kind(),
            endpoint.name(),
            uid
        );
        if self.base.is_attached() {
            self.send_response(&endpoint, false)?;
        }
        self.names.insert(key, uid);
        self.endpoints.insert(uid, endpoint);
        Ok(uid)
    }

    /// Remove an endpoint by name
    pub fn remove_endpoint(&mut self, name: &str) -> Result<Endpoint> {
        let uid = self
            .get_uid(name)
            .ok_or_else(|| DeviceError::NotFound(name.to_string()))?;
        self.remove_endpoint_uid(uid)
    }

    /// Remove an endpoint by sub-uid
    pub fn remove_endpoint_uid(&mut self, uid: u8) -> Result<Endpoint> {
        let endpoint = self
            .endpoints
            .remove(&uid)
            .ok_or_else(|| DeviceError::NotFound(format!("uid {:02X}", uid)))?;
        self.names.remove(&endpoint.name().to_ascii_lowercase());
        debug!("{} removed endpoint {}", self.base.address(), endpoint.name());
        Ok(endpoint)
    }

    /// The lowest unused sub-uid in 1..=254
    pub fn find_free_uid(&self) -> Option<u8> {
        (1..=MAX_SUB_UID).find(|uid| !self.endpoints.contains_key(uid))
    }

    /// Endpoint by name (case-insensitive)
    pub fn endpoint(&self, name: &str) -> Option<&Endpoint> {
        self.get_uid(name).and_then(|uid| self.endpoints.get(&uid))
    }

    pub fn endpoint_by_uid(&self, uid: u8) -> Option<&Endpoint> {
        self.endpoints.get(&uid)
    }

    /// Sub-uid of the named endpoint
    pub fn get_uid(&self, name: &str) -> Option<u8> {
        self.names.get(&name.to_ascii_lowercase()).copied()
    }

    /// Every endpoint in ascending sub-uid order
    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.values()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn output_count(&self) -> usize {
        self.endpoints.values().filter(|ep| ep.is_output()).count()
    }

    pub fn input_count(&self) -> usize {
        self.endpoints.len() - self.output_count()
    }

    // ========================================================================
    // Local updates
    // ========================================================================

    /// Set the State of an endpoint. Sends an event if it changed, info
    /// otherwise.
    pub fn set_state(&mut self, name: &str, state: State) -> Result<()> {
        self.update(name, |values| {
            values.state = state;
            Ok(())
        })
    }

    /// Set the Level of an endpoint. A bare numerator keeps the existing
    /// denominator.
    pub fn set_level(&mut self, name: &str, level: Level) -> Result<()> {
        self.update(name, |values| {
            let current = values.level.ok_or_else(|| {
                DeviceError::Endpoint(format!("endpoint {} has no level", name))
            })?;
            values.level = Some(match level {
                Level::Raw(numerator) => current.with_numerator(numerator),
                Level::Ratio { denominator, .. } if denominator <= 0 => {
                    return Err(DeviceError::Endpoint(format!(
                        "invalid level {} for endpoint {}",
                        level, name
                    )))
                }
                level => level,
            });
            Ok(())
        })
    }

    pub fn set_text(&mut self, name: &str, text: impl Into<String>) -> Result<()> {
        let text = check_text(name, "Text", text.into())?;
        self.update(name, |values| {
            values.text = Some(text);
            Ok(())
        })
    }

    pub fn set_display_text(&mut self, name: &str, text: impl Into<String>) -> Result<()> {
        let text = check_text(name, "DisplayText", text.into())?;
        self.update(name, |values| {
            values.display_text = Some(text);
            Ok(())
        })
    }

    fn update<F>(&mut self, name: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut EndpointValues) -> Result<()>,
    {
        let uid = self
            .get_uid(name)
            .ok_or_else(|| DeviceError::NotFound(name.to_string()))?;
        let Some(endpoint) = self.endpoints.get_mut(&uid) else {
            return Err(DeviceError::NotFound(name.to_string()));
        };

        let before = endpoint.values().clone();
        let mut values = before.clone();
        f(&mut values)?;
        let changed = values != before;
        *endpoint.values_mut() = values;

        let endpoint = &self.endpoints[&uid];
        self.send_response(endpoint, changed)
    }

    /// Change the device address and re-announce every endpoint
    pub fn set_address(&mut self, address: Address) -> Result<()> {
        self.base.set_address(address)?;
        self.announce()
    }

    /// Change the device uid and re-announce every endpoint
    pub fn set_uid(&mut self, uid: Uid) -> Result<()> {
        self.base.set_uid(uid);
        self.announce()
    }

    pub fn set_interval(&mut self, interval: u32) {
        self.base.set_interval(interval);
    }

    // ========================================================================
    // Message handling
    // ========================================================================

    fn handle_command(&mut self, cmd: &BscCommand) -> Result<()> {
        let Some(target) = cmd.target() else {
            return Ok(());
        };
        if self.output_count() == 0 {
            debug!("{} has no outputs, ignoring command", self.base.address());
            return Ok(());
        }

        let acting: Vec<u8> = if target.is_wildcard() {
            self.endpoints
                .values()
                .filter(|ep| ep.is_output() && target.endpoint_matches(ep.name()))
                .map(Endpoint::uid)
                .collect()
        } else {
            target
                .endpoint()
                .and_then(|name| self.endpoint(name))
                .filter(|ep| ep.is_output())
                .map(Endpoint::uid)
                .into_iter()
                .collect()
        };
        if acting.is_empty() {
            debug!("Command for {} matched no outputs", target);
            return Ok(());
        }

        for block in cmd.blocks() {
            let uids: Vec<u8> = match block.id {
                None | Some(BlockId::All) => acting.clone(),
                Some(BlockId::Uid(uid)) if acting.contains(&uid) => vec![uid],
                Some(BlockId::Uid(uid)) => {
                    trace!("Block ID {:02X} is not among the targeted outputs", uid);
                    continue;
                }
            };

            for uid in uids {
                let Some(endpoint) = self.endpoints.get_mut(&uid) else {
                    continue;
                };
                let changed = endpoint.apply(block);
                let endpoint = &self.endpoints[&uid];
                self.send_response(endpoint, changed)?;
                if changed {
                    debug!("Output {} changed: {:?}", endpoint.name(), endpoint.values());
                    let change = endpoint.change();
                    self.watchers.retain(|tx| tx.send(change.clone()).is_ok());
                }
            }
        }
        Ok(())
    }

    fn handle_query(&self, query: &BscQuery) -> Result<()> {
        let Some(target) = query.target() else {
            return Ok(());
        };

        if target.is_wildcard() {
            for endpoint in self
                .endpoints
                .values()
                .filter(|ep| target.endpoint_matches(ep.name()))
            {
                self.send_response(endpoint, false)?;
            }
        } else if let Some(endpoint) = target.endpoint().and_then(|name| self.endpoint(name)) {
            self.send_response(endpoint, false)?;
        }
        Ok(())
    }

    /// Send an info message for every endpoint
    fn announce(&self) -> Result<()> {
        if !self.base.is_attached() {
            return Ok(());
        }
        for endpoint in self.endpoints.values() {
            self.send_response(endpoint, false)?;
        }
        Ok(())
    }

    fn send_response(&self, endpoint: &Endpoint, event: bool) -> Result<()> {
        let response = endpoint.response(self.base.address(), self.base.uid(), event)?;
        self.base.send(response);
        Ok(())
    }
}

fn check_text(name: &str, field: &str, text: String) -> Result<String> {
    if text.contains('\n') {
        return Err(DeviceError::Endpoint(format!(
            "endpoint {} {} must not include newlines",
            name, field
        )));
    }
    Ok(text)
}

impl Device for BscDevice {
    fn address(&self) -> &Address {
        self.base.address()
    }

    fn uid(&self) -> &Uid {
        self.base.uid()
    }

    fn interval(&self) -> u32 {
        self.base.interval()
    }

    /// Attach and announce every endpoint
    fn attach(&mut self, outbox: Outbox) {
        self.base.attach(outbox);
        if let Err(e) = self.announce() {
            debug!("Failed to announce endpoints of {}: {}", self.base.address(), e);
        }
    }

    fn detach(&mut self) {
        self.base.detach();
    }

    fn receive_message(&mut self, message: &Message) -> Result<()> {
        match message {
            Message::BscCommand(cmd) => {
                debug!("Command message for {} from {}", self.base.address(), cmd.header().source);
                self.handle_command(cmd)
            }
            Message::BscQuery(query) => {
                debug!("Query message for {}, target {:?}", self.base.address(), query.target());
                self.handle_query(query)
            }
            Message::BscInfo(_) | Message::BscEvent(_) => {
                debug!(
                    "{} message for {} from {}",
                    message.kind(),
                    self.base.address(),
                    message.source()
                );
                Ok(())
            }
            other => self.base.receive_message(other),
        }
    }
}
