//! Message class registry and dispatch
//!
//! Constructors are keyed by (header block name, message class), both
//! lowercased. A `None` class registers the fallback for every class
//! without its own constructor under that header name. The registry is
//! built once at startup and only read afterwards.

use crate::codec::{self, Packet};
use crate::message::Message;
use crate::{bsc, heartbeat, message, Error, Result};
use std::collections::HashMap;
use std::fmt;

/// Builds a typed message from a parsed block tree
pub type Constructor = fn(&Packet) -> Result<Message>;

/// Maps (header name, class) to message constructors
#[derive(Default, Clone)]
pub struct Registry {
    handlers: HashMap<String, HashMap<Option<String>, Constructor>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self
            .handlers
            .iter()
            .flat_map(|(header, classes)| {
                classes
                    .keys()
                    .map(move |class| format!("{}/{}", header, class.as_deref().unwrap_or("*")))
            })
            .collect();
        keys.sort();
        f.debug_struct("Registry").field("classes", &keys).finish()
    }
}

impl Registry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with heartbeat, BSC and fallback support
    pub fn standard() -> Self {
        let mut registry = Self::new();
        let schemas: [fn(&mut Registry) -> Result<()>; 3] =
            [heartbeat::register, bsc::register, message::register];
        for register in schemas {
            let result = register(&mut registry);
            debug_assert!(result.is_ok(), "standard registration failed: {:?}", result);
        }
        registry
    }

    /// Register a constructor. Fails if the key is already taken.
    pub fn register(
        &mut self,
        header: &str,
        class: Option<&str>,
        constructor: Constructor,
    ) -> Result<()> {
        let header = header.to_ascii_lowercase();
        let class = class.map(str::to_ascii_lowercase);
        let classes = self.handlers.entry(header.clone()).or_default();

        if classes.contains_key(&class) {
            return Err(Error::DuplicateRegistration {
                header,
                class: class.unwrap_or_else(|| "*".to_string()),
            });
        }
        classes.insert(class, constructor);
        Ok(())
    }

    /// Whether any constructor exists for the header name
    pub fn knows_header(&self, header: &str) -> bool {
        self.handlers.contains_key(&header.to_ascii_lowercase())
    }

    /// Find the constructor for a header name and class, falling back to
    /// the header's `None` entry
    pub fn resolve(&self, header: &str, class: Option<&str>) -> Option<Constructor> {
        let classes = self.handlers.get(&header.to_ascii_lowercase())?;
        class
            .and_then(|c| classes.get(&Some(c.to_ascii_lowercase())))
            .or_else(|| classes.get(&None))
            .copied()
    }

    /// Build a typed message from a parsed packet
    pub fn dispatch(&self, packet: &Packet) -> Result<Message> {
        let header = packet
            .header()
            .ok_or_else(|| Error::Format("message has no blocks".to_string()))?;
        let header_name = header.name().to_ascii_lowercase();

        let classes = self
            .handlers
            .get(&header_name)
            .ok_or_else(|| Error::UnknownHeader(header_name.clone()))?;

        let class = header.text("class").map(|c| c.to_ascii_lowercase());
        if class.is_none() && !classes.contains_key(&None) {
            return Err(Error::MissingClass(header_name));
        }

        let constructor = class
            .as_ref()
            .and_then(|c| classes.get(&Some(c.clone())))
            .or_else(|| classes.get(&None))
            .ok_or_else(|| Error::UnknownClass {
                header: header_name.clone(),
                class: class.clone().unwrap_or_default(),
            })?;

        constructor(packet)
    }

    /// Parse wire bytes and dispatch
    pub fn decode(&self, bytes: &[u8]) -> Result<Message> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::Format(format!("message is not valid UTF-8: {}", e)))?;
        self.dispatch(&codec::parse(text)?)
    }
}
