//! Device unique identifiers
//!
//! A device's base uid has the form `FFxxyy00` where `xx` and `yy` are in
//! `01..FE`. Endpoints of the device replace the trailing `00` with their
//! sub-uid (`01..FE`).

use crate::{Error, Result};
use rand::Rng;
use std::fmt;
use std::str::FromStr;

/// Highest sub-uid an endpoint may use
pub const MAX_SUB_UID: u8 = 254;

/// A validated device base uid
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Uid(String);

impl Uid {
    /// Parse and validate a base uid
    pub fn parse(s: &str) -> Result<Self> {
        let bytes = if s.len() == 8 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            hex::decode(s).ok()
        } else {
            None
        };

        match bytes.as_deref() {
            Some([0xFF, xx, yy, 0x00]) if is_assignable(*xx) && is_assignable(*yy) => {
                Ok(Self(s.to_ascii_uppercase()))
            }
            _ => Err(Error::Validation(format!(
                "uid must be eight hex digits of the form FF(01..FE)(01..FE)00, not {}",
                s
            ))),
        }
    }

    /// Build a uid from its two assignable bytes
    pub fn from_parts(xx: u8, yy: u8) -> Result<Self> {
        Self::parse(&format!("FF{:02X}{:02X}00", xx, yy))
    }

    /// A random uid of the form `FF(01..FE)(01..FE)00`
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        let xx: u8 = rng.gen_range(1..=MAX_SUB_UID);
        let yy: u8 = rng.gen_range(1..=MAX_SUB_UID);
        Self(format!("FF{:02X}{:02X}00", xx, yy))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The uid string for an endpoint with the given sub-uid
    pub fn endpoint(&self, sub_uid: u8) -> String {
        format!("{}{:02X}", &self.0[..6], sub_uid)
    }
}

fn is_assignable(b: u8) -> bool {
    b != 0x00 && b != 0xFF
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Uid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uid::parse(s)
    }
}
