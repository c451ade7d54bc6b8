//! BSC endpoints
//!
//! An endpoint is one addressable input or output of a BSC device. Its
//! values are changed by network commands through [`Endpoint::apply`],
//! which is pure: the owning device decides what to send afterwards.

use crate::error::{DeviceError, Result};
use xap_core::uid::MAX_SUB_UID;
use xap_core::{Address, BlockState, BscBlock, BscResponse, Direction, Level, State, Uid};

/// Whether an endpoint reports (input) or can be commanded (output)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Input,
    Output,
}

impl EndpointKind {
    pub fn direction(&self) -> Direction {
        match self {
            EndpointKind::Input => Direction::Input,
            EndpointKind::Output => Direction::Output,
        }
    }
}

/// Current values of an endpoint. Absent optional fields are never
/// reported and never updated by commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointValues {
    pub state: State,
    pub level: Option<Level>,
    pub text: Option<String>,
    pub display_text: Option<String>,
}

/// Sent to watchers when a network command changes an output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointChange {
    pub name: String,
    pub uid: u8,
    pub values: EndpointValues,
}

/// Description of an endpoint to add to a device
#[derive(Debug, Clone, Default)]
pub struct EndpointSpec {
    pub name: String,
    /// Sub-uid in 1..=254; the lowest free one when absent
    pub uid: Option<u32>,
    pub output: bool,
    /// Required
    pub state: Option<State>,
    pub level: Option<Level>,
    pub text: Option<String>,
    pub display_text: Option<String>,
}

impl EndpointSpec {
    pub fn input(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn output(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            output: true,
            ..Default::default()
        }
    }

    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }

    pub fn with_state(mut self, state: State) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_display_text(mut self, text: impl Into<String>) -> Self {
        self.display_text = Some(text.into());
        self
    }

    /// Check every field that does not depend on the owning device
    pub(crate) fn validate(&self) -> Result<()> {
        let name = &self.name;
        if name.is_empty() {
            return Err(DeviceError::Endpoint(
                "endpoint is missing required field name".to_string(),
            ));
        }
        if name.trim() != name || name.contains([':', '*', '>', '\n']) {
            return Err(DeviceError::Endpoint(format!(
                "invalid endpoint name {:?}",
                name
            )));
        }
        if self.state.is_none() {
            return Err(DeviceError::Endpoint(format!(
                "endpoint {} is missing required field State",
                name
            )));
        }
        if let Some(uid) = self.uid {
            if uid == 0 || uid > u32::from(MAX_SUB_UID) {
                return Err(DeviceError::Endpoint(format!(
                    "endpoint {} uid {} is outside 1..={}",
                    name, uid, MAX_SUB_UID
                )));
            }
        }
        match self.level {
            Some(Level::Raw(_)) => {
                return Err(DeviceError::Endpoint(format!(
                    "endpoint {} level needs a denominator or %",
                    name
                )))
            }
            Some(Level::Ratio { denominator, .. }) if denominator <= 0 => {
                return Err(DeviceError::Endpoint(format!(
                    "endpoint {} level denominator must be positive",
                    name
                )))
            }
            _ => {}
        }
        for (field, text) in [("Text", &self.text), ("DisplayText", &self.display_text)] {
            if text.as_deref().is_some_and(|t| t.contains('\n')) {
                return Err(DeviceError::Endpoint(format!(
                    "endpoint {} {} must not include newlines",
                    name, field
                )));
            }
        }
        Ok(())
    }
}

/// A named input or output of a BSC device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    name: String,
    uid: u8,
    kind: EndpointKind,
    values: EndpointValues,
}

impl Endpoint {
    /// Build from a validated spec and an assigned sub-uid
    pub(crate) fn from_spec(spec: EndpointSpec, uid: u8) -> Self {
        Self {
            kind: if spec.output {
                EndpointKind::Output
            } else {
                EndpointKind::Input
            },
            values: EndpointValues {
                state: spec.state.unwrap_or_default(),
                level: spec.level,
                text: spec.text,
                display_text: spec.display_text,
            },
            name: spec.name,
            uid,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uid(&self) -> u8 {
        self.uid
    }

    pub fn kind(&self) -> EndpointKind {
        self.kind
    }

    pub fn is_output(&self) -> bool {
        self.kind == EndpointKind::Output
    }

    pub fn values(&self) -> &EndpointValues {
        &self.values
    }

    pub fn state(&self) -> State {
        self.values.state
    }

    pub fn level(&self) -> Option<Level> {
        self.values.level
    }

    pub fn text(&self) -> Option<&str> {
        self.values.text.as_deref()
    }

    pub fn display_text(&self) -> Option<&str> {
        self.values.display_text.as_deref()
    }

    pub(crate) fn values_mut(&mut self) -> &mut EndpointValues {
        &mut self.values
    }

    /// Apply the fields of a command block. Returns true if any value
    /// changed.
    pub fn apply(&mut self, block: &BscBlock) -> bool {
        let before = self.values.clone();
        let values = &mut self.values;

        // A command cannot make a state unknown
        match block.state {
            Some(BlockState::On) => values.state = State::On,
            Some(BlockState::Off) => values.state = State::Off,
            Some(BlockState::Toggle) => values.state = values.state.toggled(),
            Some(BlockState::Unknown) | None => {}
        }

        if let (Some(current), Some(incoming)) = (values.level, block.level) {
            values.level = Some(merge_level(current, incoming));
        }
        if let (Some(text), Some(incoming)) = (values.text.as_mut(), block.text()) {
            *text = incoming.to_string();
        }
        if let (Some(text), Some(incoming)) = (values.display_text.as_mut(), block.display_text()) {
            *text = incoming.to_string();
        }

        self.values != before
    }

    /// An info or event message describing this endpoint
    pub fn response(&self, device: &Address, uid: &Uid, event: bool) -> Result<BscResponse> {
        let source = device.for_endpoint(&self.name)?;
        let uid = uid.endpoint(self.uid);
        let direction = self.kind.direction();
        let mut response = if event {
            BscResponse::event(source, uid, direction)
        } else {
            BscResponse::info(source, uid, direction)
        };

        let block = response.block_mut();
        block.state = Some(self.values.state.into());
        block.level = self.values.level;
        if let Some(text) = &self.values.text {
            block.set_text(text.clone())?;
        }
        if let Some(text) = &self.values.display_text {
            block.set_display_text(text.clone())?;
        }
        Ok(response)
    }

    pub(crate) fn change(&self) -> EndpointChange {
        EndpointChange {
            name: self.name.clone(),
            uid: self.uid,
            values: self.values.clone(),
        }
    }
}

/// Merge an incoming level into an endpoint's level, keeping the
/// endpoint's unit
///
/// The endpoint's scale is its denominator, or 100 for a percentage. A
/// ratio or percentage is rescaled onto that scale (flooring); a bare
/// numerator replaces the endpoint's numerator as is.
pub fn merge_level(current: Level, incoming: Level) -> Level {
    let scale = match current {
        Level::Ratio { denominator, .. } => denominator,
        Level::Percent(_) | Level::Raw(_) => 100,
    };
    let numerator = match incoming {
        Level::Ratio {
            numerator,
            denominator,
        } => {
            if denominator <= 0 {
                return current;
            }
            numerator.saturating_mul(scale).div_euclid(denominator)
        }
        Level::Percent(percent) => percent.saturating_mul(scale).div_euclid(100),
        Level::Raw(numerator) => numerator,
    };
    current.with_numerator(numerator)
}
