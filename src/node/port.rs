//! Port descriptors advertised by a scriptable node.
//!
//! Ports are derived from the loaded script, so unlike statically declared
//! node ports they own their names. A [`PortList`] is rebuilt in full each
//! time a script is loaded and never edited in place.

use serde::{Deserialize, Serialize};

/// The kind of data flowing through a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortKind {
    /// One channel of audio samples.
    Audio,
    /// One event stream.
    Midi,
    /// A parameter value.
    Control,
}

/// Whether a port is an input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDirection {
    Input,
    Output,
}

impl PortDirection {
    #[inline]
    pub fn is_input(self) -> bool {
        self == PortDirection::Input
    }
}

/// Range information carried by control ports.
///
/// Not consumed by rendering; kept for editors and hosts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlRange {
    /// Unit label, e.g. "dB"
    pub label: String,
    /// Declared value type, e.g. "float"
    pub value_type: String,
    pub min: f64,
    pub max: f64,
    pub default: f64,
}

impl Default for ControlRange {
    fn default() -> Self {
        Self {
            label: String::new(),
            value_type: "float".to_string(),
            min: 0.0,
            max: 1.0,
            default: 1.0,
        }
    }
}

/// One typed, named, directional connection point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortDescriptor {
    /// Global index, unique within one port list
    pub index: u32,
    /// Running counter per (kind, direction), starting at 0
    pub channel: u32,
    pub kind: PortKind,
    /// Machine name
    pub symbol: String,
    /// Display name
    pub name: String,
    pub direction: PortDirection,
    /// Present for control ports only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control: Option<ControlRange>,
}

impl PortDescriptor {
    pub fn new(
        kind: PortKind,
        index: u32,
        channel: u32,
        symbol: impl Into<String>,
        name: impl Into<String>,
        direction: PortDirection,
    ) -> Self {
        Self {
            index,
            channel,
            kind,
            symbol: symbol.into(),
            name: name.into(),
            direction,
            control: None,
        }
    }

    pub fn with_control(mut self, range: ControlRange) -> Self {
        self.control = Some(range);
        self
    }

    #[inline]
    pub fn is_input(&self) -> bool {
        self.direction.is_input()
    }
}

/// Ordered sequence of port descriptors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortList {
    ports: Vec<PortDescriptor>,
}

impl PortList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, port: PortDescriptor) {
        self.ports.push(port);
    }

    pub fn clear(&mut self) {
        self.ports.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PortDescriptor> {
        self.ports.iter()
    }

    pub fn as_slice(&self) -> &[PortDescriptor] {
        &self.ports
    }

    pub fn get(&self, index: u32) -> Option<&PortDescriptor> {
        self.ports.iter().find(|p| p.index == index)
    }

    pub fn find_by_symbol(&self, symbol: &str) -> Option<&PortDescriptor> {
        self.ports.iter().find(|p| p.symbol == symbol)
    }

    /// Number of ports of one kind and direction.
    pub fn count(&self, kind: PortKind, direction: PortDirection) -> usize {
        self.ports
            .iter()
            .filter(|p| p.kind == kind && p.direction == direction)
            .count()
    }

    /// The larger of the input and output counts for a kind.
    pub fn max_channels(&self, kind: PortKind) -> usize {
        self.count(kind, PortDirection::Input)
            .max(self.count(kind, PortDirection::Output))
    }
}

impl<'a> IntoIterator for &'a PortList {
    type Item = &'a PortDescriptor;
    type IntoIter = std::slice::Iter<'a, PortDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.ports.iter()
    }
}
