//! Builds a node's port list from the script loaded into a context.
//!
//! Values returned by the declaration hooks are copied into plain
//! [`PortDescriptor`]s right away; nothing outside this module looks at the
//! interpreter's object model.

use crate::error::{NodeError, Result};
use crate::node::port::{ControlRange, PortDescriptor, PortDirection, PortKind, PortList};
use crate::scripting::{hooks, ScriptContext};
use rhai::{Array, Dynamic, Map};

/// Port counts declared by `node_io_ports()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoCounts {
    pub audio_ins: u32,
    pub audio_outs: u32,
    pub midi_ins: u32,
    pub midi_outs: u32,
}

impl IoCounts {
    fn from_map(map: &Map) -> Self {
        let field = |name: &str| -> u32 {
            map.get(name)
                .and_then(|v| v.as_int().ok())
                .map(|n| n.clamp(0, u32::MAX as i64) as u32)
                .unwrap_or(0)
        };
        Self {
            audio_ins: field("audio_ins"),
            audio_outs: field("audio_outs"),
            midi_ins: field("midi_ins"),
            midi_outs: field("midi_outs"),
        }
    }
}

/// Hands out global indices and per-group channel numbers.
#[derive(Default)]
struct Counter {
    index: u32,
}

impl Counter {
    fn next(&mut self) -> Result<u32> {
        let index = self.index;
        self.index = index
            .checked_add(1)
            .ok_or_else(|| NodeError::RuntimeFault("too many ports".to_string()))?;
        Ok(index)
    }
}

fn check_group_size(count: u32, cap: usize, what: &str) -> Result<()> {
    if count as usize > cap {
        return Err(NodeError::RuntimeFault(format!(
            "script declares {} {} (limit is {})",
            count, what, cap
        )));
    }
    Ok(())
}

/// Derive the full port list of the script loaded in `context`.
///
/// Returns an empty list if nothing is loaded. A declaration hook that faults
/// or returns the wrong shape contributes no further ports, but a parameter
/// with a `flow` other than `"input"` or `"output"` is rejected, as is any
/// group larger than `max_ports_per_group`.
pub fn build_ports(context: &mut ScriptContext) -> Result<PortList> {
    let mut ports = PortList::new();
    if !context.ready() {
        return Ok(ports);
    }

    let cap = context.limits().max_ports_per_group;
    let mut counter = Counter::default();
    let io = read_io_counts(context);
    let groups = [
        (PortKind::Audio, PortDirection::Input, io.audio_ins, "in", "In"),
        (PortKind::Audio, PortDirection::Output, io.audio_outs, "out", "Out"),
        (PortKind::Midi, PortDirection::Input, io.midi_ins, "midi_in", "MIDI In"),
        (PortKind::Midi, PortDirection::Output, io.midi_outs, "midi_out", "MIDI Out"),
    ];
    for (_, _, count, symbol, _) in &groups {
        check_group_size(*count, cap, &format!("{} ports", symbol))?;
    }
    for (kind, direction, count, symbol, name) in groups {
        add_io_group(&mut ports, &mut counter, kind, direction, count, symbol, name)?;
    }

    add_params(&mut ports, &mut counter, context, cap)?;

    tracing::debug!("Built {} ports from script", ports.len());
    Ok(ports)
}

/// Read the IO declaration, treating faults and bad shapes as zero ports.
pub fn read_io_counts(context: &mut ScriptContext) -> IoCounts {
    let value = match context.declaration(hooks::IO_PORTS) {
        None => return IoCounts::default(),
        Some(Ok(value)) => value,
        Some(Err(e)) => {
            tracing::warn!("{}() failed: {}", hooks::IO_PORTS, e);
            return IoCounts::default();
        }
    };

    let table = if value.is_array() {
        value
            .into_array()
            .ok()
            .and_then(|a| a.into_iter().next())
            .and_then(|first| first.try_cast::<Map>())
    } else {
        value.try_cast::<Map>()
    };

    match table {
        Some(map) => IoCounts::from_map(&map),
        None => {
            tracing::warn!("{}() did not return a map", hooks::IO_PORTS);
            IoCounts::default()
        }
    }
}

fn add_io_group(
    ports: &mut PortList,
    counter: &mut Counter,
    kind: PortKind,
    direction: PortDirection,
    count: u32,
    symbol: &str,
    name: &str,
) -> Result<()> {
    for channel in 0..count {
        let n = channel + 1;
        ports.add(PortDescriptor::new(
            kind,
            counter.next()?,
            channel,
            format!("{}_{}", symbol, n),
            format!("{} {}", name, n),
            direction,
        ));
    }
    Ok(())
}

fn add_params(
    ports: &mut PortList,
    counter: &mut Counter,
    context: &mut ScriptContext,
    cap: usize,
) -> Result<()> {
    let value = match context.declaration(hooks::PARAMS) {
        None => return Ok(()),
        Some(Ok(value)) => value,
        Some(Err(e)) => {
            tracing::warn!("{}() failed: {}", hooks::PARAMS, e);
            return Ok(());
        }
    };
    let Some(entries) = value.try_cast::<Array>() else {
        tracing::warn!("{}() did not return an array", hooks::PARAMS);
        return Ok(());
    };

    let mut inputs = 0u32;
    let mut outputs = 0u32;
    for entry in entries {
        let Some(map) = entry.try_cast::<Map>() else {
            tracing::warn!("{}() entry is not a map; ignoring the rest", hooks::PARAMS);
            break;
        };
        let param = Param::from_map(&map)?;
        let (channel, what) = match param.direction {
            PortDirection::Input => (&mut inputs, "input parameters"),
            PortDirection::Output => (&mut outputs, "output parameters"),
        };
        check_group_size(*channel + 1, cap, what)?;
        ports.add(
            PortDescriptor::new(
                PortKind::Control,
                counter.next()?,
                *channel,
                param.symbol(),
                param.name,
                param.direction,
            )
            .with_control(param.range),
        );
        *channel += 1;
    }
    Ok(())
}

struct Param {
    name: String,
    direction: PortDirection,
    range: ControlRange,
}

impl Param {
    fn from_map(map: &Map) -> Result<Self> {
        let defaults = ControlRange::default();
        let name = text(map, "name").unwrap_or_else(|| "Param".to_string());
        let direction = match text(map, "flow").as_deref() {
            None | Some("input") => PortDirection::Input,
            Some("output") => PortDirection::Output,
            Some(other) => {
                return Err(NodeError::RuntimeFault(format!(
                    "parameter '{}' has invalid flow '{}' (expected \"input\" or \"output\")",
                    name, other
                )))
            }
        };
        let range = ControlRange {
            label: text(map, "label").unwrap_or(defaults.label),
            value_type: text(map, "type").unwrap_or(defaults.value_type),
            min: number(map, "min").unwrap_or(defaults.min),
            max: number(map, "max").unwrap_or(defaults.max),
            default: number(map, "default").unwrap_or(defaults.default),
        };
        Ok(Self {
            name,
            direction,
            range,
        })
    }

    fn symbol(&self) -> String {
        self.name.trim().to_lowercase().replace(' ', "_")
    }
}

fn text(map: &Map, key: &str) -> Option<String> {
    map.get(key).and_then(|v| v.clone().into_string().ok())
}

fn number(map: &Map, key: &str) -> Option<f64> {
    let value: &Dynamic = map.get(key)?;
    value
        .as_float()
        .ok()
        .or_else(|| value.as_int().ok().map(|n| n as f64))
}
