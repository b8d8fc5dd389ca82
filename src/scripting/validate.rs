//! Dry run of a candidate script on a disposable context.

use crate::config::{EngineLimits, ValidationSettings};
use crate::error::{NodeError, Result};
use crate::node::builder::build_ports;
use crate::node::port::PortKind;
use crate::render::{AudioBuffer, MidiPipe};
use crate::scripting::ScriptContext;

/// Prove that `source` can load, declare its ports, prepare, render one block
/// and release.
///
/// Runs entirely on a throwaway context and buffers; nothing here touches a
/// live node. Load problems are reported as `LoadFailed`, faults raised while
/// the script runs as `RuntimeFault`.
pub fn validate(
    source: &str,
    settings: &ValidationSettings,
    limits: &EngineLimits,
) -> Result<()> {
    if source.trim().is_empty() {
        return Err(NodeError::EmptyScript);
    }

    let mut context = ScriptContext::new(limits);
    context.load(source)?;

    let ports = build_ports(&mut context).map_err(as_runtime_fault)?;
    let audio_channels = ports.max_channels(PortKind::Audio).max(1);
    let midi_streams = ports.max_channels(PortKind::Midi);
    let mut audio = AudioBuffer::new(audio_channels, settings.block_size);
    let mut midi = MidiPipe::with_streams(midi_streams);

    tracing::debug!(
        "Dry run: {} ports, {}x{} audio, {} MIDI streams @ {} Hz",
        ports.len(),
        audio_channels,
        settings.block_size,
        midi_streams,
        settings.sample_rate
    );

    context
        .prepare(settings.sample_rate, settings.block_size)
        .map_err(as_runtime_fault)?;
    let rendered = context.render(&mut audio, &mut midi).map_err(as_runtime_fault);
    // release even after a failed render so the script can clean up
    let released = context.release().map_err(as_runtime_fault);
    rendered?;
    released
}

fn as_runtime_fault(err: NodeError) -> NodeError {
    match err {
        NodeError::RuntimeFault(_) => err,
        other => NodeError::RuntimeFault(other.to_string()),
    }
}
