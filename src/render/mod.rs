//! Render buffers handed to node scripts.
//!
//! - [`AudioBuffer`] - planar sample storage owned by the host
//! - [`MidiPipe`] - indexed event streams for one block
//! - [`RenderBridge`] - lends both to a script for one call without copying

pub mod audio;
pub mod bridge;
pub mod midi;

pub use audio::AudioBuffer;
pub use bridge::{RenderBridge, ScriptAudio, ScriptMidi};
pub use midi::{MidiBuffer, MidiEvent, MidiPipe};
