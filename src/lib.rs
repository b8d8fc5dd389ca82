//! # Scriptable Node: script-defined audio processing
//!
//! A host-graph node whose ports, parameters and signal processing are defined
//! at runtime by a Rhai script. Candidate scripts are dry-run on a disposable
//! interpreter before they replace the one the render path is using.
//!
//! ## Architecture
//!
//! - **Render**: audio and MIDI buffers lent to scripts without copying
//! - **Scripting**: one Rhai interpreter per loaded script, its lifecycle and
//!   the validation dry run
//! - **Node**: the port builder, persisted state and the hot-swapping
//!   [`ScriptNode`] façade
//! - **Config**: validation block settings and interpreter limits (TOML)
//!
//! ## Configuration
//!
//! Settings are read from the platform config directory under
//! `scriptable-node/config.toml`; see [`config`] for the layout.
//!
//! ## Example
//!
//! ```ignore
//! use scriptable_node::{AudioBuffer, MidiPipe, ScriptNode};
//!
//! let node = ScriptNode::new();
//! node.load_script(my_script)?;
//! node.create_ports();
//!
//! node.prepare_to_render(48_000.0, 256)?;
//! let mut audio = AudioBuffer::new(2, 256);
//! let mut midi = MidiPipe::with_streams(1);
//! node.render(&mut audio, &mut midi)?;
//! node.release_resources()?;
//! ```

pub mod config;
pub mod error;
pub mod node;
pub mod render;
pub mod scripting;

// Re-export commonly used types
pub use config::NodeConfig;
pub use error::{NodeError, Result};
pub use node::{NodeEvent, PortDescriptor, PortKind, PortList, ScriptNode};
pub use render::{AudioBuffer, MidiEvent, MidiPipe};
pub use scripting::{validate, ScriptContext};
