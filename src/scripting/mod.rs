//! Rhai scripting for node scripts
//!
//! A node script defines the node's ports, parameters and signal processing
//! through a fixed set of functions:
//!
//! | Function | Called | Returns |
//! |---|---|---|
//! | `node_io_ports()` | once per load, while building ports | `#{audio_ins, audio_outs, midi_ins, midi_outs}` |
//! | `node_params()` | once per load, while building ports | array of `#{name, label, "type", flow, min, max, "default"}` |
//! | `node_prepare(rate, block)` | before the first render of an activation | nothing |
//! | `node_render(audio, midi)` | once per block | nothing; edits the buffers in place |
//! | `node_release()` | on deactivation | nothing |
//!
//! Only `node_render` is required. Every function runs with `this` bound to
//! an object map owned by the script's context, so state can be kept between
//! calls as `this.<field>`. Functions cannot see top-level variables.
//!
//! ## Example
//!
//! ```rhai
//! fn node_io_ports() {
//!     #{ audio_ins: 1, audio_outs: 1, midi_ins: 0, midi_outs: 0 }
//! }
//!
//! fn node_prepare(rate, block) {
//!     this.gain = db_to_gain(-3.0);
//! }
//!
//! fn node_render(audio, midi) {
//!     audio.apply_gain(this.gain);
//! }
//! ```

mod context;
mod engine;
mod validate;

pub use context::{ContextState, Hooks, ScriptContext};
pub use engine::{db_to_gain, gain_to_db, ScriptEngine};
pub use validate::validate;

/// Names of the functions a node script may define
pub mod hooks {
    pub const IO_PORTS: &str = "node_io_ports";
    pub const PARAMS: &str = "node_params";
    pub const PREPARE: &str = "node_prepare";
    pub const RENDER: &str = "node_render";
    pub const RELEASE: &str = "node_release";
}

/// Built-in node scripts
pub mod builtins {
    /// Script a fresh node starts with: stereo audio in and out, one MIDI
    /// input and one MIDI output. Clears the audio buffer and logs MIDI.
    pub const DEFAULT_SCRIPT: &str = r#"
// Script node template
//
// Stereo audio in and out with one MIDI input and one MIDI output. It clears
// the audio buffer and logs incoming MIDI messages.

fn node_io_ports() {
    #{
        audio_ins:  2,
        audio_outs: 2,
        midi_ins:   1,
        midi_outs:  1
    }
}

// Return parameters
fn node_params() {
    [
        #{
            name:      "Volume",
            label:     "dB",
            "type":    "float",
            flow:      "input",
            min:       -90.0,
            max:       24.0,
            "default": 0.0
        }
    ]
}

// prepare for rendering
fn node_prepare(rate, block) {
    print(`prepare rate = ${rate} block = ${block}`);
}

// render audio and midi
fn node_render(audio, midi) {
    audio.clear();
    for msg in midi.events(0) {
        print(msg);
    }
    midi.clear(0);
}

// free any allocated resources
fn node_release() {
}
"#;

    /// Stereo passthrough: declares ports and leaves the audio untouched.
    pub const PASSTHROUGH: &str = r#"
fn node_io_ports() {
    #{ audio_ins: 2, audio_outs: 2, midi_ins: 0, midi_outs: 0 }
}

fn node_render(audio, midi) {
}
"#;

    /// Stereo trim at a fixed -6 dB.
    pub const TRIM: &str = r#"
fn node_io_ports() {
    #{ audio_ins: 2, audio_outs: 2, midi_ins: 0, midi_outs: 0 }
}

fn node_params() {
    [
        #{ name: "Trim", label: "dB", flow: "input", min: -24.0, max: 0.0, "default": -6.0 }
    ]
}

fn node_prepare(rate, block) {
    this.gain = db_to_gain(-6.0);
}

fn node_render(audio, midi) {
    audio.apply_gain(this.gain);
}
"#;

    /// List of all built-in scripts with names
    pub fn all() -> Vec<(&'static str, &'static str)> {
        vec![
            ("default", DEFAULT_SCRIPT),
            ("passthrough", PASSTHROUGH),
            ("trim", TRIM),
        ]
    }

    /// Look up a built-in script by name
    pub fn get(name: &str) -> Option<&'static str> {
        all()
            .into_iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, source)| source)
    }
}
