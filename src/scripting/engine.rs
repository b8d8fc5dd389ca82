//! Rhai Script Engine Implementation
//!
//! This module builds the interpreter each script context owns.
//!
//! ## Render API
//!
//! `AudioBuffer` (the `audio` argument of `node_render`):
//! - `audio.channels`, `audio.frames` - buffer shape
//! - `audio.clear()` / `audio.clear(ch)` - zero all channels or one
//! - `audio.get(ch, frame)` / `audio.set(ch, frame, value)` - sample access
//! - `audio.apply_gain(gain)` / `audio.apply_gain(ch, gain)` - scale samples
//!
//! `MidiPipe` (the `midi` argument of `node_render`):
//! - `midi.size` - number of event streams
//! - `midi.count(i)` - events in stream `i`
//! - `midi.events(i)` - array of `#{frame, status, data1, data2, size}`
//! - `midi.clear(i)` - drop all events of stream `i`
//! - `midi.push(i, frame, status, data1, data2)` - add an event
//!
//! ## Helpers
//!
//! - `db_to_gain(db)` / `gain_to_db(gain)` - level conversions
//!
//! Indices out of range raise a script error. `print` and `debug` output is
//! forwarded to `tracing` under the `script` target.

use crate::config::EngineLimits;
use crate::error::{NodeError, Result};
use crate::render::{MidiEvent, ScriptAudio, ScriptMidi};
use rhai::{
    Array, CallFnOptions, Dynamic, Engine, EvalAltResult, FuncArgs, Map, Scope, AST, FLOAT, INT,
};

/// Rhai engine configured with the render API and safety limits.
pub struct ScriptEngine {
    engine: Engine,
}

impl ScriptEngine {
    /// Create an engine with the given limits
    pub fn new(limits: &EngineLimits) -> Self {
        let mut engine = Engine::new();
        Self::configure_engine(&mut engine, limits);
        Self { engine }
    }

    fn configure_engine(engine: &mut Engine, limits: &EngineLimits) {
        engine.set_max_operations(limits.max_operations);
        engine.set_max_call_levels(limits.max_call_levels);
        engine.set_max_expr_depths(limits.max_expr_depth, limits.max_function_expr_depth);
        engine.set_max_string_size(limits.max_string_size);
        engine.set_max_array_size(limits.max_array_size);
        engine.set_max_map_size(limits.max_map_size);

        engine.on_print(|text| tracing::info!(target: "script", "{}", text));
        engine.on_debug(|text, source, pos| {
            tracing::debug!(target: "script", "[{}:{}] {}", source.unwrap_or("script"), pos, text)
        });

        Self::register_audio(engine);
        Self::register_midi(engine);

        engine.register_fn("db_to_gain", |db: FLOAT| -> FLOAT { db_to_gain(db) });
        engine.register_fn("db_to_gain", |db: INT| -> FLOAT { db_to_gain(db as FLOAT) });
        engine.register_fn("gain_to_db", |gain: FLOAT| -> FLOAT { gain_to_db(gain) });
    }

    fn register_audio(engine: &mut Engine) {
        engine
            .register_type_with_name::<ScriptAudio>("AudioBuffer")
            .register_get("channels", |a: &mut ScriptAudio| a.channels() as INT)
            .register_get("frames", |a: &mut ScriptAudio| a.frames() as INT)
            .register_fn("clear", |a: &mut ScriptAudio| a.clear())
            .register_fn(
                "clear",
                |a: &mut ScriptAudio, ch: INT| -> std::result::Result<(), Box<EvalAltResult>> {
                    Ok(a.clear_channel(ch)?)
                },
            )
            .register_fn(
                "get",
                |a: &mut ScriptAudio,
                 ch: INT,
                 frame: INT|
                 -> std::result::Result<FLOAT, Box<EvalAltResult>> { Ok(a.get(ch, frame)?) },
            )
            .register_fn(
                "set",
                |a: &mut ScriptAudio,
                 ch: INT,
                 frame: INT,
                 value: FLOAT|
                 -> std::result::Result<(), Box<EvalAltResult>> {
                    Ok(a.set(ch, frame, value)?)
                },
            )
            .register_fn("apply_gain", |a: &mut ScriptAudio, gain: FLOAT| {
                a.apply_gain(gain)
            })
            .register_fn(
                "apply_gain",
                |a: &mut ScriptAudio,
                 ch: INT,
                 gain: FLOAT|
                 -> std::result::Result<(), Box<EvalAltResult>> {
                    Ok(a.apply_channel_gain(ch, gain)?)
                },
            );
    }

    fn register_midi(engine: &mut Engine) {
        engine
            .register_type_with_name::<ScriptMidi>("MidiPipe")
            .register_get("size", |m: &mut ScriptMidi| m.size() as INT)
            .register_fn(
                "count",
                |m: &mut ScriptMidi, stream: INT| -> std::result::Result<INT, Box<EvalAltResult>> {
                    Ok(m.count(stream)? as INT)
                },
            )
            .register_fn(
                "events",
                |m: &mut ScriptMidi,
                 stream: INT|
                 -> std::result::Result<Array, Box<EvalAltResult>> {
                    let events = m.events(stream)?;
                    Ok(events.iter().map(event_to_dynamic).collect())
                },
            )
            .register_fn(
                "clear",
                |m: &mut ScriptMidi, stream: INT| -> std::result::Result<(), Box<EvalAltResult>> {
                    Ok(m.clear(stream)?)
                },
            )
            .register_fn(
                "push",
                |m: &mut ScriptMidi,
                 stream: INT,
                 frame: INT,
                 status: INT,
                 data1: INT,
                 data2: INT|
                 -> std::result::Result<(), Box<EvalAltResult>> {
                    let event = MidiEvent::new(
                        frame.clamp(0, u32::MAX as INT) as u32,
                        [status as u8, (data1 & 0x7F) as u8, (data2 & 0x7F) as u8],
                    );
                    Ok(m.push(stream, event)?)
                },
            );
    }

    /// Compile a script. Parse errors become `LoadFailed`.
    pub fn compile(&self, source: &str) -> Result<AST> {
        self.engine
            .compile(source)
            .map_err(|e| NodeError::LoadFailed(e.to_string()))
    }

    /// Run a script's top-level statements once, leaving its globals in `scope`.
    pub fn run_top_level(&self, scope: &mut Scope<'static>, ast: &AST) -> Result<()> {
        self.engine
            .run_ast_with_scope(scope, ast)
            .map_err(|e| NodeError::LoadFailed(e.to_string()))
    }

    /// Call a script function with `this` bound to the context's state object.
    ///
    /// Top-level statements are not re-run and the scope is rewound afterwards.
    pub fn call_hook(
        &self,
        scope: &mut Scope<'static>,
        ast: &AST,
        this: &mut Dynamic,
        name: &str,
        args: impl FuncArgs,
    ) -> std::result::Result<Dynamic, Box<EvalAltResult>> {
        let options = CallFnOptions::new()
            .eval_ast(false)
            .rewind_scope(true)
            .bind_this_ptr(this);
        self.engine
            .call_fn_with_options::<Dynamic>(options, scope, ast, name, args)
    }

    /// Get a reference to the underlying Rhai engine
    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new(&EngineLimits::default())
    }
}

impl std::fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEngine")
            .field("max_operations", &self.engine.max_operations())
            .finish()
    }
}

pub fn db_to_gain(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

pub fn gain_to_db(gain: f64) -> f64 {
    if gain > 0.0 {
        20.0 * gain.log10()
    } else {
        f64::NEG_INFINITY
    }
}

fn event_to_dynamic(event: &MidiEvent) -> Dynamic {
    let mut map = Map::new();
    map.insert("frame".into(), Dynamic::from(event.frame as INT));
    map.insert("status".into(), Dynamic::from(event.data[0] as INT));
    map.insert("data1".into(), Dynamic::from(event.data[1] as INT));
    map.insert("data2".into(), Dynamic::from(event.data[2] as INT));
    map.insert("size".into(), Dynamic::from(event.len as INT));
    Dynamic::from(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{AudioBuffer, MidiPipe, RenderBridge};

    fn call_render(source: &str, audio: &mut AudioBuffer, midi: &mut MidiPipe) -> Dynamic {
        let engine = ScriptEngine::default();
        let ast = engine.compile(source).unwrap();
        let mut scope = Scope::new();
        let mut this = Dynamic::from(Map::new());
        let bridge = RenderBridge::new();
        bridge
            .lend(audio, midi, |a, m| {
                engine.call_hook(&mut scope, &ast, &mut this, "node_render", (a, m))
            })
            .unwrap()
    }

    #[test]
    fn test_level_helpers() {
        let engine = ScriptEngine::default();
        let unity: FLOAT = engine.engine().eval("db_to_gain(0.0)").unwrap();
        assert!((unity - 1.0).abs() < 1e-12);
        let half: FLOAT = engine.engine().eval("db_to_gain(-6)").unwrap();
        assert!((half - 0.501).abs() < 0.001);
        assert_eq!(gain_to_db(0.0), f64::NEG_INFINITY);
        assert!((gain_to_db(10.0) - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_audio_api() {
        let mut audio = AudioBuffer::new(2, 8);
        audio.fill(1.0);
        let mut midi = MidiPipe::default();

        let result = call_render(
            r#"
fn node_render(audio, midi) {
    audio.clear(0);
    audio.apply_gain(1, 0.5);
    audio.set(0, 7, audio.get(1, 7) * 2.0);
    audio.channels * 100 + audio.frames
}
"#,
            &mut audio,
            &mut midi,
        );

        assert_eq!(result.as_int().unwrap(), 208);
        assert_eq!(audio.sample(0, 0), Some(0.0));
        assert_eq!(audio.sample(1, 3), Some(0.5));
        assert_eq!(audio.sample(0, 7), Some(1.0));
    }

    #[test]
    fn test_midi_api() {
        let mut audio = AudioBuffer::default();
        let mut midi = MidiPipe::with_streams(2);
        midi.stream_mut(0)
            .unwrap()
            .push(MidiEvent::note_on(3, 0, 60, 100));

        call_render(
            r#"
fn node_render(audio, midi) {
    for msg in midi.events(0) {
        midi.push(1, msg.frame, msg.status, msg.data1 + 12, msg.data2);
    }
    midi.clear(0);
}
"#,
            &mut audio,
            &mut midi,
        );

        assert!(midi.stream(0).unwrap().is_empty());
        let out = midi.stream(1).unwrap().as_slice();
        assert_eq!(out, &[MidiEvent::new(3, [0x90, 72, 100])]);
    }

    #[test]
    fn test_out_of_range_is_script_error() {
        let engine = ScriptEngine::default();
        let ast = engine
            .compile("fn node_render(audio, midi) { audio.set(5, 0, 1.0); }")
            .unwrap();
        let mut scope = Scope::new();
        let mut this = Dynamic::from(Map::new());
        let bridge = RenderBridge::new();
        let mut audio = AudioBuffer::new(1, 4);
        let mut midi = MidiPipe::default();

        let result = bridge.lend(&mut audio, &mut midi, |a, m| {
            engine.call_hook(&mut scope, &ast, &mut this, "node_render", (a, m))
        });
        let message = result.unwrap_err().to_string();
        assert!(message.contains("out of range"), "{}", message);
    }

    #[test]
    fn test_operation_limit() {
        let limits = EngineLimits {
            max_operations: 1_000,
            ..EngineLimits::default()
        };
        let engine = ScriptEngine::new(&limits);
        let result = engine.engine().run("loop { }");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_error_is_load_failed() {
        let engine = ScriptEngine::default();
        let err = engine.compile("fn node_render(audio, midi) {").unwrap_err();
        assert!(matches!(err, NodeError::LoadFailed(_)));
    }
}
