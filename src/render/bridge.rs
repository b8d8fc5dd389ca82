//! Lending host buffers to a script without copying samples.
//!
//! Rhai only accepts `'static` values, so a script can't borrow the host's
//! `&mut AudioBuffer` directly. Instead each context owns a `RenderBridge`
//! with two shared handles allocated up front. For the duration of one render
//! call the host buffers are moved into the handles with `mem::swap` (three
//! words each, no sample copy, no allocation) and moved back afterwards.

use crate::render::{AudioBuffer, MidiEvent, MidiPipe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Script-side handle to the block's audio buffer.
#[derive(Clone, Default)]
pub struct ScriptAudio(Arc<Mutex<AudioBuffer>>);

/// Script-side handle to the block's event streams.
#[derive(Clone, Default)]
pub struct ScriptMidi(Arc<Mutex<MidiPipe>>);

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // a poisoned handle still holds the host's storage; keep using it
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn channel_index(value: i64, limit: usize, what: &str) -> Result<usize, String> {
    usize::try_from(value)
        .ok()
        .filter(|v| *v < limit)
        .ok_or_else(|| format!("{} {} out of range (0..{})", what, value, limit))
}

impl ScriptAudio {
    fn swap(&self, host: &mut AudioBuffer) {
        std::mem::swap(&mut *lock(&self.0), host);
    }

    pub fn channels(&self) -> usize {
        lock(&self.0).num_channels()
    }

    pub fn frames(&self) -> usize {
        lock(&self.0).num_frames()
    }

    pub fn clear(&self) {
        lock(&self.0).clear();
    }

    pub fn clear_channel(&self, channel: i64) -> Result<(), String> {
        let mut buffer = lock(&self.0);
        let channel = channel_index(channel, buffer.num_channels(), "channel")?;
        buffer.clear_channel(channel);
        Ok(())
    }

    pub fn get(&self, channel: i64, frame: i64) -> Result<f64, String> {
        let buffer = lock(&self.0);
        let channel = channel_index(channel, buffer.num_channels(), "channel")?;
        let frame = channel_index(frame, buffer.num_frames(), "frame")?;
        Ok(buffer.sample(channel, frame).unwrap_or_default() as f64)
    }

    pub fn set(&self, channel: i64, frame: i64, value: f64) -> Result<(), String> {
        let mut buffer = lock(&self.0);
        let channel = channel_index(channel, buffer.num_channels(), "channel")?;
        let frame = channel_index(frame, buffer.num_frames(), "frame")?;
        buffer.set_sample(channel, frame, value as f32);
        Ok(())
    }

    pub fn apply_gain(&self, gain: f64) {
        lock(&self.0).apply_gain(gain as f32);
    }

    pub fn apply_channel_gain(&self, channel: i64, gain: f64) -> Result<(), String> {
        let mut buffer = lock(&self.0);
        let channel = channel_index(channel, buffer.num_channels(), "channel")?;
        if let Some(samples) = buffer.channel_mut(channel) {
            for sample in samples {
                *sample *= gain as f32;
            }
        }
        Ok(())
    }
}

impl ScriptMidi {
    fn swap(&self, host: &mut MidiPipe) {
        std::mem::swap(&mut *lock(&self.0), host);
    }

    pub fn size(&self) -> usize {
        lock(&self.0).len()
    }

    pub fn count(&self, stream: i64) -> Result<usize, String> {
        let pipe = lock(&self.0);
        let stream = channel_index(stream, pipe.len(), "stream")?;
        Ok(pipe.stream(stream).map(|b| b.len()).unwrap_or_default())
    }

    /// Copy of one stream's events, for iteration inside the script.
    pub fn events(&self, stream: i64) -> Result<Vec<MidiEvent>, String> {
        let pipe = lock(&self.0);
        let stream = channel_index(stream, pipe.len(), "stream")?;
        Ok(pipe
            .stream(stream)
            .map(|b| b.as_slice().to_vec())
            .unwrap_or_default())
    }

    pub fn clear(&self, stream: i64) -> Result<(), String> {
        let mut pipe = lock(&self.0);
        let stream = channel_index(stream, pipe.len(), "stream")?;
        if let Some(buffer) = pipe.stream_mut(stream) {
            buffer.clear();
        }
        Ok(())
    }

    pub fn push(&self, stream: i64, event: MidiEvent) -> Result<(), String> {
        let mut pipe = lock(&self.0);
        let stream = channel_index(stream, pipe.len(), "stream")?;
        if let Some(buffer) = pipe.stream_mut(stream) {
            buffer.push(event);
        }
        Ok(())
    }
}

/// Pre-allocated handles one context lends host buffers through.
#[derive(Default)]
pub struct RenderBridge {
    audio: ScriptAudio,
    midi: ScriptMidi,
}

impl RenderBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the host buffers into the script handles, run `f`, move them back.
    ///
    /// The buffers are returned to the host whatever `f` returns.
    pub fn lend<R>(
        &self,
        audio: &mut AudioBuffer,
        midi: &mut MidiPipe,
        f: impl FnOnce(ScriptAudio, ScriptMidi) -> R,
    ) -> R {
        self.audio.swap(audio);
        self.midi.swap(midi);
        let result = f(self.audio.clone(), self.midi.clone());
        self.audio.swap(audio);
        self.midi.swap(midi);
        result
    }
}
