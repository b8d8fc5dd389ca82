//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use scriptable_node::{AudioBuffer, MidiPipe, PortKind, PortList};
use std::io;
use std::sync::{Arc, Mutex};

/// Test block size
pub const BLOCK: usize = 64;

/// Test sample rate
pub const RATE: f64 = 48_000.0;

/// Buffers shaped for a port list, like a host would allocate them
pub fn buffers_for(ports: &PortList) -> (AudioBuffer, MidiPipe) {
    (
        AudioBuffer::new(ports.max_channels(PortKind::Audio).max(1), BLOCK),
        MidiPipe::with_streams(ports.max_channels(PortKind::Midi)),
    )
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Log sink shared between a test and its subscriber
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with logs (including script `print` output) captured
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let capture = LogCapture::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, capture.contents())
}
