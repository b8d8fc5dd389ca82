//! Event streams delivered alongside audio.
//!
//! A [`MidiPipe`] is an indexed set of [`MidiBuffer`]s, one per event stream
//! the node declares. Events inside a buffer are ordered by frame offset.

/// One short MIDI message at a frame offset inside the current block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MidiEvent {
    pub frame: u32,
    pub data: [u8; 3],
    pub len: u8,
}

impl MidiEvent {
    #[inline]
    pub fn new(frame: u32, data: [u8; 3]) -> Self {
        Self {
            frame,
            data,
            len: 3,
        }
    }

    pub fn note_on(frame: u32, channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(frame, [0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F])
    }

    pub fn note_off(frame: u32, channel: u8, note: u8) -> Self {
        Self::new(frame, [0x80 | (channel & 0x0F), note & 0x7F, 0])
    }

    #[inline]
    pub fn status(&self) -> u8 {
        self.data[0]
    }
}

/// Ordered events of one stream for one block.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MidiBuffer {
    events: Vec<MidiEvent>,
}

impl MidiBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
        }
    }

    /// Insert keeping frame order; events at the same frame keep arrival order.
    pub fn push(&mut self, event: MidiEvent) {
        let at = self
            .events
            .partition_point(|existing| existing.frame <= event.frame);
        self.events.insert(at, event);
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MidiEvent> {
        self.events.iter()
    }

    pub fn as_slice(&self) -> &[MidiEvent] {
        &self.events
    }
}

/// Indexed set of event streams.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MidiPipe {
    buffers: Vec<MidiBuffer>,
}

impl MidiPipe {
    /// A pipe with `streams` empty buffers.
    pub fn with_streams(streams: usize) -> Self {
        Self {
            buffers: vec![MidiBuffer::default(); streams],
        }
    }

    pub fn from_buffers(buffers: Vec<MidiBuffer>) -> Self {
        Self { buffers }
    }

    /// Number of streams.
    #[inline]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn stream(&self, index: usize) -> Option<&MidiBuffer> {
        self.buffers.get(index)
    }

    pub fn stream_mut(&mut self, index: usize) -> Option<&mut MidiBuffer> {
        self.buffers.get_mut(index)
    }

    /// Empty every stream, keeping their capacity.
    pub fn clear(&mut self) {
        for buffer in &mut self.buffers {
            buffer.clear();
        }
    }
}
