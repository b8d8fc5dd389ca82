//! Planar audio sample buffer.

/// Non-interleaved audio buffer: `channels` runs of `frames` samples stored
/// back to back in one allocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioBuffer {
    data: Vec<f32>,
    channels: usize,
    frames: usize,
}

impl AudioBuffer {
    /// Allocate a zeroed buffer.
    pub fn new(channels: usize, frames: usize) -> Self {
        Self {
            data: vec![0.0; channels * frames],
            channels,
            frames,
        }
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn num_frames(&self) -> usize {
        self.frames
    }

    /// Zero every channel.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// Zero one channel. Out-of-range channels are ignored.
    pub fn clear_channel(&mut self, channel: usize) {
        if let Some(samples) = self.channel_mut(channel) {
            samples.fill(0.0);
        }
    }

    pub fn channel(&self, channel: usize) -> Option<&[f32]> {
        if channel >= self.channels {
            return None;
        }
        let start = channel * self.frames;
        Some(&self.data[start..start + self.frames])
    }

    pub fn channel_mut(&mut self, channel: usize) -> Option<&mut [f32]> {
        if channel >= self.channels {
            return None;
        }
        let start = channel * self.frames;
        Some(&mut self.data[start..start + self.frames])
    }

    pub fn sample(&self, channel: usize, frame: usize) -> Option<f32> {
        if frame >= self.frames {
            return None;
        }
        self.channel(channel).map(|samples| samples[frame])
    }

    /// Write one sample. Returns false when the position is out of range.
    pub fn set_sample(&mut self, channel: usize, frame: usize, value: f32) -> bool {
        if frame >= self.frames {
            return false;
        }
        match self.channel_mut(channel) {
            Some(samples) => {
                samples[frame] = value;
                true
            }
            None => false,
        }
    }

    /// Scale every sample.
    pub fn apply_gain(&mut self, gain: f32) {
        for sample in &mut self.data {
            *sample *= gain;
        }
    }

    /// Fill every channel with `value`.
    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }
}
