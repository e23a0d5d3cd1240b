//! PCM framing and presentation timestamp reconciliation.
//!
//! Everything here is pure: payload lengths go in, frame counts and
//! presentation timestamps come out. The pipeline owns one [`StreamSession`]
//! per active stream.

use tracing::{info, warn};

use super::{PcmFormat, gst_sample_format, raw_caps};

const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// Result of checking one payload against the active frame layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// The payload divides into whole frames.
    Frames {
        /// Bytes per interleaved frame
        frame_size: usize,
        /// Number of frames in the payload
        frames: usize,
        /// The 24-bit container size changed while classifying this payload
        layout_changed: bool,
    },
    /// The payload cannot be interpreted and must be dropped.
    Invalid,
}

/// Tracks the container size of 24-bit samples.
///
/// Servers may send 24-bit audio either packed into 3 bytes or padded into
/// 4. The only signal is whether the payload length divides evenly, so the
/// classifier flips between the two layouts on the first chunk that only
/// fits the other one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameClassifier {
    bytes_per_sample_override: Option<usize>,
}

impl FrameClassifier {
    /// Active override, `Some(4)` while 24-bit audio arrives padded.
    pub fn bytes_per_sample_override(&self) -> Option<usize> {
        self.bytes_per_sample_override
    }

    /// Bytes per sample after applying the override.
    pub fn bytes_per_sample(&self, format: &PcmFormat) -> usize {
        match self.bytes_per_sample_override {
            Some(bytes) if format.bit_depth == 24 => bytes,
            _ => format.bytes_per_sample(),
        }
    }

    /// `channels * bytes_per_sample` under the active layout.
    pub fn frame_size(&self, format: &PcmFormat) -> usize {
        usize::from(format.channels) * self.bytes_per_sample(format)
    }

    /// GStreamer sample format matching the active layout.
    pub fn sample_format(&self, format: &PcmFormat) -> &'static str {
        gst_sample_format(format.bit_depth, Some(self.bytes_per_sample(format)))
    }

    /// Caps string describing the source under the active layout.
    pub fn caps(&self, format: &PcmFormat) -> String {
        raw_caps(
            self.sample_format(format),
            format.channels,
            format.sample_rate,
        )
    }

    /// Classifies a payload of `len` bytes.
    ///
    /// For 24-bit streams a mismatching length is retried as packed 3-byte
    /// samples, then as 4-byte containers; the first interpretation that
    /// divides evenly becomes the active layout.
    pub fn classify(&mut self, format: &PcmFormat, len: usize) -> Framing {
        let frame_size = self.frame_size(format);
        if frame_size == 0 || len == 0 {
            return Framing::Invalid;
        }
        if len % frame_size == 0 {
            return Framing::Frames {
                frame_size,
                frames: len / frame_size,
                layout_changed: false,
            };
        }
        if format.bit_depth != 24 {
            return Framing::Invalid;
        }

        let current = self.bytes_per_sample(format);
        for bytes in [3usize, 4] {
            let candidate = usize::from(format.channels) * bytes;
            if bytes == current || len % candidate != 0 {
                continue;
            }
            self.bytes_per_sample_override = (bytes == 4).then_some(4);
            return Framing::Frames {
                frame_size: candidate,
                frames: len / candidate,
                layout_changed: true,
            };
        }

        Framing::Invalid
    }

    /// Returns to the nominal packed layout.
    pub fn reset(&mut self) {
        self.bytes_per_sample_override = None;
    }
}

/// Keeps presentation timestamps strictly increasing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimestampReconciler {
    stream_start_us: Option<i64>,
    last_presentation_ns: Option<u64>,
}

impl TimestampReconciler {
    /// Arrival timestamp of the first chunk since the last reset.
    pub fn stream_start_us(&self) -> Option<i64> {
        self.stream_start_us
    }

    /// Most recent presentation timestamp handed out.
    pub fn last_presentation_ns(&self) -> Option<u64> {
        self.last_presentation_ns
    }

    /// Computes the presentation timestamp for a chunk.
    ///
    /// The candidate is the chunk's offset from the first chunk, clamped at
    /// zero. A candidate that does not advance past the previous timestamp
    /// is forced to `previous + duration_ns`.
    pub fn next(&mut self, timestamp_us: i64, duration_ns: u64) -> u64 {
        let start = *self.stream_start_us.get_or_insert(timestamp_us);
        let offset_us = timestamp_us.saturating_sub(start).max(0);
        let mut candidate = u64::try_from(offset_us)
            .unwrap_or(0)
            .saturating_mul(1_000);

        if let Some(last) = self.last_presentation_ns {
            if candidate <= last {
                candidate = last.saturating_add(duration_ns);
            }
        }

        self.last_presentation_ns = Some(candidate);
        candidate
    }

    /// Forgets the stream origin and the last timestamp.
    pub fn reset(&mut self) {
        self.stream_start_us = None;
        self.last_presentation_ns = None;
    }
}

/// A payload that passed validation, ready to be pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedChunk {
    /// Presentation timestamp in nanoseconds
    pub pts_ns: u64,
    /// Duration derived from the frame count
    pub duration_ns: u64,
    /// Frames in the payload
    pub frames: usize,
    /// New source caps when the 24-bit layout changed
    pub caps_update: Option<String>,
}

/// Per-stream framing state.
///
/// Created when a stream starts; flushed on discontinuities and dropped when
/// the stream or the pipeline ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSession {
    format: PcmFormat,
    classifier: FrameClassifier,
    clock: TimestampReconciler,
}

impl StreamSession {
    /// Starts a session for `format`.
    pub fn new(format: PcmFormat) -> Self {
        Self {
            format,
            classifier: FrameClassifier::default(),
            clock: TimestampReconciler::default(),
        }
    }

    /// Stream format of this session.
    pub fn format(&self) -> PcmFormat {
        self.format
    }

    /// Caps the source should announce right now.
    pub fn caps(&self) -> String {
        self.classifier.caps(&self.format)
    }

    /// Framing state, exposed for diagnostics.
    pub fn classifier(&self) -> &FrameClassifier {
        &self.classifier
    }

    /// Timestamp state, exposed for diagnostics.
    pub fn clock(&self) -> &TimestampReconciler {
        &self.clock
    }

    /// Validates a payload and assigns its presentation timestamp.
    ///
    /// Returns `None` (after logging) when the payload has to be dropped.
    pub fn prepare(&mut self, timestamp_us: i64, payload_len: usize) -> Option<FramedChunk> {
        debug_assert!(self.format.is_valid(), "stream format must be validated");
        if self.format.sample_rate == 0 {
            return None;
        }

        let Framing::Frames {
            frames,
            layout_changed,
            ..
        } = self.classifier.classify(&self.format, payload_len)
        else {
            warn!("Dropping Sendspin audio chunk with invalid size: {payload_len}");
            return None;
        };

        let caps_update = layout_changed.then(|| {
            match self.classifier.bytes_per_sample_override() {
                Some(_) => info!("Detected 24-bit PCM in 32-bit frames; switching to S24_32LE caps"),
                None => info!("Detected packed 24-bit PCM; switching to S24LE caps"),
            }
            self.caps()
        });

        let duration_ns = frame_duration_ns(frames, self.format.sample_rate);
        let pts_ns = self.clock.next(timestamp_us, duration_ns);

        Some(FramedChunk {
            pts_ns,
            duration_ns,
            frames,
            caps_update,
        })
    }

    /// Resets the timestamp origin after a discontinuity.
    ///
    /// The sample layout survives; only a new session returns to packed.
    pub fn flush(&mut self) {
        self.clock.reset();
    }
}

/// Duration of `frames` samples at `sample_rate`, truncated to nanoseconds.
pub fn frame_duration_ns(frames: usize, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    let nanos = (frames as u128 * NANOS_PER_SECOND) / u128::from(sample_rate);
    u64::try_from(nanos).unwrap_or(u64::MAX)
}
