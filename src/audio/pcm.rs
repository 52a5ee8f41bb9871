use std::io::{ErrorKind, Read};

use crate::error::AudioUnavailable;

use super::{level::decode_le_i16, level::rms_i16, LevelSource};

/// Reads raw mono little-endian i16 PCM from any byte stream (a FIFO fed by
/// `arecord`, a file, a socket) and reports the RMS of each buffer.
pub struct PcmLevelSource<R> {
    reader: R,
    bytes: Vec<u8>,
    samples: Vec<i16>,
    ended: bool,
}

impl<R: Read + Send> PcmLevelSource<R> {
    pub fn new(reader: R, buffer_samples: usize) -> Self {
        Self {
            reader,
            bytes: vec![0; buffer_samples.max(1) * 2],
            samples: Vec::with_capacity(buffer_samples.max(1)),
            ended: false,
        }
    }
}

impl<R: Read + Send> LevelSource for PcmLevelSource<R> {
    fn sample_level(&mut self) -> Result<f64, AudioUnavailable> {
        if self.ended {
            return Err(AudioUnavailable::new("pcm stream ended"));
        }

        match self.reader.read_exact(&mut self.bytes) {
            Ok(()) => {
                decode_le_i16(&self.bytes, &mut self.samples);
                Ok(rms_i16(&self.samples))
            }
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                self.ended = true;
                Err(AudioUnavailable::new("pcm stream ended"))
            }
            Err(err) => Err(AudioUnavailable::new(format!("pcm read failed: {err}"))),
        }
    }

    fn is_available(&self) -> bool {
        !self.ended
    }

    fn name(&self) -> &'static str {
        "pcm_rms"
    }
}
