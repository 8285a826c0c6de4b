use crate::error::{AppError, AppResult};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decodes a fully downloaded preview clip (mp3) into interleaved f32 samples.
pub struct PreviewDecoder {
    format_reader: Box<dyn symphonia::core::formats::FormatReader>,
    decoder: Box<dyn symphonia::core::codecs::Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
}

impl PreviewDecoder {
    pub fn new(bytes: Vec<u8>) -> AppResult<Self> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        hint.with_extension("mp3");

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| AppError::Decode(format!("Failed to probe format: {}", e)))?;

        let format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| AppError::Decode("No supported audio track found".into()))?;

        let track_id = track.id;
        let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
        let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2);

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| AppError::Decode(format!("Failed to create decoder: {}", e)))?;

        log::debug!(
            "[PreviewDecoder::new] sample_rate={}, channels={}",
            sample_rate,
            channels
        );

        Ok(Self {
            format_reader,
            decoder,
            track_id,
            sample_rate,
            channels,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn seek(&mut self, position_ms: u64) -> AppResult<()> {
        use symphonia::core::formats::{SeekMode, SeekTo};
        use symphonia::core::units::Time;

        let time = Time {
            seconds: position_ms / 1000,
            frac: (position_ms % 1000) as f64 / 1000.0,
        };

        self.format_reader
            .seek(
                SeekMode::Coarse,
                SeekTo::Time {
                    time,
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| AppError::Decode(format!("Seek failed: {}", e)))?;

        self.decoder.reset();
        Ok(())
    }

    /// Next batch of interleaved samples, `None` at end of stream.
    pub fn decode_next(&mut self) -> AppResult<Option<Vec<f32>>> {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(symphonia::core::errors::Error::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(e) => return Err(AppError::Decode(format!("Failed to read packet: {}", e))),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(symphonia::core::errors::Error::DecodeError(msg)) => {
                    log::warn!("[decode_next] Skipping bad frame: {}", msg);
                    continue;
                }
                Err(e) => return Err(AppError::Decode(format!("Failed to decode: {}", e))),
            };

            let spec = *decoded.spec();
            let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            return Ok(Some(sample_buf.samples().to_vec()));
        }
    }
}
