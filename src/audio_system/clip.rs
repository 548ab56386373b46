//! Audio clips
//!
//! A clip is an encoded audio asset held in memory plus its probed duration.
//! Decoding for output is the backend's job; here we only need enough of the
//! container to know how long the clip runs.

use std::fmt;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::AssetError;

/// Encoded audio asset shared between the library and the backend
#[derive(Clone)]
pub struct AudioClip {
    name: Arc<str>,
    data: Arc<Vec<u8>>,
    duration: Duration,
}

impl AudioClip {
    /// Create a clip with a known duration
    pub fn new(name: impl Into<Arc<str>>, data: Arc<Vec<u8>>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            data,
            duration,
        }
    }

    /// Create a clip from encoded bytes, probing the duration.
    ///
    /// `name` doubles as the format hint: its extension selects the probe.
    pub fn from_bytes(name: &str, data: Vec<u8>) -> Result<Self, AssetError> {
        let duration = probe_duration(name, &data)?;
        Ok(Self::new(name, Arc::new(data), duration))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &Arc<Vec<u8>> {
        &self.data
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Whether two handles refer to the same loaded asset
    pub fn same_asset(&self, other: &AudioClip) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for AudioClip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioClip")
            .field("name", &self.name)
            .field("bytes", &self.data.len())
            .field("duration", &self.duration)
            .finish()
    }
}

impl PartialEq for AudioClip {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.same_asset(other)
    }
}

fn extension(name: &str) -> Option<&str> {
    std::path::Path::new(name).extension().and_then(|e| e.to_str())
}

/// Determine the playback length of encoded audio
pub fn probe_duration(name: &str, data: &[u8]) -> Result<Duration, AssetError> {
    let invalid = |reason: String| AssetError::InvalidAudio {
        address: name.to_string(),
        reason,
    };

    if extension(name).is_some_and(|ext| ext.eq_ignore_ascii_case("wav")) {
        let reader =
            hound::WavReader::new(Cursor::new(data)).map_err(|e| invalid(e.to_string()))?;
        let sample_rate = reader.spec().sample_rate;
        if sample_rate == 0 {
            return Err(invalid("zero sample rate".to_string()));
        }
        return Ok(Duration::from_secs_f64(
            f64::from(reader.duration()) / f64::from(sample_rate),
        ));
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(data.to_vec())), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension(name) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| invalid(e.to_string()))?;

    let (track_id, n_frames, sample_rate, time_base) = {
        let track = probed
            .format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| invalid("no supported audio tracks".to_string()))?;
        let params = &track.codec_params;
        (track.id, params.n_frames, params.sample_rate, params.time_base)
    };

    if let (Some(frames), Some(rate)) = (n_frames, sample_rate) {
        if rate > 0 {
            return Ok(Duration::from_secs_f64(frames as f64 / f64::from(rate)));
        }
    }

    // No length in the header (e.g. VBR MP3 without a Xing frame): walk the packets
    let mut format = probed.format;
    let mut total: u64 = 0;
    while let Ok(packet) = format.next_packet() {
        if packet.track_id() == track_id {
            total += packet.dur;
        }
    }
    if total == 0 {
        return Err(invalid("unknown track length".to_string()));
    }

    match (time_base, sample_rate) {
        (Some(tb), _) => {
            let time = tb.calc_time(total);
            Ok(Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac))
        }
        (None, Some(rate)) if rate > 0 => {
            Ok(Duration::from_secs_f64(total as f64 / f64::from(rate)))
        }
        _ => Err(invalid("unknown track length".to_string())),
    }
}

#[cfg(test)]
pub(crate) fn wav_bytes(sample_rate: u32, frames: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..frames {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}
