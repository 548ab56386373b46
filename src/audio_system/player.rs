/// Rodio output backend
///
/// One `Sink` per plain channel and one `SpatialSink` per positional
/// channel, all sharing a single output stream. Sinks are rebuilt on every
/// `start` so a stopped channel can be reused without waiting on rodio's
/// queue.

use std::collections::HashMap;
use std::io::Cursor;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source, SpatialSink};

use super::backend::{AudioBackend, ChannelId, ChannelSettings, Position};
use super::clip::AudioClip;
use crate::error::AudioError;

const LISTENER: Position = [0.0, 0.0, 0.0];
const LEFT_EAR: Position = [-1.0, 0.0, 0.0];
const RIGHT_EAR: Position = [1.0, 0.0, 0.0];

enum Output {
    Plain(Sink),
    Spatial(SpatialSink),
}

impl Output {
    fn set_volume(&self, volume: f32) {
        match self {
            Output::Plain(sink) => sink.set_volume(volume),
            Output::Spatial(sink) => sink.set_volume(volume),
        }
    }

    fn stop(&self) {
        match self {
            Output::Plain(sink) => sink.stop(),
            Output::Spatial(sink) => sink.stop(),
        }
    }

    fn empty(&self) -> bool {
        match self {
            Output::Plain(sink) => sink.empty(),
            Output::Spatial(sink) => sink.empty(),
        }
    }
}

struct Channel {
    position: Option<Position>,
    output: Option<Output>,
    gain: f32,
    muted: bool,
}

impl Channel {
    fn effective_volume(&self, master: f32) -> f32 {
        if self.muted {
            0.0
        } else {
            (self.gain * master).clamp(0.0, 1.0)
        }
    }
}

/// Plays channels on the default output device
pub struct RodioBackend {
    _stream: OutputStream,
    stream_handle: OutputStreamHandle,
    channels: HashMap<ChannelId, Channel>,
    next_id: u64,
    master_volume: f32,
}

impl RodioBackend {
    /// Open the default output device
    pub fn new() -> Result<Self, AudioError> {
        let (stream, stream_handle) =
            OutputStream::try_default().map_err(|e| AudioError::StreamInitFailed(Box::new(e)))?;
        tracing::info!("Audio output stream opened");

        Ok(Self {
            _stream: stream,
            stream_handle,
            channels: HashMap::new(),
            next_id: 1,
            master_volume: 1.0,
        })
    }

    fn decode(
        clip: &AudioClip,
        settings: &ChannelSettings,
    ) -> Result<Box<dyn Source<Item = i16> + Send>, AudioError> {
        let decode_failed = |e: rodio::decoder::DecoderError| AudioError::DecodeFailed {
            name: clip.name().to_string(),
            source: Box::new(e),
        };
        let cursor = Cursor::new(clip.data().to_vec());

        let source: Box<dyn Source<Item = i16> + Send> = if settings.looping {
            Box::new(Decoder::new_looped(cursor).map_err(decode_failed)?)
        } else {
            Box::new(Decoder::new(cursor).map_err(decode_failed)?)
        };

        if (settings.pitch - 1.0).abs() > f32::EPSILON {
            Ok(Box::new(source.speed(settings.pitch)))
        } else {
            Ok(source)
        }
    }

    fn build_output(
        &self,
        position: Option<Position>,
        spatial_blend: f32,
    ) -> Result<Output, AudioError> {
        let open_failed = |e: rodio::PlayError| AudioError::ChannelOpenFailed(Box::new(e));
        match position {
            Some(position) => {
                // Blend 0 keeps the emitter on the listener, 1 at its real position
                let blend = spatial_blend.clamp(0.0, 1.0);
                let emitter = [
                    LISTENER[0] + (position[0] - LISTENER[0]) * blend,
                    LISTENER[1] + (position[1] - LISTENER[1]) * blend,
                    LISTENER[2] + (position[2] - LISTENER[2]) * blend,
                ];
                let sink = SpatialSink::try_new(&self.stream_handle, emitter, LEFT_EAR, RIGHT_EAR)
                    .map_err(open_failed)?;
                Ok(Output::Spatial(sink))
            }
            None => Ok(Output::Plain(
                Sink::try_new(&self.stream_handle).map_err(open_failed)?,
            )),
        }
    }
}

impl AudioBackend for RodioBackend {
    fn open_channel(&mut self, position: Option<Position>) -> Result<ChannelId, AudioError> {
        let id = ChannelId(self.next_id);
        self.next_id += 1;
        self.channels.insert(
            id,
            Channel {
                position,
                output: None,
                gain: 1.0,
                muted: false,
            },
        );
        Ok(id)
    }

    fn close_channel(&mut self, id: ChannelId) {
        if let Some(channel) = self.channels.remove(&id) {
            if let Some(output) = channel.output {
                output.stop();
            }
        }
    }

    fn start(
        &mut self,
        id: ChannelId,
        clip: &AudioClip,
        settings: &ChannelSettings,
    ) -> Result<(), AudioError> {
        let position = self
            .channels
            .get(&id)
            .ok_or(AudioError::UnknownChannel(id.0))?
            .position;

        let source = Self::decode(clip, settings)?;
        let output = self.build_output(position, settings.spatial_blend)?;

        let master = self.master_volume;
        let channel = self
            .channels
            .get_mut(&id)
            .ok_or(AudioError::UnknownChannel(id.0))?;
        if let Some(previous) = channel.output.take() {
            previous.stop();
        }
        channel.gain = settings.gain;
        channel.muted = settings.muted;
        output.set_volume(channel.effective_volume(master));
        match &output {
            Output::Plain(sink) => sink.append(source),
            Output::Spatial(sink) => sink.append(source),
        }
        channel.output = Some(output);

        tracing::debug!("Started {} on channel {}", clip.name(), id.0);
        Ok(())
    }

    fn stop(&mut self, id: ChannelId) {
        if let Some(channel) = self.channels.get_mut(&id) {
            if let Some(output) = channel.output.take() {
                output.stop();
            }
        }
    }

    fn set_gain(&mut self, id: ChannelId, gain: f32) {
        let master = self.master_volume;
        if let Some(channel) = self.channels.get_mut(&id) {
            channel.gain = gain;
            if let Some(output) = &channel.output {
                output.set_volume(channel.effective_volume(master));
            }
        }
    }

    fn set_muted(&mut self, id: ChannelId, muted: bool) {
        let master = self.master_volume;
        if let Some(channel) = self.channels.get_mut(&id) {
            channel.muted = muted;
            if let Some(output) = &channel.output {
                output.set_volume(channel.effective_volume(master));
            }
        }
    }

    fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume.clamp(0.0, 1.0);
        for channel in self.channels.values() {
            if let Some(output) = &channel.output {
                output.set_volume(channel.effective_volume(self.master_volume));
            }
        }
    }

    fn is_playing(&self, id: ChannelId) -> bool {
        self.channels
            .get(&id)
            .and_then(|c| c.output.as_ref())
            .is_some_and(|output| !output.empty())
    }
}
