//! Audio device backend using cpal
//!
//! Decoding runs on one thread per stream (symphonia, resampled with
//! rubato to the device rate); the device callback mixes all lanes from
//! lock-free ring buffers. The cpal stream itself lives on a dedicated
//! thread because it is not `Send`; the backend talks to it through a
//! command channel.

use crate::backend::{
    Backend, BackendStream, DeviceState, StreamCallback, StreamMessage, StreamTime,
};
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use rubato::{FastFixedIn, Resampler as RubatoResampler};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info, warn};

/// Subsamples handed to the stream callback per chunk
const CHUNK_SUBSAMPLES: usize = 4_096;

/// Ring buffer size per lane, in seconds of device audio
const LANE_BUFFER_SECS: usize = 1;

/// Container extensions treated as video content
const VIDEO_EXTENSIONS: &[&str] = &[
    "avi", "flv", "m4v", "mkv", "mov", "mpeg", "mpg", "webm", "wmv",
];

// ---- mixer ----

struct Lane {
    id: u64,
    cons: HeapCons<f32>,
    consumed_subsamples: Arc<AtomicU64>,
}

#[derive(Default)]
struct Mixer {
    lanes: Mutex<Vec<Lane>>,
}

impl Mixer {
    fn add_lane(&self, id: u64, cons: HeapCons<f32>, consumed: Arc<AtomicU64>) {
        self.lanes.lock().unwrap().push(Lane {
            id,
            cons,
            consumed_subsamples: consumed,
        });
    }

    fn remove_lane(&self, id: u64) {
        self.lanes.lock().unwrap().retain(|lane| lane.id != id);
    }

    fn clear(&self) {
        self.lanes.lock().unwrap().clear();
    }

    /// Sum all lanes into the device buffer.
    fn render(&self, out: &mut [f32], scratch: &mut Vec<f32>) {
        out.fill(0.0);
        scratch.resize(out.len(), 0.0);
        let mut lanes = self.lanes.lock().unwrap();
        for lane in lanes.iter_mut() {
            let n = lane.cons.pop_slice(&mut scratch[..out.len()]);
            for (dst, src) in out[..n].iter_mut().zip(&scratch[..n]) {
                *dst += *src;
            }
            lane.consumed_subsamples
                .fetch_add(n as u64, Ordering::Relaxed);
        }
    }
}

// ---- device thread ----

enum DeviceCommand {
    Play,
    Pause,
    Close,
}

struct DeviceHandle {
    cmd_tx: mpsc::Sender<DeviceCommand>,
    join: Option<std::thread::JoinHandle<()>>,
    sample_rate: u32,
    channels: u16,
}

fn spawn_device_thread(mixer: Arc<Mixer>) -> Result<DeviceHandle> {
    let (cmd_tx, cmd_rx) = mpsc::channel::<DeviceCommand>();
    let (ready_tx, ready_rx) = mpsc::channel::<std::result::Result<(u32, u16), String>>();

    let join = std::thread::Builder::new()
        .name("jbx-audio-device".to_string())
        .spawn(move || {
            let stream = match open_output_stream(&mixer) {
                Ok((stream, rate, channels)) => {
                    let _ = ready_tx.send(Ok((rate, channels)));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                warn!(error = %e, "could not start device stream");
            }
            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    DeviceCommand::Play => {
                        let _ = stream.play();
                    }
                    DeviceCommand::Pause => {
                        let _ = stream.pause();
                    }
                    DeviceCommand::Close => break,
                }
            }
            // Stream drops here, on the thread that created it.
        })?;

    let (sample_rate, channels) = ready_rx
        .recv()
        .map_err(|_| Error::AudioOutput("device thread died during open".to_string()))?
        .map_err(Error::AudioOutput)?;

    info!(sample_rate, channels, "audio device opened");
    Ok(DeviceHandle {
        cmd_tx,
        join: Some(join),
        sample_rate,
        channels,
    })
}

fn open_output_stream(mixer: &Arc<Mixer>) -> Result<(cpal::Stream, u32, u16)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::AudioOutput("no default output device".to_string()))?;

    // Prefer 44.1 kHz stereo f32; fall back to the device default.
    let preferred = device
        .supported_output_configs()
        .map_err(|e| Error::AudioOutput(format!("failed to get device configs: {}", e)))?
        .find(|c| {
            c.channels() == 2
                && c.min_sample_rate().0 <= 44_100
                && c.max_sample_rate().0 >= 44_100
                && c.sample_format() == SampleFormat::F32
        });

    let (config, sample_format): (StreamConfig, SampleFormat) = match preferred {
        Some(c) => {
            let format = c.sample_format();
            (c.with_sample_rate(cpal::SampleRate(44_100)).config(), format)
        }
        None => {
            let c = device
                .default_output_config()
                .map_err(|e| Error::AudioOutput(format!("failed to get default config: {}", e)))?;
            let format = c.sample_format();
            (c.config(), format)
        }
    };
    if sample_format != SampleFormat::F32 {
        return Err(Error::AudioOutput(format!(
            "unsupported device sample format: {:?}",
            sample_format
        )));
    }

    let sample_rate = config.sample_rate.0;
    let channels = config.channels;
    let mixer = Arc::clone(mixer);
    let mut scratch: Vec<f32> = Vec::new();

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _| mixer.render(data, &mut scratch),
            |e| warn!(error = %e, "device stream error"),
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("failed to build stream: {}", e)))?;

    Ok((stream, sample_rate, channels))
}

// ---- decoding ----

/// Decode a whole file to interleaved stereo f32 at its native rate.
fn decode_file(path: &Path) -> Result<(Vec<f32>, u32)> {
    let file = std::fs::File::open(path)
        .map_err(|e| Error::Decode(format!("failed to open {}: {}", path.display(), e)))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| Error::Decode(format!("failed to probe format: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Decode("no audio track found".to_string()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| Error::Decode("sample rate not found".to_string()))?;
    let channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .ok_or_else(|| Error::Decode("channel count not found".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Decode(format!("failed to create decoder: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                warn!(error = %e, "error reading packet");
                break;
            }
        };
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(decoded) => {
                if sample_buf.is_none() {
                    let spec = *decoded.spec();
                    sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
                }
                let buf = sample_buf.as_mut().ok_or_else(|| {
                    Error::Decode("sample buffer missing".to_string())
                })?;
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
            Err(e) => {
                warn!(error = %e, "decode error, skipping packet");
                continue;
            }
        }
    }

    Ok((to_stereo(samples, channels), sample_rate))
}

/// Upmix mono, downmix surround to the first two channels.
fn to_stereo(samples: Vec<f32>, channels: usize) -> Vec<f32> {
    match channels {
        2 => samples,
        1 => samples.iter().flat_map(|s| [*s, *s]).collect(),
        n => samples
            .chunks_exact(n)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    }
}

/// Resample interleaved stereo audio to the device rate.
fn resample_stereo(input: Vec<f32>, input_rate: u32, output_rate: u32) -> Result<Vec<f32>> {
    if input_rate == output_rate || input.is_empty() {
        return Ok(input);
    }

    let frames = input.len() / 2;
    let mut planar = vec![Vec::with_capacity(frames); 2];
    for frame in input.chunks_exact(2) {
        planar[0].push(frame[0]);
        planar[1].push(frame[1]);
    }

    let mut resampler = FastFixedIn::<f32>::new(
        output_rate as f64 / input_rate as f64,
        1.0,
        rubato::PolynomialDegree::Septic,
        frames,
        2,
    )
    .map_err(|e| Error::Decode(format!("failed to create resampler: {}", e)))?;
    let output = resampler
        .process(&planar, None)
        .map_err(|e| Error::Decode(format!("resampling failed: {}", e)))?;

    let out_frames = output[0].len();
    let mut interleaved = Vec::with_capacity(out_frames * 2);
    for i in 0..out_frames {
        interleaved.push(output[0][i]);
        interleaved.push(output[1][i]);
    }
    Ok(interleaved)
}

fn looks_like_video(url: &str) -> bool {
    Path::new(url)
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            VIDEO_EXTENSIONS.iter().any(|v| *v == ext)
        })
        .unwrap_or(false)
}

fn url_to_path(url: &str) -> std::path::PathBuf {
    match url.strip_prefix("file://") {
        Some(rest) => std::path::PathBuf::from(rest),
        None => std::path::PathBuf::from(url),
    }
}

// ---- streams ----

enum DecoderCommand {
    Seek(u64),
}

struct StreamShared {
    alive: AtomicBool,
    /// Total duration in ms, -1 while unknown
    total_ms: AtomicI64,
    /// Elapsed position base after the last seek, in ms
    elapsed_base_ms: AtomicU64,
    /// Device-consumed subsamples at the last seek
    consumed_at_base: AtomicU64,
    consumed_subsamples: Arc<AtomicU64>,
    device_rate: u32,
    device_channels: u16,
}

struct CpalStream {
    url: String,
    callback: StreamCallback,
    shared: Arc<StreamShared>,
    cmd_tx: mpsc::Sender<DecoderCommand>,
    decoder_join: Option<std::thread::JoinHandle<()>>,
    mixer: Arc<Mixer>,
    lane_id: u64,
}

impl BackendStream for CpalStream {
    fn time(&self) -> StreamTime {
        let total = self.shared.total_ms.load(Ordering::Acquire);
        let consumed = self.shared.consumed_subsamples.load(Ordering::Relaxed);
        let at_base = self.shared.consumed_at_base.load(Ordering::Relaxed);
        let per_ms =
            self.shared.device_rate as u64 * self.shared.device_channels as u64 / 1_000;
        let elapsed = if per_ms == 0 {
            None
        } else {
            Some(
                self.shared.elapsed_base_ms.load(Ordering::Relaxed)
                    + consumed.saturating_sub(at_base) / per_ms,
            )
        };
        StreamTime {
            total_ms: (total >= 0).then_some(total as u64),
            elapsed_ms: elapsed,
        }
    }

    fn seek_abs(&mut self, ms: u64) {
        let _ = self.cmd_tx.send(DecoderCommand::Seek(ms));
    }

    fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.shared.alive.store(false, Ordering::Release);
        if let Some(join) = self.decoder_join.take() {
            let _ = join.join();
        }
        self.mixer.remove_lane(self.lane_id);
        // Decoder thread has ended; this is guaranteed the last message.
        (self.callback)(StreamMessage::DestroyUserdata);
    }
}

/// Decode, process and feed one stream's lane until it ends or dies.
fn decoder_thread(
    url: String,
    start_offset_ms: u64,
    callback: StreamCallback,
    shared: Arc<StreamShared>,
    mut prod: HeapProd<f32>,
    cmd_rx: mpsc::Receiver<DecoderCommand>,
) {
    let rate = shared.device_rate;
    let channels = shared.device_channels;
    let subsamples_per_ms = (rate as u64 * channels as u64 / 1_000).max(1);

    let decoded = decode_file(&url_to_path(&url))
        .and_then(|(samples, src_rate)| resample_stereo(samples, src_rate, rate));
    let samples = match decoded {
        Ok(samples) if !samples.is_empty() => samples,
        Ok(_) => {
            warn!(url = %url, "media contains no audio");
            (callback)(StreamMessage::EndOfStream);
            return;
        }
        Err(e) => {
            // Asynchronous creation failure: end-of-stream without Created.
            warn!(url = %url, error = %e, "stream creation failed");
            (callback)(StreamMessage::EndOfStream);
            return;
        }
    };

    let total_ms = (samples.len() as u64 / subsamples_per_ms) as i64;
    shared.total_ms.store(total_ms, Ordering::Release);
    (callback)(StreamMessage::Created);
    if looks_like_video(&url) {
        (callback)(StreamMessage::VideoDetected);
    }

    let mut cursor = (start_offset_ms * subsamples_per_ms) as usize;
    cursor = align_to_frame(cursor.min(samples.len()), channels);
    let mut chunk = vec![0.0f32; CHUNK_SUBSAMPLES];

    'render: while shared.alive.load(Ordering::Acquire) && cursor < samples.len() {
        while let Ok(DecoderCommand::Seek(ms)) = cmd_rx.try_recv() {
            cursor = align_to_frame(
                ((ms * subsamples_per_ms) as usize).min(samples.len()),
                channels,
            );
            shared.elapsed_base_ms.store(ms, Ordering::Relaxed);
            shared.consumed_at_base.store(
                shared.consumed_subsamples.load(Ordering::Relaxed),
                Ordering::Relaxed,
            );
            debug!(url = %url, ms, "stream seek");
        }

        let end = (cursor + CHUNK_SUBSAMPLES).min(samples.len());
        let len = end - cursor;
        chunk[..len].copy_from_slice(&samples[cursor..end]);
        cursor = end;

        (callback)(StreamMessage::Buffer {
            samples: &mut chunk[..len],
            sample_rate: rate,
            channels,
        });

        let mut pushed = 0;
        while pushed < len {
            pushed += prod.push_slice(&chunk[pushed..len]);
            if pushed < len {
                if !shared.alive.load(Ordering::Acquire) {
                    break 'render;
                }
                std::thread::sleep(Duration::from_millis(5));
            }
        }
    }

    // Let the mixer drain what is buffered before announcing the end.
    while shared.alive.load(Ordering::Acquire) && prod.occupied_len() > 0 {
        std::thread::sleep(Duration::from_millis(5));
    }
    if shared.alive.load(Ordering::Acquire) {
        debug!(url = %url, "end of stream");
        (callback)(StreamMessage::EndOfStream);
    }
}

fn align_to_frame(subsamples: usize, channels: u16) -> usize {
    subsamples - subsamples % channels as usize
}

// ---- backend ----

/// Backend rendering to the system's default output device.
pub struct CpalBackend {
    name: String,
    mixer: Arc<Mixer>,
    device: Option<DeviceHandle>,
    state: DeviceState,
    next_lane_id: u64,
}

impl CpalBackend {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            mixer: Arc::new(Mixer::default()),
            device: None,
            state: DeviceState::Closed,
            next_lane_id: 0,
        }
    }

    fn ensure_open(&mut self) -> Result<(u32, u16)> {
        if self.device.is_none() {
            self.device = Some(spawn_device_thread(Arc::clone(&self.mixer))?);
            self.state = DeviceState::Playing;
        }
        let device = self.device.as_ref().ok_or_else(|| {
            Error::AudioOutput("device unavailable".to_string())
        })?;
        Ok((device.sample_rate, device.channels))
    }

    fn close_device(&mut self) {
        if let Some(mut device) = self.device.take() {
            let _ = device.cmd_tx.send(DeviceCommand::Close);
            if let Some(join) = device.join.take() {
                let _ = join.join();
            }
        }
        self.mixer.clear();
        self.state = DeviceState::Closed;
    }
}

impl Drop for CpalBackend {
    fn drop(&mut self) {
        self.close_device();
    }
}

impl Backend for CpalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_stream(
        &mut self,
        url: &str,
        start_offset_ms: u64,
        callback: StreamCallback,
    ) -> Result<Box<dyn BackendStream>> {
        let (sample_rate, channels) = self.ensure_open()?;

        let consumed = Arc::new(AtomicU64::new(0));
        let shared = Arc::new(StreamShared {
            alive: AtomicBool::new(true),
            total_ms: AtomicI64::new(-1),
            elapsed_base_ms: AtomicU64::new(start_offset_ms),
            consumed_at_base: AtomicU64::new(0),
            consumed_subsamples: Arc::clone(&consumed),
            device_rate: sample_rate,
            device_channels: channels,
        });

        let capacity = sample_rate as usize * channels as usize * LANE_BUFFER_SECS;
        let (prod, cons) = HeapRb::<f32>::new(capacity).split();
        let lane_id = self.next_lane_id;
        self.next_lane_id += 1;
        self.mixer.add_lane(lane_id, cons, Arc::clone(&consumed));

        let (cmd_tx, cmd_rx) = mpsc::channel();
        let thread_url = url.to_string();
        let thread_callback = Arc::clone(&callback);
        let thread_shared = Arc::clone(&shared);
        let decoder_join = std::thread::Builder::new()
            .name("jbx-decoder".to_string())
            .spawn(move || {
                decoder_thread(
                    thread_url,
                    start_offset_ms,
                    thread_callback,
                    thread_shared,
                    prod,
                    cmd_rx,
                )
            })?;

        debug!(backend = %self.name, url, start_offset_ms, "stream created");
        Ok(Box::new(CpalStream {
            url: url.to_string(),
            callback,
            shared,
            cmd_tx,
            decoder_join: Some(decoder_join),
            mixer: Arc::clone(&self.mixer),
            lane_id,
        }))
    }

    fn device_state(&self) -> DeviceState {
        self.state
    }

    fn set_device_state(&mut self, state: DeviceState) {
        match state {
            DeviceState::Closed => self.close_device(),
            DeviceState::Playing | DeviceState::Paused => {
                if let Some(device) = &self.device {
                    let cmd = if state == DeviceState::Playing {
                        DeviceCommand::Play
                    } else {
                        DeviceCommand::Pause
                    };
                    let _ = device.cmd_tx.send(cmd);
                    self.state = state;
                }
            }
        }
    }

    fn set_device_gain(&mut self, _gain: f32) {
        // Volume is applied in the processing pipeline; this device does
        // not manage volume itself.
    }

    fn manages_volume(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_extension_detection() {
        assert!(looks_like_video("file:///movies/clip.mkv"));
        assert!(looks_like_video("/data/a.AVI"));
        assert!(!looks_like_video("file:///music/a.mp3"));
        assert!(!looks_like_video("file:///music/a.m4a"));
        assert!(!looks_like_video("file:///music/noext"));
    }

    #[test]
    fn url_stripping() {
        assert_eq!(
            url_to_path("file:///music/a.mp3"),
            std::path::PathBuf::from("/music/a.mp3")
        );
        assert_eq!(
            url_to_path("/music/a.mp3"),
            std::path::PathBuf::from("/music/a.mp3")
        );
    }

    #[test]
    fn stereo_conversion() {
        assert_eq!(to_stereo(vec![0.1, 0.2], 1), vec![0.1, 0.1, 0.2, 0.2]);
        assert_eq!(to_stereo(vec![0.1, 0.2], 2), vec![0.1, 0.2]);
        assert_eq!(
            to_stereo(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6], 3),
            vec![0.1, 0.2, 0.4, 0.5]
        );
    }

    #[test]
    fn resample_passthrough_at_same_rate() {
        let input = vec![0.1, 0.2, 0.3, 0.4];
        let out = resample_stereo(input.clone(), 44_100, 44_100).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn resample_changes_length_proportionally() {
        let frames = 48_000usize;
        let input: Vec<f32> = (0..frames * 2)
            .map(|i| ((i / 2) as f32 * 0.01).sin() * 0.5)
            .collect();
        let out = resample_stereo(input, 48_000, 44_100).unwrap();
        let out_frames = out.len() / 2;
        let expected = frames * 44_100 / 48_000;
        assert!(
            out_frames.abs_diff(expected) < 50,
            "expected ~{} frames, got {}",
            expected,
            out_frames
        );
    }

    #[test]
    fn frame_alignment() {
        assert_eq!(align_to_frame(7, 2), 6);
        assert_eq!(align_to_frame(8, 2), 8);
    }

    #[test]
    fn decode_roundtrip_from_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..44_100u32 {
            let v = ((i as f32 * 0.05).sin() * 8_000.0) as i16;
            writer.write_sample(v).unwrap();
            writer.write_sample(v).unwrap();
        }
        writer.finalize().unwrap();

        let (samples, rate) = decode_file(&path).unwrap();
        assert_eq!(rate, 44_100);
        // One second of stereo audio.
        assert_eq!(samples.len(), 2 * 44_100);
        assert!(samples.iter().any(|s| s.abs() > 0.1));
    }
}
