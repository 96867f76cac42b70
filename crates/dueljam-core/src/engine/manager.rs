//! Audio session: tracks, sample table, active voices and the engine thread
//!
//! # Threads
//!
//! ```text
//! ┌──────────────────┐  play()/swap   ┌────────────────────┐
//! │   Game thread    │───────────────►│ session lock       │
//! │  (Tracker loop)  │                │  samples + voices  │
//! └──────────────────┘                └─────────┬──────────┘
//!                                               │ one pass
//! ┌──────────────────┐   update()     ┌─────────▼──────────┐   push   ┌────────────┐
//! │  "audio-engine"  │───────────────►│ tracks ─► master   │─────────►│ OutputQueue│
//! └──────────────────┘                └────────────────────┘          └────────────┘
//!
//! wipe_sample_map() ──► bounded channel ──► "sample-reclaim" worker
//! ```
//!
//! Lock order is engine, then session, then track locks. The output queue
//! is a lock-free ring; the device callback never waits on any of them.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::utils::Backoff;

use super::engine::{AudioEngine, MAXIMIZER_SLOT};
use super::sample::SampleMap;
use super::track::Track;
use super::voice::Voice;
use crate::audio::{AudioConfig, AudioResult, OutputReader, OutputStats};
use crate::chart::NoteAudio;
use crate::filter::{pan_gains, Maximizer, MeterReadings, Metering, PanLaw, PanMixer, ThreeBandEq};
use crate::types::{to_dbfs, RenderConfig, RenderQuality};

/// Track receiving autoplay and background notes
pub const AUTOPLAY_TRACK: u8 = 0;
pub const PLAYER1_TRACK: u8 = 1;
pub const PLAYER2_TRACK: u8 = 2;

/// Idle sleep once the backoff is exhausted
const IDLE_SLEEP: Duration = Duration::from_millis(1);

/// Wiped collections waiting for the reclaim worker
const RECLAIM_QUEUE_DEPTH: usize = 4;

/// Collections swapped out by [`AudioManager::wipe_sample_map`]
struct Reclaim {
    voices: Vec<Voice>,
    samples: Option<SampleMap>,
}

#[derive(Default)]
struct Session {
    samples: SampleMap,
    voices: Vec<Voice>,
}

/// A registered track with lock-free access to its meter
struct TrackSlot {
    track: Arc<Track>,
    meter: Arc<MeterReadings>,
}

struct Shared {
    engine: Mutex<AudioEngine>,
    /// Handles taken from the engine at construction, readable without its lock
    master: Arc<Track>,
    master_meter: Arc<MeterReadings>,
    session: Mutex<Session>,
    tracks: BTreeMap<u8, TrackSlot>,
    running: AtomicBool,
    updates: AtomicU64,
}

impl Shared {
    fn lock_engine(&self) -> MutexGuard<'_, AudioEngine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn make_voice(&self, session: &Session, note: &NoteAudio) -> Option<Voice> {
        let Some(slot) = self.tracks.get(&note.track_id) else {
            log::debug!("Dropping note for unknown track {}", note.track_id);
            return None;
        };
        let Some(sample) = session.samples.get(&u32::from(note.sample_id)) else {
            log::debug!("Dropping note for unknown sample {}", note.sample_id);
            return None;
        };

        let gain = pan_gains(PanLaw::SinCos, note.volume, note.pan);
        match Voice::new(sample.clone(), note.track_id, &slot.track.config(), gain) {
            Ok(voice) => Some(voice),
            Err(e) => {
                log::error!("Cannot start sample {}: {}", note.sample_id, e);
                None
            }
        }
    }

    fn update(&self) -> bool {
        let mut engine = self.lock_engine();
        if !engine.needs_data() {
            return false;
        }

        {
            let mut session = self.lock_session();
            for voice in session.voices.iter_mut() {
                match self.tracks.get(&voice.track_id()) {
                    Some(slot) => slot.track.pull_voice(voice),
                    None => voice.deactivate(),
                }
            }
            session.voices.retain(Voice::is_active);
        }

        engine.render_pass();
        self.updates.fetch_add(1, Ordering::Relaxed);
        true
    }
}

fn engine_loop(shared: Arc<Shared>, stats: Arc<OutputStats>) {
    log::info!("Audio engine thread started");
    let backoff = Backoff::new();
    let mut reported_underflows = 0;

    while shared.running.load(Ordering::Acquire) {
        if shared.update() {
            backoff.reset();
        } else if backoff.is_completed() {
            thread::sleep(IDLE_SLEEP);
        } else {
            backoff.snooze();
        }

        let underflows = stats.underflows();
        if underflows != reported_underflows {
            log::warn!(
                "Output underflow: {} of {} device callbacks padded with silence",
                underflows,
                stats.callbacks()
            );
            reported_underflows = underflows;
        }
    }
    log::info!("Audio engine thread stopped");
}

fn reclaim_loop(rx: Receiver<Reclaim>) {
    for batch in rx {
        let voices = batch.voices.len();
        let samples = batch.samples.as_ref().map_or(0, |s| s.len());
        drop(batch);
        log::debug!("Reclaimed {} voices and {} samples", voices, samples);
    }
}

/// The audio session
///
/// Owns the track registry (IDs 0 to 2 feeding the master), the active
/// sample table and the list of sounding voices.
pub struct AudioManager {
    shared: Arc<Shared>,
    output: Mutex<Option<OutputReader>>,
    stats: Arc<OutputStats>,
    render_config: RenderConfig,
    dbfs_floor: f32,
    engine_thread: Option<JoinHandle<()>>,
    reclaim_tx: Option<Sender<Reclaim>>,
    reclaim_thread: Option<JoinHandle<()>>,
}

impl AudioManager {
    /// Create the session and start the engine thread
    pub fn new(config: &AudioConfig) -> AudioResult<Self> {
        let mut manager = Self::offline(config)?;
        let shared = Arc::clone(&manager.shared);
        let stats = Arc::clone(&manager.stats);
        manager.engine_thread = Some(
            thread::Builder::new()
                .name("audio-engine".to_string())
                .spawn(move || engine_loop(shared, stats))?,
        );
        Ok(manager)
    }

    /// Create the session without an engine thread
    ///
    /// The caller drives [`AudioManager::update`] itself, e.g. to render a
    /// chart to a file.
    pub fn offline(config: &AudioConfig) -> AudioResult<Self> {
        let render_config = config.render_config();
        let mut engine = AudioEngine::new(RenderConfig {
            quality: RenderQuality::Default,
            ..render_config
        });
        let output = engine.take_output();
        let stats = Arc::clone(engine.queue().stats());
        let master = Arc::clone(engine.master());
        let master_meter = Arc::clone(engine.meter());

        let mut tracks = BTreeMap::new();
        for (id, name) in [(AUTOPLAY_TRACK, "Autoplay"), (PLAYER1_TRACK, "Player 1"), (PLAYER2_TRACK, "Player 2")] {
            let track = Arc::new(Track::new(name, render_config));
            let metering = Metering::new();
            let meter = metering.readings();
            track.with_rack(|rack| {
                rack.attach(Box::new(ThreeBandEq::new(render_config.sample_rate)));
                rack.attach(Box::new(PanMixer::with_law(PanLaw::Linear)));
                rack.attach(Box::new(metering));
            });
            master.attach(Arc::clone(&track));
            tracks.insert(id, TrackSlot { track, meter });
        }

        let (reclaim_tx, reclaim_rx) = channel::bounded(RECLAIM_QUEUE_DEPTH);
        let reclaim_thread = thread::Builder::new()
            .name("sample-reclaim".to_string())
            .spawn(move || reclaim_loop(reclaim_rx))?;

        log::info!(
            "Audio session ready: {} Hz, {} frames per pass (~{:.1}ms), {:?} quality",
            render_config.sample_rate,
            render_config.frame_count,
            config.pass_latency_ms(),
            render_config.quality
        );

        Ok(Self {
            shared: Arc::new(Shared {
                engine: Mutex::new(engine),
                master,
                master_meter,
                session: Mutex::new(Session::default()),
                tracks,
                running: AtomicBool::new(true),
                updates: AtomicU64::new(0),
            }),
            output: Mutex::new(output),
            stats,
            render_config,
            dbfs_floor: config.dbfs_floor,
            engine_thread: None,
            reclaim_tx: Some(reclaim_tx),
            reclaim_thread: Some(reclaim_thread),
        })
    }

    /// Device end of the output FIFO, handed out once
    ///
    /// Move it into the output stream, or pop it directly when rendering
    /// offline.
    pub fn take_output(&mut self) -> Option<OutputReader> {
        self.output.get_mut().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Callback and underflow counters of the output FIFO
    pub fn output_stats(&self) -> &Arc<OutputStats> {
        &self.stats
    }

    pub fn render_config(&self) -> RenderConfig {
        self.render_config
    }

    pub fn track(&self, id: u8) -> Option<&Arc<Track>> {
        self.shared.tracks.get(&id).map(|slot| &slot.track)
    }

    pub fn track_ids(&self) -> impl Iterator<Item = u8> + '_ {
        self.shared.tracks.keys().copied()
    }

    pub fn master(&self) -> Arc<Track> {
        Arc::clone(&self.shared.master)
    }

    /// Change the render quality of one track
    pub fn set_track_quality(&self, id: u8, quality: RenderQuality) -> bool {
        match self.track(id) {
            Some(track) => {
                track.set_quality(quality);
                true
            }
            None => false,
        }
    }

    /// Meter readings of a track
    pub fn track_readings(&self, id: u8) -> Option<Arc<MeterReadings>> {
        self.shared.tracks.get(&id).map(|slot| Arc::clone(&slot.meter))
    }

    /// Meter readings of the master bus
    pub fn master_readings(&self) -> Arc<MeterReadings> {
        Arc::clone(&self.shared.master_meter)
    }

    /// Gain applied ahead of the master maximizer
    pub fn set_master_boost_db(&self, db: f32) {
        self.shared.master.with_rack(|rack| {
            if let Some(maximizer) = rack.get_typed_mut::<Maximizer>(MAXIMIZER_SLOT) {
                maximizer.set_boost_db(db);
            }
        });
    }

    /// Peak level of a track in dBFS, clamped to the configured floor
    pub fn track_peak_dbfs(&self, id: u8) -> Option<[f32; 2]> {
        let peak = self.shared.tracks.get(&id)?.meter.peak();
        Some(peak.map(|p| to_dbfs(p).max(self.dbfs_floor)))
    }

    /// Queue a voice for the next render pass
    ///
    /// Notes naming an unknown track or sample are dropped and false is
    /// returned.
    pub fn play(&self, note: &NoteAudio) -> bool {
        let mut session = self.shared.lock_session();
        match self.shared.make_voice(&session, note) {
            Some(voice) => {
                session.voices.push(voice);
                true
            }
            None => false,
        }
    }

    /// Queue several voices at once, returning how many were accepted
    ///
    /// A sample that is already sounding is cut before it is retriggered.
    pub fn play_all(&self, notes: &[NoteAudio]) -> usize {
        let mut session = self.shared.lock_session();
        let mut count = 0;
        for note in notes {
            let Some(voice) = self.shared.make_voice(&session, note) else {
                continue;
            };
            let sample_id = voice.sample_id();
            session.voices.retain(|v| v.sample_id() != sample_id);
            session.voices.push(voice);
            count += 1;
        }
        count
    }

    /// Voices currently queued or sounding
    pub fn active_voices(&self) -> usize {
        self.shared.lock_session().voices.len()
    }

    pub fn sample_count(&self) -> usize {
        self.shared.lock_session().samples.len()
    }

    /// Empty the sample table and stop every voice
    ///
    /// Both collections are swapped out under the session lock and freed on
    /// the reclaim worker. With `drop_data` the old samples are released
    /// there too; otherwise they are handed back to the caller.
    pub fn wipe_sample_map(&self, drop_data: bool) -> Option<SampleMap> {
        let (voices, samples) = {
            let mut session = self.shared.lock_session();
            (
                std::mem::take(&mut session.voices),
                std::mem::take(&mut session.samples),
            )
        };

        let (samples, kept) = if drop_data {
            log::info!("Dropping {} samples", samples.len());
            (Some(samples), None)
        } else {
            (None, Some(samples))
        };

        let batch = Reclaim { voices, samples };
        if let Some(tx) = &self.reclaim_tx {
            if let Err(channel::SendError(batch)) = tx.send(batch) {
                log::warn!("Reclaim worker is gone, freeing wiped collections in place");
                drop(batch);
            }
        }
        kept
    }

    /// Install a new sample table, returning the previous one
    pub fn swap_sample_map(&self, samples: SampleMap) -> SampleMap {
        let mut session = self.shared.lock_session();
        std::mem::replace(&mut session.samples, samples)
    }

    /// One engine step; false when the output queue already held a pass
    pub fn update(&self) -> bool {
        self.shared.update()
    }

    /// Engine passes rendered so far
    pub fn update_count(&self) -> u64 {
        self.shared.updates.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.engine_thread.is_some()
    }

    /// Stop the engine thread and release the sample table
    pub fn shutdown(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(handle) = self.engine_thread.take() {
            if handle.join().is_err() {
                log::error!("Audio engine thread panicked");
            }
        }

        if self.reclaim_tx.is_some() {
            self.wipe_sample_map(true);
        }
        // Closing the channel ends the worker once it has drained
        self.reclaim_tx = None;
        if let Some(handle) = self.reclaim_thread.take() {
            if handle.join().is_err() {
                log::error!("Sample reclaim thread panicked");
            }
        }
    }
}

impl Drop for AudioManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
