//! Double-buffered mixing bus
//!
//! A track accumulates its sources into a pool buffer, then flips the pool
//! into the output buffer and runs its filter rack over it. A track can be
//! a source of a parent track, which is how the player tracks feed master.
//!
//! # Locking
//!
//! ```text
//!   pool lock   ──► sources, pool buffer, render config, active flag
//!   output lock ──► output buffer, filter rack
//! ```
//!
//! Anything that needs both goes through [`TrackGuard`], which always takes
//! the pool lock first. A parent holds its own pool lock while rendering a
//! child, so locks are only ever taken parent-to-child, pool-to-output.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::voice::Voice;
use crate::filter::{Filter, Rack};
use crate::types::{FrameBuffer, RenderConfig, RenderQuality};

/// Something a track can pull audio from
pub enum Source {
    Voice(Voice),
    Track(Arc<Track>),
}

impl Source {
    pub fn is_active(&self) -> bool {
        match self {
            Source::Voice(voice) => voice.is_active(),
            Source::Track(track) => track.is_active(),
        }
    }

    /// Mix this source into `buffer` according to `config`
    ///
    /// Voice faults are logged and the voice is stopped; the buffer is left
    /// as it was.
    pub fn render(&mut self, buffer: &mut FrameBuffer, config: &RenderConfig) {
        match self {
            Source::Voice(voice) => {
                if let Err(e) = voice.render(buffer, config) {
                    log::error!("Voice for sample {} failed: {}", voice.sample_id(), e);
                    voice.deactivate();
                }
            }
            Source::Track(track) => track.render(buffer, config),
        }
    }
}

impl From<Voice> for Source {
    fn from(voice: Voice) -> Self {
        Source::Voice(voice)
    }
}

impl From<Arc<Track>> for Source {
    fn from(track: Arc<Track>) -> Self {
        Source::Track(track)
    }
}

struct PoolState {
    config: RenderConfig,
    sources: Vec<Source>,
    buffer: FrameBuffer,
    active: bool,
}

impl PoolState {
    fn pull(&mut self) {
        let config = RenderConfig {
            frame_offset: 0,
            ..self.config
        };
        for source in &mut self.sources {
            if source.is_active() {
                source.render(&mut self.buffer, &config);
            }
        }
        self.sources.retain(|s| match s {
            Source::Voice(voice) => voice.is_active(),
            Source::Track(_) => true,
        });
    }
}

struct OutputState {
    buffer: FrameBuffer,
    rack: Rack,
}

pub struct Track {
    name: String,
    pool: Mutex<PoolState>,
    output: Mutex<OutputState>,
}

/// Both locks of a track, taken pool first
pub struct TrackGuard<'a> {
    pool: MutexGuard<'a, PoolState>,
    output: MutexGuard<'a, OutputState>,
}

impl TrackGuard<'_> {
    fn flip(&mut self) {
        std::mem::swap(&mut self.pool.buffer, &mut self.output.buffer);
        self.pool.buffer.fill_silence();
        let output = &mut *self.output;
        output.rack.filter_buffer(&mut output.buffer);
    }
}

impl Track {
    pub fn new(name: impl Into<String>, config: RenderConfig) -> Self {
        Self {
            name: name.into(),
            pool: Mutex::new(PoolState {
                config,
                sources: Vec::new(),
                buffer: FrameBuffer::silence(config.frame_count),
                active: true,
            }),
            output: Mutex::new(OutputState {
                buffer: FrameBuffer::silence(config.frame_count),
                rack: Rack::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock_pool(&self) -> MutexGuard<'_, PoolState> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_output(&self) -> MutexGuard<'_, OutputState> {
        self.output.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take both locks in pool-then-output order
    pub fn lock(&self) -> TrackGuard<'_> {
        let pool = self.lock_pool();
        let output = self.lock_output();
        TrackGuard { pool, output }
    }

    pub fn config(&self) -> RenderConfig {
        self.lock_pool().config
    }

    /// Change the render quality of this track
    ///
    /// The frame count and sample rate are fixed at construction; buffers
    /// never change size.
    pub fn set_quality(&self, quality: RenderQuality) {
        self.lock_pool().config.quality = quality;
    }

    /// Replace the render configuration, keeping the buffer size
    pub fn set_config(&self, config: RenderConfig) {
        let mut pool = self.lock_pool();
        if config.frame_count != pool.config.frame_count {
            log::warn!(
                "Track '{}': ignoring frame count change {} -> {}",
                self.name,
                pool.config.frame_count,
                config.frame_count
            );
        }
        pool.config = RenderConfig {
            frame_count: pool.config.frame_count,
            ..config
        };
    }

    /// Tracks start active; detaching the last source deactivates them
    pub fn is_active(&self) -> bool {
        self.lock_pool().active
    }

    pub fn set_active(&self, active: bool) {
        self.lock_pool().active = active;
    }

    pub fn attach(&self, source: impl Into<Source>) {
        let mut pool = self.lock_pool();
        pool.sources.push(source.into());
        pool.active = true;
    }

    /// Remove every voice playing `sample_id`, returning how many went
    pub fn detach_voices(&self, sample_id: u32) -> usize {
        let mut pool = self.lock_pool();
        let before = pool.sources.len();
        pool.sources
            .retain(|s| !matches!(s, Source::Voice(v) if v.sample_id() == sample_id));
        pool.active = !pool.sources.is_empty();
        before - pool.sources.len()
    }

    /// Remove a child track by name
    pub fn detach_track(&self, name: &str) -> Option<Arc<Track>> {
        let mut pool = self.lock_pool();
        let index = pool
            .sources
            .iter()
            .position(|s| matches!(s, Source::Track(t) if t.name() == name))?;
        let removed = pool.sources.remove(index);
        pool.active = !pool.sources.is_empty();
        match removed {
            Source::Track(track) => Some(track),
            Source::Voice(_) => None,
        }
    }

    pub fn count_sources(&self) -> usize {
        self.lock_pool().sources.len()
    }

    pub fn count_active_sources(&self) -> usize {
        self.lock_pool().sources.iter().filter(|s| s.is_active()).count()
    }

    /// Render every active source into the pool and prune finished voices
    pub fn pull(&self) {
        self.lock_pool().pull();
    }

    /// Render one externally owned voice into the pool
    ///
    /// A converter fault stops the voice and leaves the pool untouched.
    pub fn pull_voice(&self, voice: &mut Voice) {
        let mut pool = self.lock_pool();
        let config = RenderConfig {
            frame_offset: 0,
            ..pool.config
        };
        if let Err(e) = voice.render(&mut pool.buffer, &config) {
            log::error!(
                "Track '{}': voice for sample {} failed: {}",
                self.name,
                voice.sample_id(),
                e
            );
            voice.deactivate();
        }
    }

    /// Swap pool and output, clear the new pool and run the rack
    pub fn flip(&self) {
        self.lock().flip();
    }

    /// Render this track as a source of a parent
    ///
    /// SKIP (from the parent or this track) does nothing. MUTE runs the
    /// whole pipeline and discards the result. Otherwise the output is added
    /// into `target` at `config.frame_offset`.
    pub fn render(&self, target: &mut FrameBuffer, config: &RenderConfig) {
        let mut guard = self.lock();
        let own = guard.pool.config.quality;
        if config.quality == RenderQuality::Skip || own == RenderQuality::Skip {
            return;
        }

        guard.pool.pull();
        guard.flip();

        if config.quality == RenderQuality::Mute || own == RenderQuality::Mute {
            return;
        }
        target.mix_from(&guard.output.buffer, config.frame_offset);
    }

    /// Run `f` against the filter rack under the output lock
    pub fn with_rack<R>(&self, f: impl FnOnce(&mut Rack) -> R) -> R {
        f(&mut self.lock_output().rack)
    }

    /// Snapshot of the output buffer
    pub fn copy_output(&self) -> FrameBuffer {
        self.lock_output().buffer.clone()
    }

    /// Copy the output as interleaved samples into `dst`, reusing its
    /// allocation
    pub fn copy_output_interleaved(&self, dst: &mut Vec<f32>) {
        let output = self.lock_output();
        dst.clear();
        dst.extend_from_slice(output.buffer.as_interleaved());
    }

    pub fn output_len(&self) -> usize {
        self.lock_output().buffer.len()
    }

    /// Clear both buffers and every filter's state
    pub fn reset(&self) {
        let mut guard = self.lock();
        guard.pool.buffer.fill_silence();
        guard.output.buffer.fill_silence();
        guard.output.rack.reset_state();
    }
}
