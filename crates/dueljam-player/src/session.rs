//! Play sessions: live through the output device or rendered to a file

use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam::utils::Backoff;

use dueljam_core::audio::start_output;
use dueljam_core::audio_file::write_wav;
use dueljam_core::chart::{Chart, Judge, JudgeRank, Scoreboard, Tracker};
use dueljam_core::engine::{AudioManager, SampleMap};
use dueljam_core::CHANNELS;

use crate::config::PlayerConfig;

/// Polling period of the live game loop
const TICK_SLEEP: Duration = Duration::from_millis(1);

fn make_tracker(config: &PlayerConfig, chart: Chart) -> Tracker {
    // Headless: there is no key input, so every lane plays itself
    let judge = Judge::from_preset(config.game.judge);
    Tracker::new(chart, judge, &[], None)
}

fn report(board: &Scoreboard) {
    log::info!(
        "Result: {} notes, {} auto, {} perfect, {} miss, max combo {}",
        board.total(),
        board.count(JudgeRank::Auto),
        board.count(JudgeRank::Perfect),
        board.count(JudgeRank::Miss),
        board.max_combo()
    );
}

/// Play `chart` on the output device until it ends and the voices ring out
pub fn run_live(config: &PlayerConfig, chart: Chart, samples: SampleMap) -> Result<()> {
    let audio = &config.game.audio;
    let mut manager = AudioManager::new(audio).context("Failed to start audio engine")?;
    manager.set_master_boost_db(config.game.master_boost_db);
    manager.swap_sample_map(samples);

    let output = manager.take_output().context("Output already taken")?;
    let handle = start_output(audio, output).context("Failed to open output device")?;
    log::info!(
        "Playing on {} ({} Hz, {} ch, ~{:.1}ms device latency)",
        handle.device_name(),
        handle.sample_rate(),
        handle.channels(),
        handle.latency_ms()
    );

    let mut tracker = make_tracker(config, chart);
    tracker.clock_mut().start();

    let backoff = Backoff::new();
    while !tracker.has_chart_ended() {
        tracker.update();
        let notes = tracker.take_note_audio();
        if notes.is_empty() {
            if backoff.is_completed() {
                thread::sleep(TICK_SLEEP);
            } else {
                backoff.snooze();
            }
        } else {
            manager.play_all(&notes);
            backoff.reset();
        }
    }

    while manager.active_voices() > 0 {
        thread::sleep(Duration::from_millis(10));
    }
    report(tracker.scoreboard());

    let underflows = manager.output_stats().underflows();
    if underflows > 0 {
        log::warn!("{} device callbacks ran short of audio", underflows);
    }

    drop(handle);
    manager.shutdown();
    Ok(())
}

/// Render `chart` offline and write it to `out` as a float WAV
///
/// The tracker is advanced by exactly one engine pass per step, so notes
/// land within one pass of their time.
pub fn render_to_file(
    config: &PlayerConfig,
    chart: Chart,
    samples: SampleMap,
    out: &Path,
) -> Result<()> {
    let audio = &config.game.audio;
    let mut manager = AudioManager::offline(audio).context("Failed to create audio session")?;
    manager.set_master_boost_db(config.game.master_boost_db);
    manager.swap_sample_map(samples);

    let mut output = manager.take_output().context("Output already taken")?;

    let render = manager.render_config();
    let pass_ms = render.frame_count as f64 * 1000.0 / f64::from(render.sample_rate);
    let mut pass = vec![0.0f32; render.frame_count * CHANNELS];
    let mut rendered: Vec<f32> = Vec::new();

    let mut tracker = make_tracker(config, chart);
    tracker.clock_mut().start();

    let mut tail = 0;
    while tail < config.tail_passes {
        if tracker.has_chart_ended() {
            if manager.active_voices() == 0 {
                break;
            }
            tail += 1;
        } else {
            tracker.advance(pass_ms);
            manager.play_all(&tracker.take_note_audio());
        }

        manager.update();
        output.pop_into(&mut pass, CHANNELS);
        rendered.extend_from_slice(&pass);
    }

    report(tracker.scoreboard());
    write_wav(out, render.sample_rate, &rendered)
        .with_context(|| format!("Failed to write {}", out.display()))?;
    manager.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DemoConfig;
    use crate::demo::build_demo_chart;
    use dueljam_core::audio::AudioConfig;
    use dueljam_core::audio_file::decode_file;
    use dueljam_core::config::GameConfig;
    use dueljam_core::engine::Sample;

    fn click(id: u32) -> Sample {
        let data: Vec<f32> = (0..480).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }).collect();
        Sample::from_f32(id, format!("click{}", id), &data, 1, 48000, None).expect("sample")
    }

    #[test]
    fn test_offline_render_writes_audio() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("demo.wav");

        let config = PlayerConfig {
            game: GameConfig::default().with_audio(AudioConfig::default().with_frame_count(512)),
            demo: DemoConfig {
                measures: 2,
                tempo: 240.0,
                tempo_change: None,
            },
            tail_passes: 8,
            ..Default::default()
        };
        let samples: SampleMap = [(1, click(1)), (2, click(2))].into_iter().collect();
        let chart = build_demo_chart(&[1, 2], &config.demo);

        render_to_file(&config, chart, samples, &out).expect("render");

        let decoded = decode_file(&out).expect("decode");
        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.sample_rate, 48000);
        // Two measures at 240 BPM (7 beats) last 1.75s
        assert!(decoded.frame_count() >= 84_000, "{} frames", decoded.frame_count());
        assert_eq!(decoded.frame_count() % 512, 0, "whole passes only");
        assert!(decoded.samples.iter().any(|s| s.abs() > 0.01), "notes were heard");
    }
}
