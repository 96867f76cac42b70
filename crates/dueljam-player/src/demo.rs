//! Generated demo chart
//!
//! Lays a simple two-player pattern over whatever samples were loaded so
//! the engine can be exercised without a chart file.

use dueljam_core::chart::{
    pair_long_notes, Chart, ChartInfo, EventCC, Measure, NoteAudio, NoteKey, Sequence,
    SingleNote, TTime, TimeSignature,
};

use crate::config::DemoConfig;

/// Player lanes used by the pattern, scratch excluded
const LANES: u8 = 7;

fn pick(samples: &[u16], index: usize) -> u16 {
    if samples.is_empty() {
        1
    } else {
        samples[index % samples.len()]
    }
}

/// Build the demo chart for the given sample IDs
///
/// Every measure gets a background hit on its downbeat, player 1 taps on
/// the beats and player 2 on the off-beats. Odd measures hold player 1's
/// scratch for two beats with a silent release. The last measure is cut to
/// three beats.
pub fn build_demo_chart(sample_ids: &[u32], config: &DemoConfig) -> Chart {
    let samples: Vec<u16> = sample_ids
        .iter()
        .filter_map(|&id| u16::try_from(id).ok())
        .collect();
    let measures = config.measures.max(1);

    let mut sequence = Sequence::new();
    for m in 0..measures {
        let signature = if m + 1 == measures && measures > 1 {
            TimeSignature::new(3, 48)
        } else {
            TimeSignature::default()
        };
        sequence.push(Measure::new(signature));
    }

    sequence
        .measure_or_insert(0)
        .add_cc(EventCC::tempo(TTime::ZERO, config.tempo as f32));
    if let Some(bpm) = config.tempo_change {
        let half = measures / 2;
        sequence
            .measure_or_insert(half)
            .add_cc(EventCC::tempo(TTime::new(half, 0, 0), bpm as f32));
    }

    let mut holds = Vec::new();
    let mut releases = Vec::new();
    let mut n = 0;
    for m in 0..measures {
        let beats = sequence.signature_of(m).beats;
        let measure = sequence.measure_or_insert(m);

        let bg = NoteKey::background(0);
        measure.add_note(SingleNote::new(
            bg,
            TTime::new(m, 0, 0),
            NoteAudio::for_key(pick(&samples, m as usize), bg).with_volume(0.8),
        ));

        for beat in 0..beats {
            let lane = (n % usize::from(LANES)) as u8 + 1;
            if let Some(key) = NoteKey::player1(lane) {
                measure.add_note(SingleNote::new(
                    key,
                    TTime::new(m, beat, 0),
                    NoteAudio::for_key(pick(&samples, n), key).with_pan(-0.5),
                ));
            }
            if let Some(key) = NoteKey::player2(LANES + 1 - lane) {
                measure.add_note(SingleNote::new(
                    key,
                    TTime::new(m, beat, 24),
                    NoteAudio::for_key(pick(&samples, n + 1), key).with_pan(0.5),
                ));
            }
            n += 1;
        }

        if m % 2 == 1 && beats >= 2 {
            let key = NoteKey::P1_S;
            holds.push(SingleNote::new(
                key,
                TTime::new(m, 0, 0),
                NoteAudio::for_key(pick(&samples, m as usize + 2), key),
            ));
            releases.push(SingleNote::new(
                key,
                TTime::new(m, 2, 0),
                NoteAudio::for_key(0, key),
            ));
        }
    }

    let paired = pair_long_notes(holds, releases);
    for note in paired.singles {
        sequence.measure_or_insert(note.time.measure).add_note(note);
    }
    for note in paired.longs {
        sequence.measure_or_insert(note.begin.measure).add_long_note(note);
    }

    sequence.populate_indices();
    let mut chart = Chart::new(
        ChartInfo {
            name: "Demo".to_string(),
            charter: "dueljam-player".to_string(),
            level: 1,
            tempo: config.tempo,
        },
        sequence,
    );
    chart.sort_sequence();
    log::info!(
        "Built demo chart: {} measures, {} notes, {} CCs, ~{:.1}s",
        chart.sequence.len(),
        chart.note_count(),
        chart.cc_count(),
        chart.nominal_duration_ms() / 1000.0
    );
    chart
}

#[cfg(test)]
mod tests {
    use super::*;
    use dueljam_core::chart::{Judge, JudgeRank, Tracker};

    #[test]
    fn test_shape() {
        let config = DemoConfig {
            measures: 4,
            tempo: 140.0,
            tempo_change: Some(170.0),
        };
        let chart = build_demo_chart(&[3, 4, 70000], &config);

        assert_eq!(chart.sequence.len(), 4);
        assert_eq!(chart.sequence.signature_of(3), TimeSignature::new(3, 48));
        assert_eq!(chart.cc_count(), 2);
        assert_eq!(chart.info.tempo, 140.0);

        // 4 background + (4+4+4+3) beats for each player + 2 long notes
        let (singles, longs) = chart.sequence.note_counts();
        assert_eq!(singles, 4 + 15 * 2);
        assert_eq!(longs, 2);

        let ids: Vec<u16> = chart
            .sequence
            .extract_notes()
            .iter()
            .filter_map(|n| match n {
                dueljam_core::chart::EventNote::Single(s) => Some(s.audio.sample_id),
                _ => None,
            })
            .collect();
        assert!(ids.iter().all(|id| *id == 3 || *id == 4), "oversized IDs are skipped");
    }

    #[test]
    fn test_autoplay_runs_to_the_end() {
        let config = DemoConfig {
            measures: 3,
            tempo: 180.0,
            tempo_change: None,
        };
        let chart = build_demo_chart(&[1, 2], &config);
        let total = chart.note_count();

        let mut tracker = Tracker::new(chart, Judge::default(), &[], None);
        tracker.clock_mut().start();
        let mut played = 0;
        for _ in 0..10_000 {
            tracker.advance(10.0);
            played += tracker.take_note_audio().len();
            if tracker.has_chart_ended() {
                break;
            }
        }

        assert!(tracker.has_chart_ended());
        assert_eq!(played, total);
        assert_eq!(tracker.scoreboard().count(JudgeRank::Auto) as usize, total);
    }
}
