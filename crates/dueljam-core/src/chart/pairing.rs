//! Pairing hold and release markers into long notes
//!
//! Chart formats mark long notes as separate hold and release events per
//! lane. Broken charts are common, so mismatches are repaired rather than
//! rejected and every repair is reported.

use std::collections::BTreeMap;
use std::fmt;

use rayon::prelude::*;

use super::key::NoteKey;
use super::note::{LongNote, SingleNote};
use super::time::TTime;

/// A fix applied while pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingRepair {
    /// A hold with no release left became a tap note
    UnpairedHold { key: NoteKey, time: TTime },
    /// A release on the same tick as its hold was dropped
    ZeroLength { key: NoteKey, time: TTime },
    /// A release before its hold was dropped
    ReleaseBeforeHold { key: NoteKey, hold: TTime, release: TTime },
    /// The release names another sample and a second hold starts first,
    /// so this hold became a tap note
    MismatchedHold { key: NoteKey, time: TTime },
    /// The release names another sample and was dropped
    MismatchedRelease { key: NoteKey, time: TTime },
    /// A release left over after every hold was paired
    OrphanRelease { key: NoteKey, time: TTime },
}

impl fmt::Display for PairingRepair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairingRepair::UnpairedHold { key, time } => {
                write!(f, "lane {} at {}: hold without release, kept as tap", key, time)
            }
            PairingRepair::ZeroLength { key, time } => {
                write!(f, "lane {} at {}: zero-length hold, release dropped", key, time)
            }
            PairingRepair::ReleaseBeforeHold { key, hold, release } => write!(
                f,
                "lane {}: release at {} precedes hold at {}, release dropped",
                key, release, hold
            ),
            PairingRepair::MismatchedHold { key, time } => write!(
                f,
                "lane {} at {}: release sample differs and next hold comes first, kept as tap",
                key, time
            ),
            PairingRepair::MismatchedRelease { key, time } => {
                write!(f, "lane {} at {}: release sample differs, release dropped", key, time)
            }
            PairingRepair::OrphanRelease { key, time } => {
                write!(f, "lane {} at {}: release without hold, dropped", key, time)
            }
        }
    }
}

/// Result of [`pair_long_notes`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Paired {
    /// Holds that could not be paired, now tap notes
    pub singles: Vec<SingleNote>,
    pub longs: Vec<LongNote>,
    pub repairs: Vec<PairingRepair>,
}

fn by_key(notes: Vec<SingleNote>) -> BTreeMap<NoteKey, Vec<SingleNote>> {
    let mut lanes: BTreeMap<NoteKey, Vec<SingleNote>> = BTreeMap::new();
    for note in notes {
        lanes.entry(note.key).or_default().push(note);
    }
    lanes
}

fn pair_lane(key: NoteKey, mut holds: Vec<SingleNote>, mut releases: Vec<SingleNote>) -> Paired {
    holds.sort_by_key(|n| n.time);
    releases.sort_by_key(|n| n.time);

    let mut out = Paired::default();
    let mut r = 0;
    for (h, hold) in holds.iter().enumerate() {
        loop {
            let Some(release) = releases.get(r) else {
                out.repairs.push(PairingRepair::UnpairedHold { key, time: hold.time });
                out.singles.push(hold.clone());
                break;
            };

            if hold.time == release.time {
                out.repairs.push(PairingRepair::ZeroLength { key, time: hold.time });
                r += 1;
                continue;
            }
            if hold.time > release.time {
                out.repairs.push(PairingRepair::ReleaseBeforeHold {
                    key,
                    hold: hold.time,
                    release: release.time,
                });
                r += 1;
                continue;
            }

            let silent = release.audio.sample_id == 0;
            if !silent && release.audio.sample_id != hold.audio.sample_id {
                let next_hold_first = holds.get(h + 1).is_some_and(|next| next.time < release.time);
                if next_hold_first {
                    out.repairs.push(PairingRepair::MismatchedHold { key, time: hold.time });
                    out.singles.push(hold.clone());
                    break;
                }
                out.repairs.push(PairingRepair::MismatchedRelease { key, time: release.time });
                r += 1;
                continue;
            }

            out.longs.push(LongNote::from_pair(hold, release));
            r += 1;
            break;
        }
    }

    for release in &releases[r.min(releases.len())..] {
        out.repairs.push(PairingRepair::OrphanRelease { key, time: release.time });
    }
    out
}

/// Pair holds with releases lane by lane
///
/// Within a lane each hold takes the first usable release after it. Lanes
/// are independent and processed in parallel; the output is ordered by
/// lane, then time.
pub fn pair_long_notes(holds: Vec<SingleNote>, releases: Vec<SingleNote>) -> Paired {
    let mut hold_lanes = by_key(holds);
    let mut release_lanes = by_key(releases);

    let mut keys: Vec<NoteKey> = hold_lanes.keys().chain(release_lanes.keys()).copied().collect();
    keys.sort_unstable();
    keys.dedup();

    let lanes: Vec<(NoteKey, Vec<SingleNote>, Vec<SingleNote>)> = keys
        .into_iter()
        .map(|key| {
            (
                key,
                hold_lanes.remove(&key).unwrap_or_default(),
                release_lanes.remove(&key).unwrap_or_default(),
            )
        })
        .collect();

    let results: Vec<Paired> = lanes
        .into_par_iter()
        .map(|(key, holds, releases)| pair_lane(key, holds, releases))
        .collect();

    let mut paired = Paired::default();
    for lane in results {
        paired.singles.extend(lane.singles);
        paired.longs.extend(lane.longs);
        paired.repairs.extend(lane.repairs);
    }

    for repair in &paired.repairs {
        log::debug!("Long note repair: {}", repair);
    }
    if !paired.repairs.is_empty() {
        log::info!(
            "Paired {} long notes with {} repairs",
            paired.longs.len(),
            paired.repairs.len()
        );
    }
    paired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::note::NoteAudio;

    fn marker(key: NoteKey, beat: u32, sample: u16) -> SingleNote {
        SingleNote::new(key, TTime::new(0, beat, 0), NoteAudio::new(sample, 1))
    }

    #[test]
    fn test_simple_pairs() {
        let k = NoteKey::P1_1;
        let paired = pair_long_notes(
            vec![marker(k, 2, 5), marker(k, 0, 5)],
            vec![marker(k, 3, 0), marker(k, 1, 5)],
        );
        assert!(paired.repairs.is_empty());
        assert!(paired.singles.is_empty());
        let spans: Vec<(u32, u32)> = paired.longs.iter().map(|l| (l.begin.beat, l.end.beat)).collect();
        assert_eq!(spans, vec![(0, 1), (2, 3)]);
        assert_eq!(paired.longs[0].end_audio.sample_id, 5);
    }

    #[test]
    fn test_lanes_are_independent() {
        let paired = pair_long_notes(
            vec![marker(NoteKey::P2_1, 0, 1), marker(NoteKey::P1_1, 0, 1)],
            vec![marker(NoteKey::P1_1, 1, 1), marker(NoteKey::P2_1, 2, 1)],
        );
        assert!(paired.repairs.is_empty());
        let lanes: Vec<(NoteKey, u32)> = paired.longs.iter().map(|l| (l.key, l.end.beat)).collect();
        assert_eq!(lanes, vec![(NoteKey::P1_1, 1), (NoteKey::P2_1, 2)]);
    }

    #[test]
    fn test_hold_without_release_becomes_tap() {
        let k = NoteKey::P1_4;
        let paired = pair_long_notes(vec![marker(k, 0, 1), marker(k, 2, 1)], vec![marker(k, 1, 1)]);
        assert_eq!(paired.longs.len(), 1);
        assert_eq!(paired.singles.len(), 1);
        assert_eq!(paired.singles[0].time, TTime::new(0, 2, 0));
        assert_eq!(
            paired.repairs,
            vec![PairingRepair::UnpairedHold { key: k, time: TTime::new(0, 2, 0) }]
        );
    }

    #[test]
    fn test_zero_length_and_backwards_releases_dropped() {
        let k = NoteKey::P1_2;
        let paired = pair_long_notes(
            vec![marker(k, 1, 1)],
            vec![marker(k, 0, 1), marker(k, 1, 1), marker(k, 3, 1)],
        );
        assert_eq!(paired.longs.len(), 1);
        assert_eq!(paired.longs[0].end, TTime::new(0, 3, 0));
        assert!(matches!(paired.repairs[0], PairingRepair::ReleaseBeforeHold { .. }));
        assert!(matches!(paired.repairs[1], PairingRepair::ZeroLength { .. }));
        assert_eq!(paired.repairs.len(), 2);
    }

    #[test]
    fn test_mismatched_sample() {
        let k = NoteKey::P1_3;

        // Next hold starts before the odd release: the first hold is a tap
        let paired = pair_long_notes(
            vec![marker(k, 0, 1), marker(k, 1, 2)],
            vec![marker(k, 2, 2)],
        );
        assert_eq!(paired.singles.len(), 1);
        assert_eq!(paired.singles[0].audio.sample_id, 1);
        assert_eq!(paired.longs.len(), 1);
        assert_eq!(paired.longs[0].begin_audio.sample_id, 2);
        assert!(matches!(paired.repairs[0], PairingRepair::MismatchedHold { .. }));

        // No competing hold: the odd release is dropped instead
        let paired = pair_long_notes(vec![marker(k, 0, 1)], vec![marker(k, 1, 7), marker(k, 2, 1)]);
        assert_eq!(paired.longs.len(), 1);
        assert_eq!(paired.longs[0].end, TTime::new(0, 2, 0));
        assert_eq!(
            paired.repairs,
            vec![PairingRepair::MismatchedRelease { key: k, time: TTime::new(0, 1, 0) }]
        );
    }

    #[test]
    fn test_orphan_releases_reported() {
        let k = NoteKey::P2_5;
        let paired = pair_long_notes(vec![], vec![marker(k, 1, 0)]);
        assert!(paired.longs.is_empty() && paired.singles.is_empty());
        assert_eq!(
            paired.repairs,
            vec![PairingRepair::OrphanRelease { key: k, time: TTime::new(0, 1, 0) }]
        );
        assert!(paired.repairs[0].to_string().contains("release without hold"));
    }
}
