//! Measures and the tick arithmetic across them

use super::cc::EventCC;
use super::note::{EventNote, LongNote, SingleNote};
use super::time::{TTime, TimeSignature};

/// One measure of a chart and the events it holds
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Measure {
    signature: TimeSignature,
    tick_index: u64,
    pub ccs: Vec<EventCC>,
    pub notes: Vec<SingleNote>,
    pub long_notes: Vec<LongNote>,
}

impl Measure {
    pub fn new(signature: TimeSignature) -> Self {
        Self {
            signature,
            ..Default::default()
        }
    }

    /// Measure stretched by `scale`, if the scale gives any ticks
    pub fn from_scale(scale: f64) -> Option<Self> {
        TimeSignature::from_measure_scale(scale).map(Self::new)
    }

    pub fn signature(&self) -> TimeSignature {
        self.signature
    }

    pub fn set_signature(&mut self, signature: TimeSignature) {
        self.signature = signature;
    }

    pub fn tick_count(&self) -> u32 {
        self.signature.tick_count()
    }

    /// Absolute tick this measure starts on, valid after
    /// [`Sequence::populate_indices`]
    pub fn tick_index(&self) -> u64 {
        self.tick_index
    }

    pub fn add_cc(&mut self, cc: EventCC) {
        self.ccs.push(cc);
    }

    pub fn add_note(&mut self, note: SingleNote) {
        self.notes.push(note);
    }

    pub fn add_long_note(&mut self, note: LongNote) {
        self.long_notes.push(note);
    }

    /// Sort CCs by (time, control) and notes by (time, key)
    pub fn sort_elements(&mut self) {
        self.ccs.sort_by(EventCC::chronological);
        self.notes.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.key.cmp(&b.key)));
        self.long_notes
            .sort_by(|a, b| a.begin.cmp(&b.begin).then_with(|| a.key.cmp(&b.key)));
    }
}

/// Ordered list of measures
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sequence {
    measures: Vec<Measure>,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// `count` empty measures in the default signature
    pub fn with_measures(count: usize) -> Self {
        let mut sequence = Self {
            measures: vec![Measure::default(); count],
        };
        sequence.populate_indices();
        sequence
    }

    pub fn from_measures(measures: Vec<Measure>) -> Self {
        let mut sequence = Self { measures };
        sequence.populate_indices();
        sequence
    }

    pub fn push(&mut self, measure: Measure) {
        self.measures.push(measure);
    }

    pub fn len(&self) -> usize {
        self.measures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measures.is_empty()
    }

    pub fn measures(&self) -> &[Measure] {
        &self.measures
    }

    pub fn measure(&self, index: u32) -> Option<&Measure> {
        self.measures.get(index as usize)
    }

    pub fn measure_mut(&mut self, index: u32) -> Option<&mut Measure> {
        self.measures.get_mut(index as usize)
    }

    /// Measure `index`, growing the sequence with default measures if needed
    pub fn measure_or_insert(&mut self, index: u32) -> &mut Measure {
        let index = index as usize;
        if self.measures.len() <= index {
            self.measures.resize_with(index + 1, Measure::default);
        }
        &mut self.measures[index]
    }

    /// Signature in effect at `index`
    ///
    /// Past the end the last measure's signature carries on; an empty
    /// sequence uses the default.
    pub fn signature_of(&self, index: u32) -> TimeSignature {
        self.measures
            .get(index as usize)
            .or_else(|| self.measures.last())
            .map(Measure::signature)
            .unwrap_or_default()
    }

    /// Total ticks across all measures
    pub fn total_ticks(&self) -> u64 {
        self.measures.iter().map(|m| u64::from(m.tick_count())).sum()
    }

    /// Fill in each measure's starting tick
    pub fn populate_indices(&mut self) {
        let mut index = 0;
        for measure in &mut self.measures {
            measure.tick_index = index;
            index += u64::from(measure.tick_count());
        }
    }

    /// Measure containing absolute `tick`, or None outside the sequence
    pub fn measure_index(&self, tick: u64) -> Option<usize> {
        if tick >= self.total_ticks() {
            return None;
        }
        let after = self.measures.partition_point(|m| m.tick_index <= tick);
        after.checked_sub(1)
    }

    /// Signed tick distance from `a` to `b`
    ///
    /// Positive when `b` is later. Measures outside the sequence take the
    /// signature from [`Self::signature_of`].
    pub fn tick_distance(&self, a: TTime, b: TTime) -> i64 {
        if a > b {
            return -self.tick_distance(b, a);
        }
        if a == b {
            return 0;
        }

        let offset = |t: TTime| {
            let sig = self.signature_of(t.measure);
            i64::from(t.beat) * i64::from(sig.ticks_per_beat) + i64::from(t.tick)
        };

        if a.measure == b.measure {
            return offset(b) - offset(a);
        }

        let head = i64::from(self.signature_of(a.measure).tick_count()) - offset(a);
        let middle: i64 = (a.measure + 1..b.measure)
            .map(|m| i64::from(self.signature_of(m).tick_count()))
            .sum();
        head + middle + offset(b)
    }

    /// Position of absolute `tick`, or None outside the sequence
    pub fn time_at_tick(&self, tick: u64) -> Option<TTime> {
        let index = self.measure_index(tick)?;
        let measure = &self.measures[index];
        let within = (tick - measure.tick_index) as u32;
        let per_beat = measure.signature.ticks_per_beat.max(1);
        Some(TTime::new(
            index as u32,
            within / per_beat,
            (within % per_beat) as i32,
        ))
    }

    pub fn sort_elements(&mut self) {
        for measure in &mut self.measures {
            measure.sort_elements();
        }
    }

    /// Every CC in the chart, sorted by (time, control)
    pub fn extract_ccs(&self) -> Vec<EventCC> {
        let mut ccs: Vec<EventCC> = self
            .measures
            .iter()
            .flat_map(|m| m.ccs.iter().cloned())
            .collect();
        ccs.sort_by(EventCC::chronological);
        ccs
    }

    /// Every note in the chart, sorted by (time, key)
    pub fn extract_notes(&self) -> Vec<EventNote> {
        let mut notes: Vec<EventNote> = self
            .measures
            .iter()
            .flat_map(|m| {
                m.notes
                    .iter()
                    .cloned()
                    .map(EventNote::Single)
                    .chain(m.long_notes.iter().cloned().map(EventNote::Long))
            })
            .collect();
        notes.sort_by(EventNote::chronological);
        notes
    }

    /// Number of (single, long) notes
    pub fn note_counts(&self) -> (usize, usize) {
        self.measures
            .iter()
            .fold((0, 0), |(s, l), m| (s + m.notes.len(), l + m.long_notes.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::key::NoteKey;
    use crate::chart::note::NoteAudio;

    /// 4/48, 3/48, 6/24, 4/48
    fn mixed() -> Sequence {
        Sequence::from_measures(vec![
            Measure::default(),
            Measure::new(TimeSignature::new(3, 48)),
            Measure::new(TimeSignature::new(6, 24)),
            Measure::default(),
        ])
    }

    #[test]
    fn test_indices() {
        let seq = mixed();
        let indices: Vec<u64> = seq.measures().iter().map(Measure::tick_index).collect();
        assert_eq!(indices, vec![0, 192, 336, 480]);
        assert_eq!(seq.total_ticks(), 672);
    }

    #[test]
    fn test_measure_index() {
        let seq = mixed();
        assert_eq!(seq.measure_index(0), Some(0));
        assert_eq!(seq.measure_index(191), Some(0));
        assert_eq!(seq.measure_index(192), Some(1));
        assert_eq!(seq.measure_index(400), Some(2));
        assert_eq!(seq.measure_index(671), Some(3));
        assert_eq!(seq.measure_index(672), None);
        assert_eq!(Sequence::new().measure_index(0), None);
    }

    #[test]
    fn test_tick_distance() {
        let seq = mixed();
        assert_eq!(seq.tick_distance(TTime::ZERO, TTime::new(0, 2, 10)), 106);
        assert_eq!(seq.tick_distance(TTime::new(0, 3, 40), TTime::new(1, 0, 2)), 10);
        assert_eq!(seq.tick_distance(TTime::ZERO, TTime::new(2, 1, 0)), 360);
        assert_eq!(seq.tick_distance(TTime::ZERO, TTime::new(3, 0, 0)), 480);
        assert_eq!(seq.tick_distance(TTime::new(2, 1, 0), TTime::ZERO), -360);
        assert_eq!(seq.tick_distance(TTime::ZERO, TTime::new(0, 0, -1)), -1);
        assert_eq!(seq.tick_distance(TTime::new(1, 1, 1), TTime::new(1, 1, 1)), 0);

        // Past the end the last signature (4/48) repeats
        assert_eq!(seq.tick_distance(TTime::ZERO, TTime::new(5, 1, 0)), 672 + 192 + 48);
    }

    #[test]
    fn test_distance_matches_indices() {
        let seq = mixed();
        for tick in (0..seq.total_ticks()).step_by(7) {
            let time = seq.time_at_tick(tick).expect("inside");
            assert_eq!(seq.tick_distance(TTime::ZERO, time), tick as i64, "at {}", time);
        }
    }

    #[test]
    fn test_empty_sequence_uses_default_signature() {
        let seq = Sequence::new();
        assert_eq!(seq.signature_of(3), TimeSignature::default());
        assert_eq!(seq.tick_distance(TTime::ZERO, TTime::new(1, 0, 0)), 192);
    }

    #[test]
    fn test_extract_sorted() {
        let mut seq = Sequence::with_measures(2);
        let late = TTime::new(1, 0, 0);
        seq.measure_or_insert(1).add_cc(EventCC::tempo(late, 140.0));
        seq.measure_or_insert(0).add_cc(EventCC::stop(TTime::new(0, 2, 0), 24));
        seq.measure_or_insert(1)
            .add_note(SingleNote::new(NoteKey::P1_2, late, NoteAudio::new(1, 1)));
        seq.measure_or_insert(1)
            .add_note(SingleNote::new(NoteKey::P1_1, late, NoteAudio::new(2, 1)));
        seq.measure_or_insert(0).add_long_note(LongNote::new(
            NoteKey::P1_3,
            TTime::new(0, 1, 0),
            late,
            NoteAudio::new(3, 1),
            NoteAudio::new(0, 1),
        ));

        let ccs = seq.extract_ccs();
        assert_eq!(ccs.iter().map(|c| c.time).collect::<Vec<_>>(), vec![TTime::new(0, 2, 0), late]);

        let keys: Vec<NoteKey> = seq.extract_notes().iter().map(EventNote::key).collect();
        assert_eq!(keys, vec![NoteKey::P1_3, NoteKey::P1_1, NoteKey::P1_2]);
        assert_eq!(seq.note_counts(), (2, 1));

        assert_eq!(seq.measure_or_insert(4).tick_count(), 192);
        assert_eq!(seq.len(), 5);
    }
}
