/// Smallest contribution a non-final clip makes to the running offset (seconds)
pub const MIN_EFFECTIVE_DURATION: f64 = 0.01;

/// Master schedule of clip start offsets
///
/// Consecutive clips overlap by the transition length, so each clip starts
/// `duration - transition` after the previous one. The last clip plays in full.
///
/// A clip too short to cover its crossfades gets a span longer than its
/// duration; the track builders hold its last frame and pad its audio with
/// silence up to the span, so picture and sound both end at `total`.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    offsets: Vec<f64>,
    durations: Vec<f64>,
    spans: Vec<f64>,
    transition: f64,
    total: f64,
    clamped: Vec<usize>,
}

impl Timeline {
    /// Schedule clips of the given durations joined by `transition` second crossfades
    pub fn schedule(durations: &[f64], transition: f64) -> Self {
        let last = durations.len().saturating_sub(1);

        let (offsets, spans, clamped) = durations.iter().enumerate().fold(
            (Vec::with_capacity(durations.len()), Vec::with_capacity(durations.len()), Vec::new()),
            |(mut offsets, mut spans, mut clamped), (i, &duration)| {
                let cursor = match (offsets.last(), spans.last()) {
                    (Some(&offset), Some(&span)) => offset + span - transition,
                    _ => 0.0,
                };
                offsets.push(cursor);

                // Non-final clips must outlast the next crossfade; the last one the previous.
                let needed = if i < last {
                    MIN_EFFECTIVE_DURATION + transition
                } else if i > 0 {
                    transition
                } else {
                    0.0
                };
                if duration < needed {
                    clamped.push(i);
                }
                spans.push(duration.max(needed));
                (offsets, spans, clamped)
            },
        );

        let total = offsets
            .iter()
            .zip(&spans)
            .map(|(offset, span)| offset + span)
            .fold(0.0, f64::max);

        Self {
            offsets,
            durations: durations.to_vec(),
            spans,
            transition,
            total,
            clamped,
        }
    }

    /// Start offset of every clip, in clip order
    pub fn offsets(&self) -> &[f64] {
        &self.offsets
    }

    pub fn offset(&self, index: usize) -> Option<f64> {
        self.offsets.get(index).copied()
    }

    pub fn durations(&self) -> &[f64] {
        &self.durations
    }

    /// Time each clip occupies on its track, never less than its duration
    pub fn spans(&self) -> &[f64] {
        &self.spans
    }

    pub fn span(&self, index: usize) -> Option<f64> {
        self.spans.get(index).copied()
    }

    /// Total output duration
    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn transition(&self) -> f64 {
        self.transition
    }

    /// Indices of clips too short for their crossfades, whose span was extended
    pub fn clamped(&self) -> &[usize] {
        &self.clamped
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// End of clip `index` on the master timeline
    pub fn end_of(&self, index: usize) -> Option<f64> {
        Some(self.offsets.get(index)? + self.durations.get(index)?)
    }

    /// Iterate `(offset, duration)` pairs
    pub fn segments(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.offsets.iter().copied().zip(self.durations.iter().copied())
    }
}
