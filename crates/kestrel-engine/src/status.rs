use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Soundness and precision of an analysis result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlgorithmStatus {
    sound: bool,
    precise: bool,
}

impl Default for AlgorithmStatus {
    fn default() -> Self {
        Self::SOUND_AND_PRECISE
    }
}

impl AlgorithmStatus {
    pub const SOUND_AND_PRECISE: Self = Self {
        sound: true,
        precise: true,
    };

    pub fn is_sound(&self) -> bool {
        self.sound
    }

    pub fn is_precise(&self) -> bool {
        self.precise
    }

    /// Both results combined: sound and precise only if both are.
    pub fn update(self, other: Self) -> Self {
        Self {
            sound: self.sound && other.sound,
            precise: self.precise && other.precise,
        }
    }

    pub fn with_sound(self, sound: bool) -> Self {
        Self { sound, ..self }
    }

    pub fn with_precise(self, precise: bool) -> Self {
        Self { precise, ..self }
    }
}

/// Cooperative cancellation flag shared between the engine and its owner.
#[derive(Clone, Debug, Default)]
pub struct ShutdownNotifier(Arc<AtomicBool>);

impl ShutdownNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_shutdown(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn should_shutdown(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters collected while exploring.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStatistics {
    pub iterations: usize,
    pub max_waitlist_size: usize,
    pub total_waitlist_size: usize,
    pub successors: usize,
    pub max_successors: usize,
    pub merges: usize,
    pub stops: usize,
    pub breaks: usize,
    pub forced_coverings: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
}

impl EngineStatistics {
    pub(crate) fn record_waitlist(&mut self, size: usize) {
        self.iterations += 1;
        self.total_waitlist_size += size;
        self.max_waitlist_size = self.max_waitlist_size.max(size);
    }

    pub(crate) fn record_successors(&mut self, count: usize) {
        self.successors += count;
        self.max_successors = self.max_successors.max(count);
    }

    pub fn average_waitlist_size(&self) -> f64 {
        if self.iterations == 0 {
            0.0
        } else {
            self.total_waitlist_size as f64 / self.iterations as f64
        }
    }
}
