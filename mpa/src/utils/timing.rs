//! Fixed-resolution media time.
//!
//! Frame durations are kept as whole seconds plus a fraction counted in
//! units of 1/352 800 000 s. Every MPEG audio sample rate divides this
//! resolution, so adding up per-frame durations never drifts.

use std::fmt::{Display, Formatter};
use std::ops::{Add, AddAssign};

/// Fraction units per second.
pub const TIME_RESOLUTION: u64 = 352_800_000;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MediaTime {
    seconds: u64,
    fraction: u64,
}

impl MediaTime {
    pub const ZERO: Self = Self {
        seconds: 0,
        fraction: 0,
    };

    pub fn new(seconds: u64, fraction: u64) -> Self {
        Self {
            seconds: seconds + fraction / TIME_RESOLUTION,
            fraction: fraction % TIME_RESOLUTION,
        }
    }

    /// Duration of `samples` samples at `sample_rate` Hz.
    ///
    /// Exact for every sample rate that divides [`TIME_RESOLUTION`]; other
    /// rates round down to the nearest fraction unit.
    pub fn from_samples(samples: u64, sample_rate: u32) -> Self {
        if sample_rate == 0 {
            return Self::ZERO;
        }

        let rate = sample_rate as u64;
        let seconds = samples / rate;
        let remainder = samples % rate;
        let fraction = if TIME_RESOLUTION % rate == 0 {
            remainder * (TIME_RESOLUTION / rate)
        } else {
            ((remainder as u128 * TIME_RESOLUTION as u128) / rate as u128) as u64
        };

        Self::new(seconds, fraction)
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(ms / 1000, (ms % 1000) * (TIME_RESOLUTION / 1000))
    }

    pub fn seconds(&self) -> u64 {
        self.seconds
    }

    pub fn fraction(&self) -> u64 {
        self.fraction
    }

    /// Whole milliseconds, rounded down.
    pub fn as_millis(&self) -> u64 {
        self.seconds * 1000 + self.fraction / (TIME_RESOLUTION / 1000)
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.seconds as f64 + self.fraction as f64 / TIME_RESOLUTION as f64
    }

    pub fn is_zero(&self) -> bool {
        self.seconds == 0 && self.fraction == 0
    }
}

impl Add for MediaTime {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.seconds + rhs.seconds, self.fraction + rhs.fraction)
    }
}

impl AddAssign for MediaTime {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Display for MediaTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let ms = self.as_millis();
        let hours = ms / 3_600_000;
        write!(
            f,
            "{hours:0width$}:{:02}:{:02}.{:03}",
            (ms % 3_600_000) / 60_000,
            (ms % 60_000) / 1000,
            ms % 1000,
            width = if hours >= 100 { 0 } else { 2 }
        )
    }
}

#[test]
fn frame_durations_accumulate_exactly() {
    // 1152 samples at 44.1 kHz, 100 000 times
    let frame = MediaTime::from_samples(1152, 44100);
    let mut total = MediaTime::ZERO;
    for _ in 0..100_000 {
        total += frame;
    }

    assert_eq!(total, MediaTime::from_samples(115_200_000, 44100));
    assert_eq!(total.seconds(), 2612);
    assert_eq!(total.as_millis(), 2_612_244);
}

#[test]
fn display_and_millis() {
    let t = MediaTime::from_millis(3_723_004);
    assert_eq!(t.to_string(), "01:02:03.004");
    assert_eq!(t.as_millis(), 3_723_004);
    assert_eq!(MediaTime::from_samples(576, 22050).as_millis(), 26);
}
