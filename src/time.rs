//! Presentation-clock time types
//!
//! Decoders stamp frames in their own stream time base; the sink decides
//! what is on screen using the player's presentation clock. [`MediaTime`]
//! is that clock's unit (integer microseconds, totally ordered), and
//! [`TimeSource`] maps decoder-local PTS ticks onto it.

use std::fmt;
use std::ops::{Add, Sub};

/// A timestamp or duration on the player's presentation clock.
///
/// Stored as whole microseconds. Doubles as a duration the same way the
/// sample metadata uses it: a sample's `time` and `duration` share this
/// type, with [`MediaTime::ZERO`] as the "valid until the next sample"
/// duration sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MediaTime(i64);

impl MediaTime {
    /// Zero time; also the open-ended duration sentinel.
    pub const ZERO: Self = Self(0);

    /// The maximum representable time.
    pub const MAX: Self = Self(i64::MAX);

    /// Construct from whole microseconds.
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Construct from whole milliseconds.
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis * 1_000)
    }

    /// Construct from whole seconds.
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs * 1_000_000)
    }

    /// Construct from fractional seconds, rounding to the nearest microsecond.
    pub fn from_secs_f64(secs: f64) -> Self {
        Self((secs * 1_000_000.0).round() as i64)
    }

    /// Convert a tick count in an arbitrary `num / den` seconds-per-tick
    /// time base, e.g. `from_timescale(3003, 1001, 30_000)` for one frame
    /// of 29.97 fps footage.
    ///
    /// This is the stream `time_base` conversion every demuxer applies to
    /// raw PTS values before they are comparable across streams.
    pub fn from_timescale(ticks: i64, num: u32, den: u32) -> Self {
        debug_assert!(den != 0, "time base denominator must be non-zero");
        if den == 0 {
            return Self::ZERO;
        }
        Self((ticks as i128 * num as i128 * 1_000_000 / den as i128) as i64)
    }

    /// Whole microseconds.
    pub const fn as_micros(self) -> i64 {
        self.0
    }

    /// Whole milliseconds, truncated.
    pub const fn as_millis(self) -> i64 {
        self.0 / 1_000
    }

    /// Fractional seconds.
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Whether this value is the zero / open-ended sentinel.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Saturating addition.
    pub const fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    /// Saturating subtraction.
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Add for MediaTime {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for MediaTime {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl fmt::Display for MediaTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.as_secs_f64())
    }
}

/// Maps decoder-local PTS ticks onto the presentation clock.
///
/// Holds the stream time base plus an offset anchoring the stream's first
/// usable timestamp at the player's chosen origin (streams rarely start
/// at PTS zero after a seek).
#[derive(Debug, Clone, Copy)]
pub struct TimeSource {
    num: u32,
    den: u32,
    offset: MediaTime,
}

impl TimeSource {
    /// Create a time source for a `num / den` seconds-per-tick time base.
    pub fn new(num: u32, den: u32) -> Self {
        debug_assert!(den != 0, "time base denominator must be non-zero");
        Self {
            num,
            den: den.max(1),
            offset: MediaTime::ZERO,
        }
    }

    /// Anchor the stream so that `translate(first_pts)` lands on `origin`.
    pub fn anchored(num: u32, den: u32, first_pts: i64, origin: MediaTime) -> Self {
        let unanchored = Self::new(num, den);
        let offset = origin - MediaTime::from_timescale(first_pts, num, den);
        Self { offset, ..unanchored }
    }

    /// Translate a decoder-local PTS tick count to presentation time.
    pub fn translate(&self, pts: i64) -> MediaTime {
        MediaTime::from_timescale(pts, self.num, self.den) + self.offset
    }

    /// The anchoring offset currently applied.
    pub fn offset(&self) -> MediaTime {
        self.offset
    }
}

/// Wall-clock timecode attached to a sample when the source carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timecode {
    pub hours: u32,
    pub minutes: u8,
    pub seconds: u8,
    pub frames: u32,
}

impl Timecode {
    /// Derive a timecode from a presentation time at a nominal frame rate.
    pub fn from_time(time: MediaTime, fps: f64) -> Self {
        let total_secs = time.as_micros().max(0) / 1_000_000;
        let sub_secs = (time.as_micros().max(0) % 1_000_000) as f64 / 1_000_000.0;
        Self {
            hours: (total_secs / 3600) as u32,
            minutes: ((total_secs / 60) % 60) as u8,
            seconds: (total_secs % 60) as u8,
            frames: (sub_secs * fps) as u32,
        }
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}:{:02}",
            self.hours, self.minutes, self.seconds, self.frames
        )
    }
}
