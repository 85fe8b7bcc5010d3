use std::fmt;
use std::ops::{Add, Sub};
use std::time::Duration;

use element_sys as sys;

/// Nanosecond timestamp. `Option<ClockTime>` is the host form of
/// `el_clock_time`, with `None` standing for `EL_CLOCK_TIME_NONE`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ClockTime(u64);

impl ClockTime {
    pub const ZERO: ClockTime = ClockTime(0);
    pub const NSECOND: ClockTime = ClockTime(1);
    pub const USECOND: ClockTime = ClockTime(1_000);
    pub const MSECOND: ClockTime = ClockTime(1_000_000);
    pub const SECOND: ClockTime = ClockTime(1_000_000_000);
    pub const MAX: ClockTime = ClockTime(sys::EL_CLOCK_TIME_NONE - 1);

    /// `None` for the reserved "no time" value.
    pub const fn try_from_nseconds(nseconds: u64) -> Option<Self> {
        if nseconds == sys::EL_CLOCK_TIME_NONE {
            None
        } else {
            Some(ClockTime(nseconds))
        }
    }

    /// Saturates at [`ClockTime::MAX`].
    pub const fn from_nseconds(nseconds: u64) -> Self {
        if nseconds == sys::EL_CLOCK_TIME_NONE {
            Self::MAX
        } else {
            ClockTime(nseconds)
        }
    }

    pub const fn from_mseconds(mseconds: u64) -> Self {
        Self::from_nseconds(mseconds.saturating_mul(1_000_000))
    }

    pub const fn from_seconds(seconds: u64) -> Self {
        Self::from_nseconds(seconds.saturating_mul(1_000_000_000))
    }

    pub const fn nseconds(self) -> u64 {
        self.0
    }

    pub const fn mseconds(self) -> u64 {
        self.0 / 1_000_000
    }

    pub const fn seconds(self) -> u64 {
        self.0 / 1_000_000_000
    }

    pub fn from_raw(raw: sys::el_clock_time) -> Option<Self> {
        Self::try_from_nseconds(raw)
    }

    pub fn option_into_raw(time: Option<Self>) -> sys::el_clock_time {
        time.map_or(sys::EL_CLOCK_TIME_NONE, |time| time.0)
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).and_then(Self::try_from_nseconds)
    }
}

impl Add for ClockTime {
    type Output = ClockTime;

    fn add(self, rhs: Self) -> Self {
        Self::from_nseconds(self.0.saturating_add(rhs.0))
    }
}

impl Sub for ClockTime {
    type Output = ClockTime;

    fn sub(self, rhs: Self) -> Self {
        ClockTime(self.0.saturating_sub(rhs.0))
    }
}

impl From<Duration> for ClockTime {
    fn from(duration: Duration) -> Self {
        Self::from_nseconds(u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX))
    }
}

impl From<ClockTime> for Duration {
    fn from(time: ClockTime) -> Self {
        Duration::from_nanos(time.0)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nanos = self.0 % 1_000_000_000;
        let total = self.0 / 1_000_000_000;
        write!(f, "{}:{:02}:{:02}.{:09}", total / 3600, (total / 60) % 60, total % 60, nanos)
    }
}

impl fmt::Debug for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn every_raw_time_survives_the_host_form(raw in any::<u64>()) {
            prop_assert_eq!(ClockTime::option_into_raw(ClockTime::from_raw(raw)), raw);
        }

        #[test]
        fn every_host_time_survives_the_raw_form(time in proptest::option::of(0..sys::EL_CLOCK_TIME_NONE)) {
            let time = time.map(ClockTime::from_nseconds);
            prop_assert_eq!(ClockTime::from_raw(ClockTime::option_into_raw(time)), time);
        }
    }

    #[test]
    fn none_is_reserved() {
        assert_eq!(ClockTime::from_raw(sys::EL_CLOCK_TIME_NONE), None);
        assert_eq!(ClockTime::option_into_raw(None), sys::EL_CLOCK_TIME_NONE);
        assert_eq!(ClockTime::from_nseconds(u64::MAX), ClockTime::MAX);
    }

    #[test]
    fn display_splits_hours_minutes_seconds() {
        let time = ClockTime::from_seconds(3723) + ClockTime::from_nseconds(5);
        assert_eq!(time.to_string(), "1:02:03.000000005");
    }
}
