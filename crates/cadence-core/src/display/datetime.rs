//! Date/time display utilities.

use std::fmt;

use jiff::{tz::TimeZone, SignedDuration, Timestamp};

/// Formats a timestamp in the system time zone as `YYYY-MM-DD HH:MM:SS TZ`.
pub struct LocalDateTime<'a>(pub &'a Timestamp);

impl fmt::Display for LocalDateTime<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.0
                .to_zoned(TimeZone::system())
                .strftime("%Y-%m-%d %H:%M:%S %Z")
        )
    }
}

/// Formats a duration compactly, e.g. `850ms`, `12.4s` or `3m 05s`.
///
/// ```rust
/// use cadence_core::display::Elapsed;
/// use jiff::SignedDuration;
///
/// assert_eq!(Elapsed(SignedDuration::from_millis(850)).to_string(), "850ms");
/// assert_eq!(Elapsed(SignedDuration::from_millis(12_400)).to_string(), "12.4s");
/// assert_eq!(Elapsed(SignedDuration::from_secs(185)).to_string(), "3m 05s");
/// ```
pub struct Elapsed(pub SignedDuration);

impl fmt::Display for Elapsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.0.as_millis().max(0);
        if millis < 1_000 {
            write!(f, "{millis}ms")
        } else if millis < 60_000 {
            write!(f, "{:.1}s", millis as f64 / 1_000.0)
        } else {
            let secs = millis / 1_000;
            write!(f, "{}m {:02}s", secs / 60, secs % 60)
        }
    }
}
