use std::fmt;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Wrapper structure for printing durations in human printable format.
///
/// Each nonzero unit from days down to nanoseconds is printed in turn, so an
/// hour and a half reads `1h30m`.
#[derive(Copy, Clone, Debug)]
pub struct HRDuration {
    inner: Duration
}

impl From<Duration> for HRDuration {
    fn from(duration: Duration) -> HRDuration {
        HRDuration {
            inner: duration
        }
    }
}

impl From<HRDuration> for Duration {
    fn from(duration: HRDuration) -> Duration {
        duration.inner
    }
}

const SECOND_UNITS : [(u64, &str); 4] = [(24 * 60 * 60, "d"), (60 * 60, "h"), (60, "m"), (1, "s")];
const NANO_UNITS : [(u32, &str); 3] = [(1000 * 1000, "ms"), (1000, "μs"), (1, "ns")];

impl Display for HRDuration {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.inner == Duration::from_secs(0) {
            return write!(f, "0s");
        }

        let mut secs = self.inner.as_secs();
        for (scale, suffix) in SECOND_UNITS.iter() {
            let count = secs / scale;
            secs %= scale;

            if count > 0 {
                write!(f, "{}{}", count, suffix)?;
            }
        }

        let mut nanos = self.inner.subsec_nanos();
        for (scale, suffix) in NANO_UNITS.iter() {
            let count = nanos / scale;
            nanos %= scale;

            if count > 0 {
                write!(f, "{}{}", count, suffix)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::units::HRDuration;
    use std::time::Duration;

    #[test]
    fn time_hours() {
        let my_time = Duration::new(12*60*60 + 30*60 + 14, 0);
        let fmtd = format!("{}", HRDuration::from(my_time));

        assert_eq!(fmtd, "12h30m14s");
    }

    #[test]
    fn time_days() {
        let my_time = Duration::new(14*24*60*60 + 12*60*60 + 30*60 + 14, 0);
        let fmtd = format!("{}", HRDuration::from(my_time));

        assert_eq!(fmtd, "14d12h30m14s");
    }

    #[test]
    fn time_nanos() {
        let my_time = Duration::new(30*60 + 14, 123);
        let fmtd = format!("{}", HRDuration::from(my_time));

        assert_eq!(fmtd, "30m14s123ns");
    }

    #[test]
    fn time_millis() {
        let my_time = Duration::from_micros(2_500_250);
        let fmtd = format!("{}", HRDuration::from(my_time));

        assert_eq!(fmtd, "2s500ms250μs");
    }

    #[test]
    fn time_zero() {
        assert_eq!(format!("{}", HRDuration::from(Duration::from_secs(0))), "0s");
    }
}
