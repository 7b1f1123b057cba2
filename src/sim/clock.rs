use chrono::{NaiveDateTime, TimeDelta};

/// One step of the simulation calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub step: usize,
    pub time: NaiveDateTime,
}

/// A simulation clock that walks a fixed number of equally spaced steps
/// from a start timestamp.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use river_sim::sim::clock::Clock;
///
/// let start = NaiveDate::from_ymd_opt(2024, 1, 1)
///     .unwrap()
///     .and_hms_opt(0, 0, 0)
///     .unwrap();
/// let mut clock = Clock::new(start, 3600.0, 3);
/// let mut steps = Vec::new();
///
/// clock.run(|tick| steps.push(tick.step));
/// assert_eq!(steps, vec![0, 1, 2]);
/// ```
#[derive(Debug, Clone)]
pub struct Clock {
    start: NaiveDateTime,
    dt: TimeDelta,
    /// Next step to hand out
    current: usize,
    /// Total steps in the horizon
    total: usize,
}

impl Clock {
    /// Creates a clock.
    ///
    /// # Arguments
    ///
    /// * `start` - Timestamp of step 0
    /// * `dt_seconds` - Step length, rounded to whole milliseconds
    /// * `total` - Number of steps
    pub fn new(start: NaiveDateTime, dt_seconds: f64, total: usize) -> Self {
        Self {
            start,
            dt: TimeDelta::milliseconds((dt_seconds * 1000.0).round() as i64),
            current: 0,
            total,
        }
    }

    /// Timestamp of `step`; saturates at the calendar's upper limit.
    pub fn time_of(&self, step: usize) -> NaiveDateTime {
        i32::try_from(step)
            .ok()
            .and_then(|s| self.dt.checked_mul(s))
            .and_then(|offset| self.start.checked_add_signed(offset))
            .unwrap_or(NaiveDateTime::MAX)
    }

    /// Advances the clock by one step.
    ///
    /// Returns `None` once every step has been handed out.
    pub fn tick(&mut self) -> Option<Tick> {
        if self.current < self.total {
            let step = self.current;
            self.current += 1;
            Some(Tick {
                step,
                time: self.time_of(step),
            })
        } else {
            None
        }
    }

    /// Runs a function for each remaining step.
    pub fn run(&mut self, mut f: impl FnMut(Tick)) {
        while let Some(tick) = self.tick() {
            f(tick);
        }
    }
}

impl Iterator for Clock {
    type Item = Tick;

    fn next(&mut self) -> Option<Tick> {
        self.tick()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.total - self.current;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Clock {}
