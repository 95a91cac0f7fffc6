//! Wall-clock pacing for outbound live delivery.

use std::time::{Duration, Instant};

use ffmpeg_next::Rational;
use tokio_util::sync::CancellationToken;

use crate::rescale::{TIME_BASE_Q, rescale};

/// Longest uninterrupted sleep before the cancellation token is polled again.
const SLEEP_SLICE: Duration = Duration::from_millis(20);

pub trait Clock {
    fn now(&self) -> Instant;

    /// Block for `duration`, returning early once `cancel` fires.
    fn sleep(&self, duration: Duration, cancel: &CancellationToken);
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&self, duration: Duration, cancel: &CancellationToken) {
        (**self).sleep(duration, cancel)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration, cancel: &CancellationToken) {
        let deadline = Instant::now() + duration;
        loop {
            if cancel.is_cancelled() {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pace {
    /// Packet is due (or has no DTS): hand it over right away.
    Immediate,
    Waited(Duration),
    Cancelled,
}

/// Holds back packets until their DTS has elapsed on the wall clock.
pub struct Pacer<C: Clock = SystemClock> {
    clock: C,
    start: Option<Instant>,
}

impl<C: Clock> Pacer<C> {
    pub fn new(clock: C) -> Self {
        Self { clock, start: None }
    }

    /// Capture the wall-clock origin. Called right after the header is written.
    pub fn start(&mut self) {
        self.start = Some(self.clock.now());
    }

    pub fn elapsed(&self) -> Duration {
        match self.start {
            Some(start) => self.clock.now().saturating_duration_since(start),
            None => Duration::ZERO,
        }
    }

    /// How long a packet with `dts` (in `time_base`) must still be held back.
    pub fn delay_for(&self, dts: Option<i64>, time_base: Rational) -> Option<Duration> {
        let dts = dts?;
        let due_us = rescale(dts, time_base, TIME_BASE_Q);
        let elapsed_us = i64::try_from(self.elapsed().as_micros()).unwrap_or(i64::MAX);
        if due_us > elapsed_us {
            Some(Duration::from_micros((due_us - elapsed_us) as u64))
        } else {
            None
        }
    }

    pub fn pace(
        &mut self,
        dts: Option<i64>,
        time_base: Rational,
        cancel: &CancellationToken,
    ) -> Pace {
        if cancel.is_cancelled() {
            return Pace::Cancelled;
        }
        if self.start.is_none() {
            log::warn!("pacer used before start, starting now");
            self.start();
        }
        match self.delay_for(dts, time_base) {
            Some(delay) => {
                self.clock.sleep(delay, cancel);
                if cancel.is_cancelled() {
                    Pace::Cancelled
                } else {
                    Pace::Waited(delay)
                }
            }
            None => Pace::Immediate,
        }
    }
}
