//! DTLS flight retransmission timing.

use std::ops::Mul;
use std::time::{Duration, Instant};

use crate::rng::SeededRng;

// In seconds.
const JITTER_RANGE: f32 = 0.5;

/// Doubling retransmission timeout with a little jitter.
#[derive(Debug)]
pub(crate) struct ExponentialBackoff {
    start_rto: Duration,
    retries: usize,
    rto: Duration,
    jitter: f32,
    left: usize,
}

impl ExponentialBackoff {
    pub fn new(start_rto: Duration, retries: usize, rng: &mut SeededRng) -> Self {
        Self {
            start_rto,
            retries,
            rto: start_rto,
            jitter: Self::jitter(rng),
            left: retries,
        }
    }

    pub fn reset(&mut self, rng: &mut SeededRng) {
        self.rto = self.start_rto;
        self.jitter = Self::jitter(rng);
        self.left = self.retries;
    }

    pub fn rto(&self) -> Duration {
        if self.jitter < 0.0 {
            let duration = Duration::from_secs_f32(self.jitter.abs());
            self.rto.saturating_sub(duration)
        } else {
            self.rto + Duration::from_secs_f32(self.jitter)
        }
        .max(Duration::from_millis(50))
    }

    // A value between -0.25s and 0.25s
    fn jitter(rng: &mut SeededRng) -> f32 {
        rng.random::<f32>() * JITTER_RANGE - (JITTER_RANGE / 2.0)
    }

    pub fn attempt(&mut self, rng: &mut SeededRng) {
        let Some(n) = self.left.checked_sub(1) else {
            return;
        };

        self.left = n;
        self.jitter = Self::jitter(rng);
        self.rto = self.rto.mul(2);
    }

    pub fn can_retry(&self) -> bool {
        self.left > 0
    }
}

/// When the buffered flight is due for a resend.
#[derive(Debug)]
pub(crate) struct RetransmitTimer {
    backoff: ExponentialBackoff,
    deadline: Option<Instant>,
}

impl RetransmitTimer {
    pub fn new(start_rto: Duration, retries: usize, rng: &mut SeededRng) -> Self {
        Self {
            backoff: ExponentialBackoff::new(start_rto, retries, rng),
            deadline: None,
        }
    }

    /// A new flight went out. Restart the backoff from the first timeout.
    pub fn arm(&mut self, now: Instant, rng: &mut SeededRng) {
        self.backoff.reset(rng);
        self.deadline = Some(now + self.backoff.rto());
    }

    /// The peer answered. Nothing to resend.
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether a resend is due at `now`.
    ///
    /// `Ok(true)` moves the deadline one backoff step further out. Running out
    /// of retries is reported as `Err(())`.
    pub fn poll(&mut self, now: Instant, rng: &mut SeededRng) -> Result<bool, ()> {
        let Some(deadline) = self.deadline else {
            return Ok(false);
        };
        if now < deadline {
            return Ok(false);
        }
        if !self.backoff.can_retry() {
            self.deadline = None;
            return Err(());
        }
        self.backoff.attempt(rng);
        self.deadline = Some(now + self.backoff.rto());
        Ok(true)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn attempts() {
        let mut rng = SeededRng::new(Some(42));
        let mut exp = ExponentialBackoff::new(Duration::from_secs(1), 3, &mut rng);

        let mut last = exp.rto().as_millis();
        assert_eq!(exp.rto().as_millis(), last);

        for _ in 0..3 {
            assert!(exp.can_retry());
            exp.attempt(&mut rng);
            let n = exp.rto().as_millis();
            assert!(n > last);
            last = n;
        }

        assert!(!exp.can_retry());
        exp.attempt(&mut rng);
        assert_eq!(exp.rto().as_millis(), last);
    }

    #[test]
    fn timer_fires_then_gives_up() {
        let mut rng = SeededRng::new(Some(7));
        let mut timer = RetransmitTimer::new(Duration::from_secs(1), 1, &mut rng);
        let now = Instant::now();

        assert_eq!(timer.poll(now, &mut rng), Ok(false));

        timer.arm(now, &mut rng);
        assert_eq!(timer.poll(now, &mut rng), Ok(false));

        let later = now + Duration::from_secs(2);
        assert_eq!(timer.poll(later, &mut rng), Ok(true));

        let much_later = later + Duration::from_secs(10);
        assert_eq!(timer.poll(much_later, &mut rng), Err(()));
        assert!(timer.deadline().is_none());
    }
}
