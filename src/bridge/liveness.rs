use std::future;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use super::Leg;

/// Shortest ping period; a zero period would make `interval_at` panic.
const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Per-leg keepalive schedule.
///
/// Each leg gets its own interval so one side falling behind never delays the
/// other. Pong replies are not tracked: a peer that keeps the socket open but
/// stops answering is not disconnected by this monitor.
#[derive(Debug, Default)]
pub struct LivenessMonitor {
    inbound: Option<Interval>,
    outbound: Option<Interval>,
}

impl LivenessMonitor {
    /// A monitor with no running timers.
    pub fn idle() -> Self {
        Self::default()
    }

    /// Starts both timers; the first ping is due one full period from now.
    pub fn start(period: Duration) -> Self {
        Self {
            inbound: Some(Self::timer(period)),
            outbound: Some(Self::timer(period)),
        }
    }

    fn timer(period: Duration) -> Interval {
        let period = period.max(MIN_PERIOD);
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer
    }

    pub fn is_running(&self, leg: Leg) -> bool {
        match leg {
            Leg::Inbound => self.inbound.is_some(),
            Leg::Outbound => self.outbound.is_some(),
        }
    }

    /// Stops the timer for `leg`. Cancelling a stopped timer is a no-op.
    pub fn cancel(&mut self, leg: Leg) {
        match leg {
            Leg::Inbound => self.inbound = None,
            Leg::Outbound => self.outbound = None,
        }
    }

    pub fn cancel_all(&mut self) {
        self.cancel(Leg::Inbound);
        self.cancel(Leg::Outbound);
    }

    /// Resolves with the leg whose ping is due. Never resolves once both timers
    /// are cancelled. Cancel-safe, so it can sit in a `select!` loop.
    pub async fn next_due(&mut self) -> Leg {
        match (self.inbound.as_mut(), self.outbound.as_mut()) {
            (Some(inbound), Some(outbound)) => tokio::select! {
                _ = inbound.tick() => Leg::Inbound,
                _ = outbound.tick() => Leg::Outbound,
            },
            (Some(inbound), None) => {
                inbound.tick().await;
                Leg::Inbound
            }
            (None, Some(outbound)) => {
                outbound.tick().await;
                Leg::Outbound
            }
            (None, None) => future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, timeout};

    const PERIOD: Duration = Duration::from_secs(25);

    #[tokio::test(start_paused = true)]
    async fn test_first_ping_waits_one_period() {
        let mut monitor = LivenessMonitor::start(PERIOD);
        assert!(timeout(Duration::from_secs(24), monitor.next_due()).await.is_err());

        advance(Duration::from_secs(2)).await;
        let leg = timeout(Duration::from_millis(1), monitor.next_due()).await;
        assert!(leg.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_both_legs_fire_each_period() {
        let mut monitor = LivenessMonitor::start(PERIOD);
        let mut fired = Vec::new();
        for _ in 0..4 {
            fired.push(monitor.next_due().await);
        }
        assert_eq!(fired.iter().filter(|leg| **leg == Leg::Inbound).count(), 2);
        assert_eq!(fired.iter().filter(|leg| **leg == Leg::Outbound).count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_one_leg_keeps_other() {
        let mut monitor = LivenessMonitor::start(PERIOD);
        monitor.cancel(Leg::Inbound);
        assert!(!monitor.is_running(Leg::Inbound));
        assert!(monitor.is_running(Leg::Outbound));

        for _ in 0..3 {
            assert_eq!(monitor.next_due().await, Leg::Outbound);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent_and_silences_monitor() {
        let mut monitor = LivenessMonitor::start(PERIOD);
        monitor.cancel_all();
        monitor.cancel_all();
        monitor.cancel(Leg::Outbound);

        assert!(!monitor.is_running(Leg::Inbound));
        assert!(!monitor.is_running(Leg::Outbound));
        assert!(timeout(PERIOD * 10, monitor.next_due()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_period_clamped_to_one_second() {
        let mut monitor = LivenessMonitor::start(Duration::ZERO);
        assert!(timeout(Duration::from_millis(900), monitor.next_due()).await.is_err());

        advance(Duration::from_millis(200)).await;
        let leg = timeout(Duration::from_millis(1), monitor.next_due()).await;
        assert!(leg.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_monitor_never_fires() {
        let mut monitor = LivenessMonitor::idle();
        assert!(timeout(PERIOD * 4, monitor.next_due()).await.is_err());
    }
}
