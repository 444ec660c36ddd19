use std::{future::Future, time::Duration};

use tokio::time::{interval, MissedTickBehavior};

/// Runs `tick` every `period`, forever.
///
/// A tick is awaited to completion before the next one starts, so ticks of
/// the same schedule never overlap. When a tick overruns its period, one
/// late tick runs right after it and any further missed ticks are skipped.
pub async fn run_periodic<F, Fut>(period: Duration, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // The first tick of a tokio interval completes immediately, we want the
    // first run to happen one period after startup.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        tick().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period() {
        let count = Arc::new(AtomicUsize::new(0));

        let handle = {
            let count = count.clone();
            tokio::spawn(run_periodic(Duration::from_secs(2), move || {
                let count = count.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                }
            }))
        };

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(9_500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 5);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn slow_ticks_do_not_overlap() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let count = Arc::new(AtomicUsize::new(0));

        let handle = {
            let running = running.clone();
            let peak = peak.clone();
            let count = count.clone();

            tokio::spawn(run_periodic(Duration::from_secs(2), move || {
                let running = running.clone();
                let peak = peak.clone();
                let count = count.clone();

                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);

                    // Each tick takes longer than two periods
                    tokio::time::sleep(Duration::from_secs(5)).await;

                    running.fetch_sub(1, Ordering::SeqCst);
                    count.fetch_add(1, Ordering::SeqCst);
                }
            }))
        };

        tokio::time::sleep(Duration::from_secs(30)).await;
        handle.abort();

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        // A late tick fires once as soon as the previous run is done, the
        // rest are dropped. Runs finish at 7s, 12s, 17s, 22s and 27s.
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }
}
