//! Background active expiration.
//!
//! Lazy expiration only reclaims records that something reads. A record
//! that expires and is never touched again would sit in memory forever,
//! so a background task sweeps for it.
//!
//! Each cycle the sweeper takes the keyspace lock, samples up to
//! [`ACTIVE_EXPIRE_SAMPLE`] records that carry an expiration, and deletes
//! the expired ones. Sampling bounds the critical section no matter how
//! large the keyspace grows. If at least a quarter of the sample had
//! expired, the keyspace probably holds more garbage and the sweeper runs
//! again immediately; otherwise it sleeps for [`SWEEP_INTERVAL`]. A cycle
//! that sampled nothing always sleeps.

use crate::storage::Keyspace;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// How many expiring records one cycle may examine.
pub const ACTIVE_EXPIRE_SAMPLE: usize = 20;

/// Pause between cycles when the sample was mostly alive.
pub const SWEEP_INTERVAL: Duration = Duration::from_millis(100);

/// Handle to the running expirer. Dropping it stops the task.
#[derive(Debug)]
pub struct ExpirerHandle {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirerHandle {
    /// Stops the expirer. Called automatically on drop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for ExpirerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawns the expirer as a background task and returns its handle.
pub fn start_expirer(store: Arc<Keyspace>) -> ExpirerHandle {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(expirer_loop(store, shutdown_rx));
    info!("active expirer started");
    ExpirerHandle { shutdown_tx }
}

async fn expirer_loop(store: Arc<Keyspace>, mut shutdown_rx: watch::Receiver<bool>) {
    loop {
        let (expired, sampled) = store.sweep_sample(ACTIVE_EXPIRE_SAMPLE);

        if expired > 0 {
            debug!(expired, sampled, "removed expired records");
        } else {
            trace!(sampled, "sweep cycle found nothing expired");
        }

        // Expressed as a cross-multiplication so an empty sample can
        // never divide by zero: it simply falls through to the sleep.
        if sampled > 0 && expired * 4 >= sampled {
            if *shutdown_rx.borrow() {
                return;
            }
            continue;
        }

        tokio::select! {
            _ = tokio::time::sleep(SWEEP_INTERVAL) => {}
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    debug!("active expirer shutting down");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::now_ms;
    use bytes::Bytes;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[tokio::test]
    async fn expirer_removes_unread_expired_records() {
        let store = Arc::new(Keyspace::new());
        let past = now_ms().saturating_sub(10);
        for i in 0..10 {
            store.set(b(&format!("dead{}", i)), b("v"), Some(past));
        }
        store.set(b("forever"), b("v"), None);
        assert_eq!(store.len(), 11);

        let _expirer = start_expirer(Arc::clone(&store));
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(store.len(), 1);
        assert_eq!(store.exists(&[b("forever")]), 1);
    }

    #[tokio::test]
    async fn expirer_drains_more_than_one_sample_per_interval() {
        // 100 expired records need five 20-record cycles; the 25% rule
        // makes them back-to-back, so one interval is plenty.
        let store = Arc::new(Keyspace::new());
        let past = now_ms().saturating_sub(10);
        for i in 0..100 {
            store.set(b(&format!("dead{}", i)), b("v"), Some(past));
        }

        let _expirer = start_expirer(Arc::clone(&store));
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn expirer_stops_when_the_handle_drops() {
        let store = Arc::new(Keyspace::new());
        {
            let _expirer = start_expirer(Arc::clone(&store));
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        // Expire a record after the sweeper is gone; only a lazy read
        // may remove it now.
        store.set(b("k"), b("v"), Some(now_ms().saturating_sub(1)));
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&b("k")), Ok(None));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn expirer_idles_on_a_keyspace_without_expirations() {
        let store = Arc::new(Keyspace::new());
        store.set(b("a"), b("1"), None);
        store.set(b("b"), b("2"), None);

        let _expirer = start_expirer(Arc::clone(&store));
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert_eq!(store.len(), 2);
    }
}
