//! Render scheduler (C5): coalesces any number of damage notifications
//! within one cooperative tick into at most one `on_render` firing.

use tokio::sync::Notify;

/// `schedule()` is idempotent within a tick; `next_render()` resolves on the
/// next frame boundary. There is exactly one scheduler per engine (not per
/// proc) — §4.7 attaches the per-proc listener that calls into it only for
/// the currently selected proc.
pub struct RenderScheduler {
    pending: std::sync::atomic::AtomicBool,
    notify: Notify,
}

impl RenderScheduler {
    pub fn new() -> Self {
        RenderScheduler { pending: std::sync::atomic::AtomicBool::new(false), notify: Notify::new() }
    }

    /// Mark a render as needed. First caller in a tick wakes the render
    /// task; subsequent calls before the next `next_render().await` resolves
    /// are no-ops — this is the coalescing guarantee.
    pub fn schedule(&self) {
        if !self.pending.swap(true, std::sync::atomic::Ordering::SeqCst) {
            self.notify.notify_one();
        }
    }

    /// Resolves the next time `schedule()` has been called since the last
    /// resolution, clearing the pending flag first so a `schedule()` that
    /// races with the clear is never lost (it will simply set `pending`
    /// again and wake the very next `notified()` call).
    pub async fn next_render(&self) {
        self.notify.notified().await;
        self.pending.store(false, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Default for RenderScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn multiple_schedules_in_one_tick_yield_one_render() {
        let sched = Arc::new(RenderScheduler::new());
        for _ in 0..20 {
            sched.schedule();
        }
        let fired = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let fired2 = fired.clone();
        let sched2 = sched.clone();
        let task = tokio::spawn(async move {
            sched2.next_render().await;
            fired2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });
        task.await.unwrap();
        assert_eq!(fired.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn schedule_after_render_triggers_another() {
        let sched = RenderScheduler::new();
        sched.schedule();
        sched.next_render().await;
        sched.schedule();
        tokio::time::timeout(std::time::Duration::from_millis(200), sched.next_render())
            .await
            .expect("second render should fire");
    }
}
