use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

pub(super) const ACTION_RESULT_POLL_INTERVAL: Duration = Duration::from_millis(24);

/// Shared flag checked by a background job and by the main-loop poller.
#[derive(Debug, Clone, Default)]
pub(crate) struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub(super) fn spawn_worker_action<T, W, H>(work: W, on_result: H)
where
    T: Send + 'static,
    W: FnOnce() -> T + Send + 'static,
    H: FnMut(T) + 'static,
{
    spawn_cancellable_worker_action(CancelToken::new(), move |_| work(), on_result);
}

/// Runs `work` on a thread and hands its result to `on_result` on the GTK
/// main loop. Once `token` is cancelled the result is dropped undelivered.
pub(super) fn spawn_cancellable_worker_action<T, W, H>(token: CancelToken, work: W, mut on_result: H)
where
    T: Send + 'static,
    W: FnOnce(&CancelToken) -> T + Send + 'static,
    H: FnMut(T) + 'static,
{
    let (tx, rx) = mpsc::channel::<T>();
    let worker_token = token.clone();
    std::thread::spawn(move || {
        let result = work(&worker_token);
        let _ = tx.send(result);
    });

    gtk4::glib::timeout_add_local(ACTION_RESULT_POLL_INTERVAL, move || {
        match poll_result(&rx, &token) {
            PollOutcome::Pending => gtk4::glib::ControlFlow::Continue,
            PollOutcome::Ready(result) => {
                on_result(result);
                gtk4::glib::ControlFlow::Break
            }
            PollOutcome::Dropped => gtk4::glib::ControlFlow::Break,
        }
    });
}

#[derive(Debug, PartialEq, Eq)]
enum PollOutcome<T> {
    Pending,
    Ready(T),
    Dropped,
}

fn poll_result<T>(rx: &mpsc::Receiver<T>, token: &CancelToken) -> PollOutcome<T> {
    if token.is_cancelled() {
        tracing::debug!("dropping result of cancelled background job");
        return PollOutcome::Dropped;
    }
    match rx.try_recv() {
        Ok(result) => PollOutcome::Ready(result),
        Err(mpsc::TryRecvError::Empty) => PollOutcome::Pending,
        Err(mpsc::TryRecvError::Disconnected) => PollOutcome::Dropped,
    }
}
