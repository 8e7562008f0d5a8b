//! The owner-thread queue behind the modal wait.

use crate::surface::ProgressSurface;
use kfr_common::{InvocationError, InvocationResult};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

/// Why the modal wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalResult {
    /// The user triggered the cancel action.
    CancelRequested,
    /// The background work reported completion.
    WorkFinished,
}

impl fmt::Display for ModalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModalResult::CancelRequested => write!(f, "cancel_requested"),
            ModalResult::WorkFinished => write!(f, "work_finished"),
        }
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

enum OwnerMessage {
    Run(Job),
    End(ModalResult),
}

/// Posts closures to the owner thread.
///
/// Cloneable and `Send`; the closures run on the owner thread while it is
/// inside [`ModalWait::show_modal`].
#[derive(Clone)]
pub struct OwnerHandle {
    tx: mpsc::UnboundedSender<OwnerMessage>,
}

impl OwnerHandle {
    /// Queue `job` for the owner thread. Returns false, and drops the job,
    /// when the modal wait is already gone.
    pub fn post<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match self.tx.send(OwnerMessage::Run(Box::new(job))) {
            Ok(()) => true,
            Err(_) => {
                debug!("Owner thread no longer waiting, dropping posted job");
                false
            }
        }
    }
}

impl fmt::Debug for OwnerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// The single "end modal wait" action.
///
/// All clones share one latch: the first `end` wins and is delivered to the
/// owner thread, every later call is a no-op.
#[derive(Clone)]
pub struct ModalEnder {
    tx: mpsc::UnboundedSender<OwnerMessage>,
    ended: Arc<AtomicBool>,
}

impl ModalEnder {
    /// End the modal wait with `result`. Returns true if this call was the
    /// one that ended it.
    pub fn end(&self, result: ModalResult) -> bool {
        if self
            .ended
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(result = %result, "Modal wait already ended, ignoring");
            return false;
        }

        if self.tx.send(OwnerMessage::End(result)).is_err() {
            debug!(result = %result, "Modal wait gone before it could be ended");
        } else {
            trace!(result = %result, "End of modal wait posted");
        }
        true
    }

    pub fn has_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }
}

impl fmt::Debug for ModalEnder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModalEnder")
            .field("ended", &self.has_ended())
            .finish()
    }
}

/// The one user action a progress surface offers.
#[derive(Clone, Debug)]
pub struct CancelAction {
    ender: ModalEnder,
}

impl CancelAction {
    /// Ask for the work to stop. Has no effect once the wait has ended.
    pub fn trigger(&self) -> bool {
        let accepted = self.ender.end(ModalResult::CancelRequested);
        if accepted {
            info!("Cancel requested by user");
        }
        accepted
    }
}

/// A modal wait bound to the thread that created it.
///
/// Not `Send`: it can only be shown on its owner thread.
pub struct ModalWait {
    owner: ThreadId,
    message: String,
    tx: mpsc::UnboundedSender<OwnerMessage>,
    rx: mpsc::UnboundedReceiver<OwnerMessage>,
    ended: Arc<AtomicBool>,
    _not_send: PhantomData<*const ()>,
}

impl ModalWait {
    pub fn new(message: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            owner: std::thread::current().id(),
            message: message.into(),
            tx,
            rx,
            ended: Arc::new(AtomicBool::new(false)),
            _not_send: PhantomData,
        }
    }

    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn owner_handle(&self) -> OwnerHandle {
        OwnerHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn ender(&self) -> ModalEnder {
        ModalEnder {
            tx: self.tx.clone(),
            ended: Arc::clone(&self.ended),
        }
    }

    pub fn cancel_action(&self) -> CancelAction {
        CancelAction {
            ender: self.ender(),
        }
    }

    /// Open `surface` and block until the wait is ended.
    ///
    /// Posted closures run here, in posting order, while waiting. An end
    /// posted before this call is honoured immediately.
    pub fn show_modal(mut self, surface: &mut dyn ProgressSurface) -> InvocationResult<ModalResult> {
        // blocking_recv would panic inside a runtime
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(InvocationError::owner_thread(
                "modal wait cannot block inside an async runtime",
            ));
        }

        let cancel = self.cancel_action();
        debug!(message = %self.message, "Showing modal wait");
        surface.open(&self.message, cancel);

        // Only outside handles keep the queue open from here on.
        let (closed_tx, _) = mpsc::unbounded_channel();
        drop(std::mem::replace(&mut self.tx, closed_tx));

        let outcome = loop {
            match self.rx.blocking_recv() {
                Some(OwnerMessage::Run(job)) => job(),
                Some(OwnerMessage::End(result)) => break Ok(result),
                None => {
                    break Err(InvocationError::owner_thread(
                        "modal wait abandoned: every handle was dropped before it ended",
                    ))
                }
            }
        };

        // Anything still queued is dropped with the receiver.
        self.rx.close();
        self.ended.store(true, Ordering::Release);

        match outcome {
            Ok(result) => {
                debug!(result = %result, "Modal wait ended");
                surface.close(result);
                Ok(result)
            }
            Err(e) => {
                surface.close(ModalResult::CancelRequested);
                Err(e)
            }
        }
    }
}

impl fmt::Debug for ModalWait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModalWait")
            .field("owner", &self.owner)
            .field("message", &self.message)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::HeadlessSurface;
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn test_first_end_wins() {
        let wait = ModalWait::new("working");
        let ender = wait.ender();
        let racer = wait.ender();

        assert!(ender.end(ModalResult::CancelRequested));
        assert!(!racer.end(ModalResult::WorkFinished));
        assert!(racer.has_ended());

        let mut surface = HeadlessSurface::new();
        let result = wait.show_modal(&mut surface).unwrap();
        assert_eq!(result, ModalResult::CancelRequested);
        assert_eq!(surface.last_result(), Some(ModalResult::CancelRequested));
    }

    #[test]
    fn test_end_twice_same_as_once() {
        let once = ModalWait::new("once");
        once.ender().end(ModalResult::WorkFinished);
        let mut a = HeadlessSurface::new();
        let r1 = once.show_modal(&mut a).unwrap();

        let twice = ModalWait::new("twice");
        let ender = twice.ender();
        ender.end(ModalResult::WorkFinished);
        ender.end(ModalResult::WorkFinished);
        let mut b = HeadlessSurface::new();
        let r2 = twice.show_modal(&mut b).unwrap();

        assert_eq!(r1, r2);
        assert_eq!(a.close_count(), 1);
        assert_eq!(b.close_count(), 1);
    }

    #[test]
    fn test_posted_jobs_run_on_owner_thread() {
        let wait = ModalWait::new("working");
        let owner = wait.owner();
        let handle = wait.owner_handle();
        let ender = wait.ender();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let worker_seen = Arc::clone(&seen);
        let worker = std::thread::spawn(move || {
            for i in 0..3 {
                let seen = Arc::clone(&worker_seen);
                handle.post(move || {
                    seen.lock().unwrap().push((i, std::thread::current().id()));
                });
            }
            let done = ender.clone();
            handle.post(move || {
                done.end(ModalResult::WorkFinished);
            });
        });

        let mut surface = HeadlessSurface::new();
        let result = wait.show_modal(&mut surface).unwrap();
        worker.join().unwrap();

        assert_eq!(result, ModalResult::WorkFinished);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(seen.iter().all(|(_, id)| *id == owner));
    }

    #[test]
    fn test_post_after_close_is_noop() {
        let wait = ModalWait::new("working");
        let handle = wait.owner_handle();
        let ender = wait.ender();
        ender.end(ModalResult::WorkFinished);

        let mut surface = HeadlessSurface::new();
        wait.show_modal(&mut surface).unwrap();

        assert!(!handle.post(|| panic!("must never run")));
        assert!(!ender.end(ModalResult::CancelRequested));
        assert!(!surface.cancel_action().unwrap().trigger());
    }

    #[test]
    fn test_cancel_from_surface() {
        let wait = ModalWait::new("working");
        let mut surface = HeadlessSurface::cancel_after(Duration::from_millis(50));
        let result = wait.show_modal(&mut surface).unwrap();
        assert_eq!(result, ModalResult::CancelRequested);
    }

    #[test]
    fn test_cancel_after_finish_is_ignored() {
        let wait = ModalWait::new("working");
        let cancel = wait.cancel_action();
        assert!(wait.ender().end(ModalResult::WorkFinished));

        assert!(!cancel.trigger());
        let mut surface = HeadlessSurface::new().without_cancel();
        assert_eq!(wait.show_modal(&mut surface).unwrap(), ModalResult::WorkFinished);
        assert!(!cancel.trigger());
    }

    #[test]
    fn test_abandoned_wait_returns_error() {
        let wait = ModalWait::new("nobody will end this");
        let mut surface = HeadlessSurface::new().without_cancel();
        let err = wait.show_modal(&mut surface).unwrap_err();
        assert!(matches!(err, InvocationError::OwnerThread { .. }));
    }

    #[tokio::test]
    async fn test_refuses_to_block_inside_runtime() {
        let wait = ModalWait::new("working");
        let mut surface = HeadlessSurface::new();
        let err = wait.show_modal(&mut surface).unwrap_err();
        assert!(err.to_string().contains("async runtime"));
    }
}
