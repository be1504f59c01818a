//! Counting semaphore with strict first-come-first-served admission.
//!
//! Waiters take a ticket and join a FIFO queue. A [`FairSemaphore::release`]
//! wakes every queued waiter; each one re-checks whether it is at the head of
//! the queue and a permit is available, and goes back to sleep otherwise. No
//! permit is ever handed to a caller while an earlier caller is still queued.

use std::{collections::VecDeque, sync::Mutex};

use thiserror::Error;
use tokio::sync::Notify;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AcquireError {
    #[error("Semaphore closed")]
    Closed,
}

#[derive(Debug)]
pub struct FairSemaphore {
    state: Mutex<State>,
    notify: Notify,
}

#[derive(Debug, Default)]
struct State {
    permits: usize,
    queue: VecDeque<u64>,
    next_ticket: u64,
    closed: bool,
}

impl State {
    fn position(&self, ticket: u64) -> Option<usize> {
        self.queue.iter().position(|x| *x == ticket)
    }
}

impl FairSemaphore {
    #[must_use]
    pub fn new(permits: usize) -> Self {
        Self {
            state: Mutex::new(State {
                permits,
                ..Default::default()
            }),
            notify: Notify::new(),
        }
    }

    /// Waits for a permit, in arrival order.
    ///
    /// Once the semaphore is closed, queued callers that can still be covered
    /// by the remaining permits are served; everyone else gets
    /// [`AcquireError::Closed`].
    ///
    /// # Cancel safety
    ///
    /// Dropping the future removes the caller from the queue.
    ///
    /// # Errors
    ///
    /// * If the semaphore was closed before a permit could be handed out
    ///
    /// # Panics
    ///
    /// * If the internal mutex is poisoned
    pub async fn acquire(&self) -> Result<(), AcquireError> {
        let ticket = {
            let mut state = self.state.lock().unwrap();

            if state.permits > 0 && state.queue.is_empty() {
                state.permits -= 1;
                return Ok(());
            }
            if state.closed {
                return Err(AcquireError::Closed);
            }

            let ticket = state.next_ticket;
            state.next_ticket = state.next_ticket.wrapping_add(1);
            state.queue.push_back(ticket);
            ticket
        };

        let mut waiter = Waiter {
            semaphore: self,
            ticket,
            queued: true,
        };

        loop {
            // Registered before checking the state so a release in between is
            // not lost.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(result) = waiter.try_take() {
                return result;
            }

            notified.await;
        }
    }

    /// Adds a permit and wakes the queue so its head can take it.
    ///
    /// # Panics
    ///
    /// * If the internal mutex is poisoned
    pub fn release(&self) {
        let queued = {
            let mut state = self.state.lock().unwrap();
            state.permits += 1;
            state.queue.len()
        };

        log::trace!("release: queued={queued}");

        if queued > 0 {
            self.notify.notify_waiters();
        }
    }

    /// Stops queueing new callers and fails queued callers that the remaining
    /// permits cannot cover.
    ///
    /// # Panics
    ///
    /// * If the internal mutex is poisoned
    pub fn close(&self) {
        self.state.lock().unwrap().closed = true;
        self.notify.notify_waiters();
    }

    /// # Panics
    ///
    /// * If the internal mutex is poisoned
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.state.lock().unwrap().permits
    }

    /// Number of callers currently queued.
    ///
    /// # Panics
    ///
    /// * If the internal mutex is poisoned
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }

    /// # Panics
    ///
    /// * If the internal mutex is poisoned
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}

struct Waiter<'a> {
    semaphore: &'a FairSemaphore,
    ticket: u64,
    queued: bool,
}

impl Waiter<'_> {
    fn try_take(&mut self) -> Option<Result<(), AcquireError>> {
        let mut state = self.semaphore.state.lock().unwrap();

        let Some(position) = state.position(self.ticket) else {
            self.queued = false;
            return Some(Err(AcquireError::Closed));
        };

        if position == 0 && state.permits > 0 {
            state.permits -= 1;
            state.queue.pop_front();
            self.queued = false;

            if state.permits > 0 && !state.queue.is_empty() {
                self.semaphore.notify.notify_waiters();
            }

            return Some(Ok(()));
        }

        if state.closed && position >= state.permits {
            state.queue.remove(position);
            self.queued = false;
            self.semaphore.notify.notify_waiters();

            return Some(Err(AcquireError::Closed));
        }

        None
    }
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        if !self.queued {
            return;
        }

        let Ok(mut state) = self.semaphore.state.lock() else {
            return;
        };

        if let Some(position) = state.position(self.ticket) {
            state.queue.remove(position);
            if position == 0 {
                self.semaphore.notify.notify_waiters();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::FutureExt as _;
    use pretty_assertions::assert_eq;

    use super::*;

    async fn wait_for_queue(semaphore: &FairSemaphore, len: usize) {
        while semaphore.waiting() < len {
            tokio::task::yield_now().await;
        }
    }

    #[test_log::test(tokio::test)]
    async fn available_permit_is_taken_immediately() {
        let semaphore = FairSemaphore::new(1);

        semaphore.acquire().await.unwrap();

        assert_eq!(semaphore.available_permits(), 0);
        assert!(semaphore.acquire().now_or_never().is_none());
        assert_eq!(semaphore.waiting(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn releases_waiters_in_arrival_order() {
        let semaphore = Arc::new(FairSemaphore::new(0));
        let order = Arc::new(Mutex::new(vec![]));
        let mut handles = vec![];

        for i in 0..6 {
            let semaphore_clone = semaphore.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                semaphore_clone.acquire().await.unwrap();
                order.lock().unwrap().push(i);
            }));
            wait_for_queue(&semaphore, i + 1).await;
        }

        for _ in 0..6 {
            semaphore.release();
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(semaphore.available_permits(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn single_release_admits_only_the_head() {
        let semaphore = Arc::new(FairSemaphore::new(0));
        let admitted = Arc::new(Mutex::new(vec![]));
        let mut handles = vec![];

        for i in 0..3 {
            let semaphore_clone = semaphore.clone();
            let admitted = admitted.clone();
            handles.push(tokio::spawn(async move {
                semaphore_clone.acquire().await.unwrap();
                admitted.lock().unwrap().push(i);
            }));
            wait_for_queue(&semaphore, i + 1).await;
        }

        semaphore.release();
        while admitted.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(*admitted.lock().unwrap(), vec![0]);
        assert_eq!(semaphore.waiting(), 2);

        semaphore.release();
        semaphore.release();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*admitted.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test_log::test(tokio::test)]
    async fn late_caller_cannot_overtake_queued_waiter() {
        let semaphore = Arc::new(FairSemaphore::new(0));

        let semaphore_clone = semaphore.clone();
        let first = tokio::spawn(async move { semaphore_clone.acquire().await });
        wait_for_queue(&semaphore, 1).await;

        semaphore.release();

        // The permit belongs to the queued waiter even though it has not run yet.
        assert!(semaphore.acquire().now_or_never().is_none());
        assert_eq!(first.await.unwrap(), Ok(()));
        assert_eq!(semaphore.waiting(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn dropped_waiter_leaves_the_queue() {
        let semaphore = Arc::new(FairSemaphore::new(0));

        let semaphore_clone = semaphore.clone();
        let abandoned = tokio::spawn(async move { semaphore_clone.acquire().await });
        wait_for_queue(&semaphore, 1).await;

        let semaphore_clone = semaphore.clone();
        let second = tokio::spawn(async move { semaphore_clone.acquire().await });
        wait_for_queue(&semaphore, 2).await;

        abandoned.abort();
        let _ = abandoned.await;
        assert_eq!(semaphore.waiting(), 1);

        semaphore.release();
        assert_eq!(second.await.unwrap(), Ok(()));
    }

    #[test_log::test(tokio::test)]
    async fn close_fails_uncovered_waiters_only() {
        let semaphore = Arc::new(FairSemaphore::new(0));
        let mut handles = vec![];

        for i in 0..3 {
            let semaphore_clone = semaphore.clone();
            handles.push(tokio::spawn(async move { semaphore_clone.acquire().await }));
            wait_for_queue(&semaphore, i + 1).await;
        }

        semaphore.release();
        assert!(!semaphore.is_closed());
        semaphore.close();
        assert!(semaphore.is_closed());

        let mut results = vec![];
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        assert_eq!(
            results,
            vec![Ok(()), Err(AcquireError::Closed), Err(AcquireError::Closed)]
        );
        assert_eq!(semaphore.waiting(), 0);
        assert_eq!(semaphore.acquire().await, Err(AcquireError::Closed));
    }

    #[test_log::test(tokio::test)]
    async fn closed_semaphore_still_hands_out_spare_permits() {
        let semaphore = FairSemaphore::new(0);

        semaphore.release();
        semaphore.close();

        assert_eq!(semaphore.acquire().await, Ok(()));
        assert_eq!(semaphore.acquire().await, Err(AcquireError::Closed));
    }
}
