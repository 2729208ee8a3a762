//! Path request queue
//!
//! Agents never run searches themselves. They submit requests to a
//! [`PathRequestService`], which keeps them in a FIFO queue and hands one
//! search at a time to a background worker thread. Results come back on the
//! thread that calls [`PathRequestService::update`], once per frame.
//!
//! # Guarantees
//!
//! - **Serialization**: at most one search is in flight, so the worker's
//!   single scratchpad needs no lock
//! - **Ordering**: completions are delivered in submission order
//! - **Exactly once**: every request completes, with an empty path on failure
//!
//! # Example
//!
//! ```ignore
//! let mut service = PathRequestService::new(Some(grid));
//! service.request_path(enemy_pos, player_pos, |path| {
//!     log::info!("{} waypoints", path.len());
//! });
//!
//! // Each frame
//! service.update();
//! ```

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use glam::Vec3;

use crate::navigation::grid::Grid;
use crate::navigation::node::{NodeIndex, SearchScratch};
use crate::navigation::search::{PathResult, find_path};

/// Completion callback for a path request
pub type PathCallback = Box<dyn FnOnce(PathResult) + Send + 'static>;

/// Search function run on the worker thread
pub type SearchFn = fn(&Grid, &mut SearchScratch, NodeIndex, NodeIndex) -> PathResult;

/// Identifier handed out for each submitted request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

/// Processing state of the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Nothing in flight
    Idle,
    /// One search is running on the worker
    Processing,
}

// ============================================================================
// Requests and Tickets
// ============================================================================

enum Completion {
    Callback(PathCallback),
    Ticket(Sender<PathResult>),
}

impl Completion {
    /// Hand `path` to the requester. A panicking callback is logged and
    /// swallowed so the queue keeps moving.
    fn deliver(self, id: RequestId, path: PathResult) {
        match self {
            Self::Callback(callback) => {
                // A second panic while unwinding would abort the process
                if thread::panicking() {
                    log::error!("Dropping callback for {id:?} while unwinding");
                    return;
                }
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(path))) {
                    log::error!(
                        "Path callback for {id:?} panicked: {}",
                        panic_message(payload.as_ref())
                    );
                }
            }
            // Receiver dropped means the agent no longer wants the result
            Self::Ticket(sender) => {
                let _ = sender.send(path);
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// A queued path request
struct PathRequest {
    id: RequestId,
    start: Vec3,
    end: Vec3,
    completion: Completion,
}

/// Polled state of a [`PathTicket`]
#[derive(Debug, Clone, PartialEq)]
pub enum TicketState {
    /// Not delivered yet
    Pending,
    /// Path delivered; returned exactly once
    Ready(PathResult),
    /// Already taken, or the service went away
    Closed,
}

/// Handle for a request whose result is polled instead of pushed.
///
/// Dropping the ticket discards the result when it arrives.
#[derive(Debug)]
pub struct PathTicket {
    id: RequestId,
    receiver: Receiver<PathResult>,
}

impl PathTicket {
    /// Request this ticket belongs to
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Check for a delivered result without blocking
    pub fn poll(&self) -> TicketState {
        match self.receiver.try_recv() {
            Ok(path) => TicketState::Ready(path),
            Err(TryRecvError::Empty) => TicketState::Pending,
            Err(TryRecvError::Disconnected) => TicketState::Closed,
        }
    }

    /// Take the delivered path, if any, without blocking
    pub fn try_take(&self) -> Option<PathResult> {
        self.receiver.try_recv().ok()
    }

    /// Block for up to `timeout` waiting for the result.
    ///
    /// Results are only delivered while some thread drives the service with
    /// [`PathRequestService::update`] or [`PathRequestService::wait_idle`],
    /// so this is meant for a ticket moved to a different thread than the
    /// service. Returns [`TicketState::Pending`] on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> TicketState {
        match self.receiver.recv_timeout(timeout) {
            Ok(path) => TicketState::Ready(path),
            Err(RecvTimeoutError::Timeout) => TicketState::Pending,
            Err(RecvTimeoutError::Disconnected) => TicketState::Closed,
        }
    }
}

// ============================================================================
// Worker Thread
// ============================================================================

struct SearchJob {
    id: RequestId,
    grid: Arc<Grid>,
    start: NodeIndex,
    target: NodeIndex,
}

struct SearchOutcome {
    id: RequestId,
    /// `None` when the search faulted
    path: Option<PathResult>,
}

struct Worker {
    jobs: Option<Sender<SearchJob>>,
    outcomes: Receiver<SearchOutcome>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn(search: SearchFn) -> std::io::Result<Self> {
        let (job_tx, job_rx) = crossbeam_channel::unbounded();
        let (outcome_tx, outcome_rx) = crossbeam_channel::unbounded();

        let handle = thread::Builder::new()
            .name("pathgrid-search".into())
            .spawn(move || worker_loop(search, job_rx, outcome_tx))?;

        Ok(Self {
            jobs: Some(job_tx),
            outcomes: outcome_rx,
            handle: Some(handle),
        })
    }

    /// Send a job, handing it back if the worker is gone
    fn send(&self, job: SearchJob) -> Result<(), SearchJob> {
        match &self.jobs {
            Some(jobs) => jobs.send(job).map_err(|e| e.0),
            None => Err(job),
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Closing the job channel ends the loop
        self.jobs = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Path search worker exited with a panic");
            }
        }
    }
}

fn worker_loop(search: SearchFn, jobs: Receiver<SearchJob>, outcomes: Sender<SearchOutcome>) {
    let mut scratch = SearchScratch::new();
    log::debug!("Path search worker started");

    while let Ok(job) = jobs.recv() {
        let path = run_search(search, &mut scratch, &job);
        if outcomes.send(SearchOutcome { id: job.id, path }).is_err() {
            break;
        }
    }

    log::debug!("Path search worker stopped");
}

/// Run one search, absorbing panics so one bad request cannot stall the queue
fn run_search(search: SearchFn, scratch: &mut SearchScratch, job: &SearchJob) -> Option<PathResult> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        search(&job.grid, scratch, job.start, job.target)
    }));

    match result {
        Ok(path) => Some(path),
        Err(payload) => {
            log::error!(
                "Path search {:?} failed: {}",
                job.id,
                panic_message(payload.as_ref())
            );
            scratch.invalidate();
            None
        }
    }
}

// ============================================================================
// Service
// ============================================================================

/// FIFO path request queue with a single background search worker.
///
/// Owned by the session; callbacks run on whichever thread calls
/// [`update`](Self::update) or [`wait_idle`](Self::wait_idle).
pub struct PathRequestService {
    grid: Option<Arc<Grid>>,
    queue: VecDeque<PathRequest>,
    current: Option<PathRequest>,
    worker: Option<Worker>,
    search: SearchFn,
    inline_scratch: SearchScratch,
    next_id: u64,
    completed: u64,
    #[cfg(test)]
    spawn_disabled: bool,
}

impl PathRequestService {
    /// Create a service using the A* search
    #[must_use]
    pub fn new(grid: Option<Arc<Grid>>) -> Self {
        Self::with_search(grid, find_path)
    }

    /// Create a service with a custom search function
    #[must_use]
    pub fn with_search(grid: Option<Arc<Grid>>, search: SearchFn) -> Self {
        let mut service = Self {
            grid,
            queue: VecDeque::new(),
            current: None,
            worker: None,
            search,
            inline_scratch: SearchScratch::new(),
            next_id: 0,
            completed: 0,
            #[cfg(test)]
            spawn_disabled: false,
        };
        service.worker = service.spawn_worker();
        service
    }

    fn spawn_worker(&self) -> Option<Worker> {
        if !self.spawn_allowed() {
            return None;
        }
        match Worker::spawn(self.search) {
            Ok(worker) => Some(worker),
            Err(e) => {
                log::error!("Failed to spawn path search worker, searching inline: {e}");
                None
            }
        }
    }

    #[cfg(not(test))]
    fn spawn_allowed(&self) -> bool {
        true
    }

    #[cfg(test)]
    fn spawn_allowed(&self) -> bool {
        !self.spawn_disabled
    }

    /// Replace the grid used by requests dispatched from now on
    pub fn set_grid(&mut self, grid: Option<Arc<Grid>>) {
        self.grid = grid;
    }

    /// Grid used for new requests
    #[must_use]
    pub fn grid(&self) -> Option<&Arc<Grid>> {
        self.grid.as_ref()
    }

    /// Current processing state
    #[must_use]
    pub fn state(&self) -> ServiceState {
        if self.current.is_some() {
            ServiceState::Processing
        } else {
            ServiceState::Idle
        }
    }

    /// Check if no search is in flight
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state() == ServiceState::Idle
    }

    /// Number of requests waiting behind the one in flight
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Total completions delivered so far
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Queue a path request; `callback` receives the path exactly once
    pub fn request_path(
        &mut self,
        start: Vec3,
        end: Vec3,
        callback: impl FnOnce(PathResult) + Send + 'static,
    ) -> RequestId {
        self.enqueue(start, end, Completion::Callback(Box::new(callback)))
    }

    /// Queue a path request whose result is polled through a ticket
    pub fn request_path_ticket(&mut self, start: Vec3, end: Vec3) -> PathTicket {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        let id = self.enqueue(start, end, Completion::Ticket(sender));
        PathTicket { id, receiver }
    }

    fn enqueue(&mut self, start: Vec3, end: Vec3, completion: Completion) -> RequestId {
        let id = RequestId(self.next_id);
        self.next_id += 1;

        log::trace!("Path request {id:?}: {start} -> {end}");
        self.queue.push_back(PathRequest {
            id,
            start,
            end,
            completion,
        });
        self.try_process_next();
        id
    }

    /// Deliver a finished search, if any, and start the next request.
    ///
    /// Never blocks. Returns the number of completions delivered.
    pub fn update(&mut self) -> usize {
        let before = self.completed;
        self.try_process_next();

        while self.current.is_some() {
            let Some(worker) = &self.worker else {
                break;
            };
            match worker.outcomes.try_recv() {
                Ok(outcome) => self.finish(outcome),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.recover_worker(),
            }
        }

        (self.completed - before) as usize
    }

    /// Block, delivering completions, until the queue drains or `timeout`
    /// elapses. Returns true if the service is idle.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.try_process_next();

        while self.current.is_some() {
            let Some(worker) = &self.worker else {
                break;
            };
            let remaining = deadline.saturating_duration_since(Instant::now());
            match worker.outcomes.recv_timeout(remaining) {
                Ok(outcome) => self.finish(outcome),
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => self.recover_worker(),
            }
        }

        self.is_idle()
    }

    /// Fail every queued and in-flight request with an empty path
    pub fn shutdown(&mut self) {
        let pending = self.queue.len() + usize::from(self.current.is_some());
        if pending > 0 {
            log::warn!("Shutting down path service with {pending} unfinished requests");
        }

        if let Some(request) = self.current.take() {
            self.complete(request, PathResult::empty());
        }
        while let Some(request) = self.queue.pop_front() {
            self.complete(request, PathResult::empty());
        }
        self.worker = None;
    }

    fn try_process_next(&mut self) {
        while self.current.is_none() {
            let Some(request) = self.queue.pop_front() else {
                return;
            };

            let Some(grid) = self.grid.clone() else {
                log::error!("Path request {:?} failed: no navigation grid", request.id);
                self.complete(request, PathResult::empty());
                continue;
            };

            let job = SearchJob {
                id: request.id,
                start: grid.index_from_world_point(request.start),
                target: grid.index_from_world_point(request.end),
                grid,
            };
            self.current = Some(request);
            self.dispatch(job);
        }
    }

    fn dispatch(&mut self, job: SearchJob) {
        let job = match &self.worker {
            Some(worker) => match worker.send(job) {
                Ok(()) => return,
                Err(job) => job,
            },
            None => job,
        };

        // Worker is gone; try once with a fresh one before searching inline
        log::warn!("Path search worker unavailable, respawning");
        self.worker = self.spawn_worker();
        let job = match &self.worker {
            Some(worker) => match worker.send(job) {
                Ok(()) => return,
                Err(job) => job,
            },
            None => job,
        };

        let path = run_search(self.search, &mut self.inline_scratch, &job);
        self.finish(SearchOutcome { id: job.id, path });
    }

    fn recover_worker(&mut self) {
        log::error!("Path search worker disconnected, respawning");
        self.worker = self.spawn_worker();
        if let Some(id) = self.current.as_ref().map(|request| request.id) {
            self.finish(SearchOutcome { id, path: None });
        }
    }

    fn finish(&mut self, outcome: SearchOutcome) {
        let Some(request) = self.current.take() else {
            log::warn!("Dropping stray search result {:?}", outcome.id);
            return;
        };
        if request.id != outcome.id {
            log::error!(
                "Search result {:?} does not match request {:?}",
                outcome.id,
                request.id
            );
        }

        let path = outcome.path.unwrap_or_default();
        log::debug!("Path request {:?} done: {} waypoints", request.id, path.len());
        self.complete(request, path);
        self.try_process_next();
    }

    fn complete(&mut self, request: PathRequest, path: PathResult) {
        self.completed += 1;
        request.completion.deliver(request.id, path);
    }
}

impl Drop for PathRequestService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for PathRequestService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathRequestService")
            .field("state", &self.state())
            .field("queue_len", &self.queue.len())
            .field("completed", &self.completed)
            .field("has_grid", &self.grid.is_some())
            .finish()
    }
}
