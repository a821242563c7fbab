//! Quorum Coordinator
//!
//! Fans a request out to every replica and decides whether a majority
//! answered.
//!
//! ## Threading
//! Each replica is driven by a dedicated worker thread that owns a job
//! channel. A phase sends one job to every worker and collects
//! `(replica index, outcome)` pairs on a reply channel private to that phase.
//! Under [`PhasePolicy::WaitAll`] the phase waits for every outcome; under
//! [`PhasePolicy::EarlyMajority`] it returns as soon as the result is
//! decided and late replies are dropped.
//!
//! Job queues are bounded by [`MAX_PENDING_JOBS`]. A replica whose queue is
//! full counts as failed for that phase. Queued Get jobs of a finished phase
//! are skipped; Set jobs are always delivered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{self, Receiver, Sender, TrySendError};

use super::ReplicaTransport;
use crate::config::PhasePolicy;
use crate::error::{RegisterError, Result};
use crate::protocol::{GetRequest, GetResponse, Request, Response, SetRequest};
use crate::tag::Tag;

/// Jobs that may wait in one replica's queue
pub const MAX_PENDING_JOBS: usize = 32;

type Outcome = (usize, Result<Response>);

/// A request handed to a replica worker
struct Job {
    request: Arc<Request>,
    reply: Sender<Outcome>,

    /// Set once the issuing phase stopped collecting replies
    finished: Arc<AtomicBool>,
}

impl Job {
    /// A Get nobody waits for has no effect worth the call
    fn is_stale(&self) -> bool {
        matches!(*self.request, Request::Get(_)) && self.finished.load(Ordering::Acquire)
    }
}

/// Handle to the worker thread of one replica
struct ReplicaWorker {
    name: String,
    jobs: Sender<Job>,
}

impl ReplicaWorker {
    fn spawn(index: usize, replica: Arc<dyn ReplicaTransport>) -> Result<Self> {
        let name = replica.name().to_string();
        let (jobs, inbox) = channel::bounded::<Job>(MAX_PENDING_JOBS);

        thread::Builder::new()
            .name(format!("quorum-{}", index))
            .spawn(move || Self::serve(index, replica, inbox))?;

        Ok(Self { name, jobs })
    }

    /// Worker loop; exits once the coordinator is dropped
    fn serve(index: usize, replica: Arc<dyn ReplicaTransport>, inbox: Receiver<Job>) {
        for job in inbox.iter() {
            // Skip reads left over from an early-majority phase
            if job.is_stale() {
                continue;
            }

            // Call the replica
            let outcome = replica.call(&job.request);

            // Report back; the phase may have finished without us
            let _ = job.reply.send((index, outcome));
        }
    }
}

/// Result of a query phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutcome {
    /// Whether a majority of replicas reported the key as written
    pub exists: bool,

    /// Value carried by the greatest tag seen
    pub value: String,

    /// Greatest tag seen among responding replicas
    pub tag: Tag,

    /// Number of replicas that responded
    pub responded: usize,
}

/// Client-side majority-quorum coordinator
pub struct QuorumCoordinator {
    workers: Vec<ReplicaWorker>,
    policy: PhasePolicy,
}

impl QuorumCoordinator {
    /// Start one worker per replica
    pub fn new(replicas: Vec<Arc<dyn ReplicaTransport>>, policy: PhasePolicy) -> Result<Self> {
        if replicas.is_empty() {
            return Err(RegisterError::Config("replica list is empty".to_string()));
        }

        let workers = replicas
            .into_iter()
            .enumerate()
            .map(|(index, replica)| ReplicaWorker::spawn(index, replica))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { workers, policy })
    }

    /// Number of replicas
    pub fn replica_count(&self) -> usize {
        self.workers.len()
    }

    /// `floor(N/2) + 1`
    pub fn majority(&self) -> usize {
        self.workers.len() / 2 + 1
    }

    pub fn policy(&self) -> PhasePolicy {
        self.policy
    }

    /// Query phase: learn the greatest tag (and its value) known to a majority
    pub fn query(&self, key: &str) -> Result<QueryOutcome> {
        let replies = self.fan_out(Request::Get(GetRequest {
            key: key.to_string(),
        }));

        // Count answers and keep the greatest tag
        let mut responded = 0;
        let mut existing = 0;
        let mut best: Option<GetResponse> = None;

        for (index, reply) in replies.into_iter().enumerate() {
            let resp = match reply {
                Some(Ok(Response::Get(resp))) => resp,
                Some(Ok(other)) => {
                    tracing::debug!(
                        "Replica {} get bad response: {:?}",
                        self.workers[index].name,
                        other
                    );
                    continue;
                }
                Some(Err(e)) => {
                    tracing::debug!("Replica {} get err: {}", self.workers[index].name, e);
                    continue;
                }
                None => continue,
            };

            responded += 1;
            if resp.exists {
                existing += 1;
            }
            if best.as_ref().map_or(true, |b| resp.tag() > b.tag()) {
                best = Some(resp);
            }
        }

        let required = self.majority();
        if responded < required {
            return Err(RegisterError::NoMajority {
                responded,
                required,
            });
        }

        let (value, tag) = match best {
            Some(resp) => (resp.value, Tag::new(resp.timestamp, resp.writer_id)),
            None => (String::new(), Tag::INITIAL),
        };

        Ok(QueryOutcome {
            exists: existing >= required,
            value,
            tag,
            responded,
        })
    }

    /// Propagate phase: store `(value, tag)` on a majority
    ///
    /// Returns the number of replicas that acknowledged.
    pub fn propagate(&self, key: &str, value: &str, tag: Tag) -> Result<usize> {
        let replies = self.fan_out(Request::Set(SetRequest::new(key, value, tag)));

        // Count acknowledgements; failures are logged and skipped
        let mut responded = 0;
        for (index, reply) in replies.into_iter().enumerate() {
            match reply {
                Some(Ok(Response::Set(_))) => responded += 1,
                Some(Ok(other)) => {
                    tracing::info!(
                        "Replica {} set bad response: {:?}",
                        self.workers[index].name,
                        other
                    );
                }
                Some(Err(e)) => {
                    tracing::info!("Replica {} set err: {}", self.workers[index].name, e);
                }
                None => {}
            }
        }

        let required = self.majority();
        if responded < required {
            return Err(RegisterError::NoMajority {
                responded,
                required,
            });
        }
        Ok(responded)
    }

    /// Send `request` to every replica and gather outcomes by replica index
    ///
    /// `None` marks a replica whose outcome was not awaited.
    fn fan_out(&self, request: Request) -> Vec<Option<Result<Response>>> {
        let total = self.workers.len();
        let required = self.majority();
        let request = Arc::new(request);
        let finished = Arc::new(AtomicBool::new(false));
        let (reply_tx, reply_rx) = channel::unbounded::<Outcome>();

        let mut replies: Vec<Option<Result<Response>>> = (0..total).map(|_| None).collect();
        let mut pending = 0;
        let mut succeeded = 0;
        let mut failed = 0;

        // Hand one job to every worker
        for (index, worker) in self.workers.iter().enumerate() {
            let job = Job {
                request: Arc::clone(&request),
                reply: reply_tx.clone(),
                finished: Arc::clone(&finished),
            };
            let reason = match worker.jobs.try_send(job) {
                Ok(()) => {
                    pending += 1;
                    continue;
                }
                Err(TrySendError::Full(_)) => "replica backlog full",
                Err(TrySendError::Disconnected(_)) => "replica worker stopped",
            };
            failed += 1;
            replies[index] = Some(Err(RegisterError::Transport {
                replica: worker.name.clone(),
                reason: reason.to_string(),
            }));
        }
        drop(reply_tx);

        // Collect outcomes until the phase is decided
        while pending > 0 {
            if self.policy == PhasePolicy::EarlyMajority
                && (succeeded >= required || total - failed < required)
            {
                break;
            }

            let (index, outcome) = match reply_rx.recv() {
                Ok(reply) => reply,
                // Every worker that got a job has dropped its sender.
                Err(_) => break,
            };
            pending -= 1;
            if matches!(outcome, Ok(Response::Get(_)) | Ok(Response::Set(_))) {
                succeeded += 1;
            } else {
                failed += 1;
            }
            replies[index] = Some(outcome);
        }

        finished.store(true, Ordering::Release);
        replies
    }
}

impl std::fmt::Debug for QuorumCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuorumCoordinator")
            .field("replicas", &self.workers.iter().map(|w| &w.name).collect::<Vec<_>>())
            .field("policy", &self.policy)
            .finish()
    }
}
