//! Benchmark Harness
//!
//! Drives a replica set with a configurable read/write mix and reports
//! throughput and latency per worker.
//!
//! ## Flow
//! 1. `init()` writes a random value to every key of the key space
//! 2. `run()` starts one thread per worker, each with its own client
//!    (ids `1..=workers`), issuing operations in pairs per the workload
//!
//! Failed operations are logged and counted; the run keeps going.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::Rng;

use crate::client::RegisterClient;
use crate::config::ClientConfig;
use crate::error::{RegisterError, Result};

/// Identity used by the client that preloads the key space
pub const INIT_CLIENT_ID: i64 = 0;

/// How often worker 1 logs its interval throughput
const REPORT_INTERVAL: Duration = Duration::from_secs(1);

// =============================================================================
// Workload
// =============================================================================

/// Operation mix issued by each worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workload {
    /// Two reads per round
    ReadOnly,

    /// Two writes per round
    WriteOnly,

    /// One read and one write per round
    HalfHalf,
}

impl FromStr for Workload {
    type Err = RegisterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "read-only" => Ok(Workload::ReadOnly),
            "write-only" => Ok(Workload::WriteOnly),
            "half-half" => Ok(Workload::HalfHalf),
            other => Err(RegisterError::Config(format!(
                "workload not supported: {} (expected read-only, write-only or half-half)",
                other
            ))),
        }
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Workload::ReadOnly => "read-only",
            Workload::WriteOnly => "write-only",
            Workload::HalfHalf => "half-half",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Read,
    Write,
}

impl Workload {
    /// Operations making up one round
    fn round(self) -> [Op; 2] {
        match self {
            Workload::ReadOnly => [Op::Read, Op::Read],
            Workload::WriteOnly => [Op::Write, Op::Write],
            Workload::HalfHalf => [Op::Read, Op::Write],
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Benchmark parameters
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Number of concurrent workers (one client each)
    pub workers: usize,

    /// Operations per worker (rounded up to an even count)
    pub requests: usize,

    pub workload: Workload,

    /// Keys are `key-0 .. key-{key_space - 1}`
    pub key_space: usize,

    /// Length of random values, in hex characters
    pub value_len: usize,

    /// Serialize operations and check reads against a local shadow map
    pub validate: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            requests: 100_000,
            workload: Workload::ReadOnly,
            key_space: 100_000,
            value_len: 10,
            validate: false,
        }
    }
}

// =============================================================================
// Reports
// =============================================================================

/// Outcome of one worker
#[derive(Debug, Clone, Default)]
pub struct WorkerReport {
    pub worker_id: i64,
    pub reads: u64,
    pub writes: u64,
    pub errors: u64,

    /// Reads whose value differed from the shadow map (validation only)
    pub mismatches: u64,
    pub elapsed: Duration,
}

impl WorkerReport {
    /// Completed plus failed operations
    pub fn operations(&self) -> u64 {
        self.reads + self.writes + self.errors
    }

    /// Operations per second
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.operations() as f64 / secs
    }

    /// Mean wall time per operation
    pub fn avg_latency(&self) -> Duration {
        match self.operations() {
            0 => Duration::ZERO,
            ops => self.elapsed / ops as u32,
        }
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, Default)]
pub struct BenchReport {
    pub workers: Vec<WorkerReport>,
    pub elapsed: Duration,
}

impl BenchReport {
    pub fn operations(&self) -> u64 {
        self.workers.iter().map(WorkerReport::operations).sum()
    }

    pub fn errors(&self) -> u64 {
        self.workers.iter().map(|w| w.errors).sum()
    }

    pub fn mismatches(&self) -> u64 {
        self.workers.iter().map(|w| w.mismatches).sum()
    }

    /// Aggregate operations per second across all workers
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.operations() as f64 / secs
    }
}

// =============================================================================
// Benchmark
// =============================================================================

/// Builds a client for a given writer identity
pub type ClientFactory = Box<dyn Fn(i64) -> Result<RegisterClient> + Send + Sync>;

/// Load generator over a replica set
pub struct Benchmark {
    config: BenchConfig,
    factory: ClientFactory,

    /// Last value written per key, as seen by this harness
    history: Mutex<HashMap<String, String>>,
}

impl Benchmark {
    pub fn new(config: BenchConfig, factory: ClientFactory) -> Result<Self> {
        if config.workers == 0 {
            return Err(RegisterError::Config("benchmark needs at least one worker".to_string()));
        }
        if config.key_space == 0 {
            return Err(RegisterError::Config("key space must not be empty".to_string()));
        }

        Ok(Self {
            config,
            factory,
            history: Mutex::new(HashMap::new()),
        })
    }

    /// Benchmark over TCP replicas; each worker connects with its own id
    pub fn over_tcp(config: BenchConfig, client_config: ClientConfig) -> Result<Self> {
        client_config.validate()?;
        let factory: ClientFactory = Box::new(move |client_id| {
            let mut cfg = client_config.clone();
            cfg.client_id = client_id;
            RegisterClient::connect(&cfg)
        });
        Self::new(config, factory)
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Preload every key with a random value
    pub fn init(&self) -> Result<()> {
        tracing::info!("Init {} keys for benchmark", self.config.key_space);
        let client = (self.factory)(INIT_CLIENT_ID)?;
        let mut rng = rand::thread_rng();

        let mut history = self.history.lock();
        for i in 0..self.config.key_space {
            let key = key_name(i);
            let value = random_value(&mut rng, self.config.value_len);
            client.write(&key, &value)?;
            history.insert(key, value);
        }

        Ok(())
    }

    /// Run all workers to completion
    pub fn run(&self) -> Result<BenchReport> {
        tracing::info!(
            "Running {} workload with {} workers x {} requests",
            self.config.workload,
            self.config.workers,
            self.config.requests
        );

        let start = Instant::now();
        let results = crossbeam::thread::scope(|scope| {
            let handles: Vec<_> = (1..=self.config.workers as i64)
                .map(|worker_id| scope.spawn(move |_| self.worker(worker_id)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join())
                .collect::<Vec<_>>()
        })
        .map_err(|_| RegisterError::Benchmark("worker scope panicked".to_string()))?;

        let mut report = BenchReport::default();
        for result in results {
            match result {
                Ok(Ok(worker)) => report.workers.push(worker),
                Ok(Err(e)) => tracing::error!("Benchmark worker failed to start: {}", e),
                Err(_) => return Err(RegisterError::Benchmark("worker panicked".to_string())),
            }
        }
        report.elapsed = start.elapsed();

        tracing::info!(
            "Benchmark finished: {} ops, {} errors, {:.1} ops/s overall",
            report.operations(),
            report.errors(),
            report.throughput()
        );
        Ok(report)
    }

    fn worker(&self, worker_id: i64) -> Result<WorkerReport> {
        let client = (self.factory)(worker_id)?;
        let mut rng = rand::thread_rng();
        let mut report = WorkerReport {
            worker_id,
            ..WorkerReport::default()
        };

        let wants_log = worker_id == 1;
        let mut interval_ops = 0u64;
        let mut last_tick = Instant::now();
        let start = Instant::now();

        for _ in 0..(self.config.requests + 1) / 2 {
            for op in self.config.workload.round() {
                match self.issue(&client, op, &mut rng) {
                    Ok(matched) => {
                        match op {
                            Op::Read => report.reads += 1,
                            Op::Write => report.writes += 1,
                        }
                        if !matched {
                            report.mismatches += 1;
                        }
                    }
                    Err(e) => {
                        tracing::error!("[client {}] {:?} failed: {}", worker_id, op, e);
                        report.errors += 1;
                    }
                }
                interval_ops += 1;
            }

            if wants_log && last_tick.elapsed() >= REPORT_INTERVAL {
                tracing::debug!(
                    "[client {}] interval ops: {}, throughput: {:.1} ops/s",
                    worker_id,
                    interval_ops,
                    interval_ops as f64 / last_tick.elapsed().as_secs_f64()
                );
                interval_ops = 0;
                last_tick = Instant::now();
            }
        }

        report.elapsed = start.elapsed();
        tracing::info!(
            "Finish benchmark workload on client {}, reads: {}, writes: {}, errors: {}, avg throughput: {:.1} ops/s, avg latency: {:?}/op",
            worker_id,
            report.reads,
            report.writes,
            report.errors,
            report.throughput(),
            report.avg_latency()
        );
        Ok(report)
    }

    /// Issue one operation; returns `false` on a validated read mismatch
    fn issue<R: Rng>(&self, client: &RegisterClient, op: Op, rng: &mut R) -> Result<bool> {
        let key = key_name(rng.gen_range(0..self.config.key_space));
        // Holding the shadow map for the whole operation keeps it in step
        // with the replicas.
        let mut history = self.config.validate.then(|| self.history.lock());

        match op {
            Op::Read => {
                let value = client.read(&key)?;
                if let Some(history) = history.as_ref() {
                    let expected = history.get(&key);
                    if expected != Some(&value) {
                        tracing::debug!("{}, replicas: {}, local: {:?}", key, value, expected);
                        return Ok(false);
                    }
                }
            }
            Op::Write => {
                let value = random_value(rng, self.config.value_len);
                client.write(&key, &value)?;
                if let Some(history) = history.as_mut() {
                    history.insert(key, value);
                }
            }
        }
        Ok(true)
    }
}

/// Name of the `i`-th benchmark key
pub fn key_name(i: usize) -> String {
    format!("key-{}", i)
}

/// Random lowercase hex string of `len` characters
pub fn random_value<R: Rng>(rng: &mut R, len: usize) -> String {
    let mut bytes = vec![0u8; len / 2 + 1];
    rng.fill(bytes.as_mut_slice());
    let mut value: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    value.truncate(len);
    value
}
