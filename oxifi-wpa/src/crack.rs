//! Parallel dictionary attack against a prepared handshake.
//!
//! A single producer streams the wordlist line by line into a bounded
//! channel; one worker per core pulls candidates and runs the full
//! PMK/PTK/MIC verification. The first worker to verify a candidate
//! installs it into a write-once slot and raises the found flag; everyone
//! else observes the flag on their next iteration and exits.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use crate::error::{Result, WpaError};
use crate::handshake::PreparedHandshake;

/// WPA passphrase length bounds.
const PASSPHRASE_MIN: usize = 8;
const PASSPHRASE_MAX: usize = 63;

/// Longest wordlist line that is still considered, in bytes.
const MAX_LINE_LEN: usize = 1024 * 1024;

/// Channel capacity per worker; bounds producer run-ahead.
const QUEUE_DEPTH_PER_WORKER: usize = 4;

/// Cracker tuning.
#[derive(Debug, Clone)]
pub struct CrackerConfig {
    /// Worker thread count; `None` uses the host parallelism.
    pub workers: Option<usize>,
    /// Log progress every N attempts.
    pub progress_interval: u64,
}

impl Default for CrackerConfig {
    fn default() -> Self {
        Self {
            workers: None,
            progress_interval: 1000,
        }
    }
}

/// Outcome of a dictionary run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrackOutcome {
    /// A candidate verified; at most one is ever reported.
    Found { key: String, attempts: u64 },
    /// The wordlist ran dry without a match.
    Exhausted { attempts: u64 },
    /// Stopped cooperatively before the wordlist ran dry.
    Cancelled { attempts: u64 },
}

/// Parallel dictionary cracker for one prepared handshake.
pub struct DictionaryCracker {
    handshake: Arc<PreparedHandshake>,
    config: CrackerConfig,
    stop: Arc<AtomicBool>,
    attempts: Arc<AtomicU64>,
}

impl DictionaryCracker {
    pub fn new(handshake: PreparedHandshake) -> Self {
        Self {
            handshake: Arc::new(handshake),
            config: CrackerConfig::default(),
            stop: Arc::new(AtomicBool::new(false)),
            attempts: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_config(mut self, config: CrackerConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an external cancellation flag.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Request a cooperative stop.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Candidates tested so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Stream the wordlist through the worker pool.
    pub fn run(&self, wordlist: &Path) -> Result<CrackOutcome> {
        let file = File::open(wordlist)
            .map_err(|_| WpaError::WordlistMissing(wordlist.to_path_buf()))?;
        let mut reader = BufReader::new(file);

        let workers = self.config.workers.unwrap_or_else(|| {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });

        tracing::info!(
            essid = %self.handshake.essid,
            bssid = %self.handshake.aa,
            workers,
            wordlist = %wordlist.display(),
            "starting dictionary attack"
        );

        let (tx, rx) = sync_channel::<String>(workers * QUEUE_DEPTH_PER_WORKER);
        let rx = Arc::new(Mutex::new(rx));

        let found = Arc::new(AtomicBool::new(false));
        let winner: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let rx = rx.clone();
            let handshake = self.handshake.clone();
            let found = found.clone();
            let winner = winner.clone();
            let stop = self.stop.clone();
            let attempts = self.attempts.clone();

            let handle = thread::Builder::new()
                .name(format!("crack-worker-{}", id))
                .spawn(move || {
                    worker_loop(&rx, &handshake, &found, &winner, &stop, &attempts)
                })?;
            handles.push(handle);
        }

        // Producer: stream lines, drop out-of-bound candidates silently.
        let start = Instant::now();
        let mut line = String::new();
        let mut fed: u64 = 0;

        loop {
            if found.load(Ordering::Relaxed) || self.stop.load(Ordering::Relaxed) {
                break;
            }

            line.clear();
            let read = reader.read_line(&mut line)?;
            if read == 0 {
                break;
            }

            let word = line.trim_end_matches(|c| c == '\r' || c == '\n');
            if word.len() < PASSPHRASE_MIN
                || word.len() > PASSPHRASE_MAX
                || read > MAX_LINE_LEN
            {
                continue;
            }

            if tx.send(word.to_string()).is_err() {
                break;
            }
            fed += 1;

            if fed % self.config.progress_interval.max(1) == 0 {
                let attempts = self.attempts();
                let rate = attempts as f64 / start.elapsed().as_secs_f64().max(0.001);
                tracing::debug!(attempts, rate = %format!("{:.0}/s", rate), "progress");
            }
        }

        // Close the channel so idle workers drain and exit, then join.
        drop(tx);
        for handle in handles {
            let _ = handle.join();
        }

        let attempts = self.attempts();
        let key = winner.lock().unwrap().take();

        let outcome = match key {
            Some(key) => {
                tracing::info!(attempts, "key recovered");
                CrackOutcome::Found { key, attempts }
            }
            None if self.stop.load(Ordering::Relaxed) => CrackOutcome::Cancelled { attempts },
            None => {
                tracing::info!(attempts, "wordlist exhausted");
                CrackOutcome::Exhausted { attempts }
            }
        };
        Ok(outcome)
    }
}

fn worker_loop(
    rx: &Mutex<Receiver<String>>,
    handshake: &PreparedHandshake,
    found: &AtomicBool,
    winner: &Mutex<Option<String>>,
    stop: &AtomicBool,
    attempts: &AtomicU64,
) {
    loop {
        if found.load(Ordering::Relaxed) || stop.load(Ordering::Relaxed) {
            return;
        }

        // Hold the receiver lock only to pull the next candidate, never
        // while verifying.
        let candidate = match rx.lock().unwrap().recv() {
            Ok(candidate) => candidate,
            Err(_) => return,
        };

        attempts.fetch_add(1, Ordering::Relaxed);

        if handshake.verify(&candidate) {
            // Write-once: the first winner installs the key, later hits
            // are discarded.
            if !found.swap(true, Ordering::SeqCst) {
                *winner.lock().unwrap() = Some(candidate);
            }
            return;
        }
    }
}
