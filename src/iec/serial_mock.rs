//! Mock transport for testing
//!
//! This module provides an in-memory transport that can be used to test the
//! session layer without requiring actual hardware. A single end replays
//! queued bytes; [`MockTransport::pair`] returns two connected ends so a
//! client session and a simulator session can run against each other from
//! two test threads.

use crate::error::Iec61107Error;
use crate::iec::session::Transport;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// In-memory transport end.
pub struct MockTransport {
    /// Everything this end has sent, append-only
    tx_log: Arc<Mutex<Vec<u8>>>,
    /// Bytes available for this end to read
    rx: Arc<Mutex<VecDeque<u8>>>,
    /// The peer's read queue in paired mode; sends are mirrored into it
    peer_rx: Option<Arc<Mutex<VecDeque<u8>>>>,
    /// Cleared when the peer end is dropped
    peer_alive: Arc<AtomicBool>,
    /// Cleared when this end is dropped
    alive: Arc<AtomicBool>,
    /// Baud switches observed on this end
    bauds: Arc<Mutex<Vec<u32>>>,
    /// How long a read waits for the peer before reporting end-of-stream
    read_timeout: Duration,
}

/// Assertion handle onto a transport end, usable after the end itself moved
/// into a session.
#[derive(Clone)]
pub struct MockProbe {
    tx_log: Arc<Mutex<Vec<u8>>>,
    bauds: Arc<Mutex<Vec<u32>>>,
}

impl MockProbe {
    /// Data that was written to this end.
    pub fn tx_data(&self) -> Vec<u8> {
        self.tx_log.lock().unwrap().clone()
    }

    /// Baud rates the session switched this end to, in order.
    pub fn baud_switches(&self) -> Vec<u32> {
        self.bauds.lock().unwrap().clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// A lone end: reads drain whatever was queued, then report end-of-stream.
    pub fn new() -> Self {
        MockTransport {
            tx_log: Arc::new(Mutex::new(Vec::new())),
            rx: Arc::new(Mutex::new(VecDeque::new())),
            peer_rx: None,
            peer_alive: Arc::new(AtomicBool::new(false)),
            alive: Arc::new(AtomicBool::new(true)),
            bauds: Arc::new(Mutex::new(Vec::new())),
            read_timeout: Duration::from_secs(5),
        }
    }

    /// Two connected ends; what one sends the other reads. Reads block until
    /// data arrives, the peer is dropped, or the read timeout elapses.
    pub fn pair() -> (MockTransport, MockTransport) {
        let forward = Arc::new(Mutex::new(VecDeque::new()));
        let backward = Arc::new(Mutex::new(VecDeque::new()));
        let a_alive = Arc::new(AtomicBool::new(true));
        let b_alive = Arc::new(AtomicBool::new(true));
        let a = MockTransport {
            tx_log: Arc::new(Mutex::new(Vec::new())),
            rx: backward.clone(),
            peer_rx: Some(forward.clone()),
            peer_alive: b_alive.clone(),
            alive: a_alive.clone(),
            bauds: Arc::new(Mutex::new(Vec::new())),
            read_timeout: Duration::from_secs(5),
        };
        let b = MockTransport {
            tx_log: Arc::new(Mutex::new(Vec::new())),
            rx: forward,
            peer_rx: Some(backward),
            peer_alive: a_alive,
            alive: b_alive,
            bauds: Arc::new(Mutex::new(Vec::new())),
            read_timeout: Duration::from_secs(5),
        };
        (a, b)
    }

    /// Queue data to be read from this end.
    pub fn queue_rx_data(&self, data: &[u8]) {
        self.rx.lock().unwrap().extend(data);
    }

    /// Assertion handle that survives moving the end into a session.
    pub fn probe(&self) -> MockProbe {
        MockProbe {
            tx_log: self.tx_log.clone(),
            bauds: self.bauds.clone(),
        }
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

impl Transport for MockTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), Iec61107Error> {
        self.tx_log.lock().unwrap().extend_from_slice(data);
        if let Some(peer_rx) = &self.peer_rx {
            peer_rx.lock().unwrap().extend(data);
        }
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, Iec61107Error> {
        let deadline = Instant::now() + self.read_timeout;
        loop {
            {
                let mut rx = self.rx.lock().unwrap();
                if !rx.is_empty() {
                    let n = buf.len().min(rx.len());
                    for slot in buf.iter_mut().take(n) {
                        *slot = rx.pop_front().unwrap_or_default();
                    }
                    return Ok(n);
                }
            }
            if !self.peer_alive.load(Ordering::SeqCst) || Instant::now() >= deadline {
                return Ok(0);
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn switch_baud(&mut self, baud: u32) -> Result<(), Iec61107Error> {
        self.bauds.lock().unwrap().push(baud);
        Ok(())
    }
}
