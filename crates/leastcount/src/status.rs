//! Health and stats queries.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use leastcount_protocol::{ReplyData, ServerStats};
use leastcount_room::RoomManager;

/// Process-wide counters behind the health and stats replies.
#[derive(Debug)]
pub(crate) struct ServerStatus {
    started_at: Instant,
    clients: AtomicUsize,
}

impl ServerStatus {
    pub(crate) fn new() -> Self {
        Self {
            started_at: Instant::now(),
            clients: AtomicUsize::new(0),
        }
    }

    pub(crate) fn client_connected(&self) {
        self.clients.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn client_disconnected(&self) {
        self.clients.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn connected_clients(&self) -> usize {
        self.clients.load(Ordering::Relaxed)
    }

    pub(crate) fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub(crate) fn health(&self) -> ReplyData {
        ReplyData::Health {
            status: "ok".to_string(),
            uptime_secs: self.uptime_secs(),
        }
    }

    pub(crate) fn stats(&self, rooms: &RoomManager) -> ServerStats {
        ServerStats {
            active_rooms: rooms.room_count(),
            connected_clients: self.connected_clients(),
            uptime_secs: self.uptime_secs(),
            memory_rss_bytes: resident_memory_bytes(),
        }
    }
}

/// Resident set size from the `VmRSS` line of `/proc/self/status`. `None`
/// off Linux.
fn resident_memory_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_rss(&status)
}

/// `VmRSS:    1234 kB` in bytes.
fn parse_vm_rss(status: &str) -> Option<u64> {
    let rest = status.lines().find_map(|l| l.strip_prefix("VmRSS:"))?;
    let mut fields = rest.split_whitespace();
    let value: u64 = fields.next()?.parse().ok()?;
    match fields.next() {
        Some("kB") => Some(value * 1024),
        _ => None,
    }
}
