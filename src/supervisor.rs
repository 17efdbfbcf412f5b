use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::error::Error;

const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub enum SupervisorEvent {
    Spawning,
    Started,
    Heartbeat(DateTime<Utc>),
    NotResponding,
    Exited(Option<i32>),
}

struct HeartbeatState {
    last_seen: Option<Instant>,
    last_ping: Duration,
}

/// Runs one slot's binary and watches it for liveness. Heartbeats are plain
/// `HEARTBEAT` lines (case-insensitive, optional trailing ISO-8601
/// timestamp) on the child's stdout; a stalled heartbeat only surfaces as a
/// `NotResponding` event, it never kills the child.
pub struct Supervisor {
    child: Arc<Mutex<Child>>,
    cancel: Arc<AtomicBool>,
    heartbeat: Arc<Mutex<HeartbeatState>>,
    event_rx: Receiver<SupervisorEvent>,
    reader_handle: Option<JoinHandle<()>>,
    timer_handle: Option<JoinHandle<()>>,
    #[allow(dead_code)]
    wait_handle: Option<JoinHandle<()>>,
    #[allow(dead_code)]
    heartbeat_interval: Duration,
    #[allow(dead_code)]
    heartbeat_timeout: Duration,
}

impl Supervisor {
    /// Spawns `binary_path` with its working directory set to `slot_dir` and
    /// begins supervising it immediately.
    pub fn spawn(binary_path: &Path, slot_dir: &Path) -> Result<Self, Error> {
        Self::spawn_with_timing(binary_path, slot_dir, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_HEARTBEAT_TIMEOUT)
    }

    pub fn spawn_with_timing(binary_path: &Path, slot_dir: &Path, heartbeat_interval: Duration, heartbeat_timeout: Duration) -> Result<Self, Error> {
        info!("spawning {}", binary_path.display());

        let mut child = Command::new(binary_path)
            .current_dir(slot_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(Error::LaunchFailed)?;

        let stdout = child.stdout.take().expect("piped stdout is always present");
        let child = Arc::new(Mutex::new(child));

        let cancel = Arc::new(AtomicBool::new(false));
        let heartbeat = Arc::new(Mutex::new(HeartbeatState { last_seen: None, last_ping: Duration::ZERO }));
        let (event_tx, event_rx) = mpsc::channel();

        let _ = event_tx.send(SupervisorEvent::Spawning);
        let _ = event_tx.send(SupervisorEvent::Started);

        let reader_handle = {
            let heartbeat = Arc::clone(&heartbeat);
            let event_tx = event_tx.clone();
            let cancel = Arc::clone(&cancel);
            thread::spawn(move || read_heartbeats(stdout, heartbeat, event_tx, cancel))
        };

        let timer_handle = {
            let heartbeat = Arc::clone(&heartbeat);
            let event_tx = event_tx.clone();
            let cancel = Arc::clone(&cancel);
            thread::spawn(move || watch_heartbeat_timeout(heartbeat, event_tx, cancel, heartbeat_interval, heartbeat_timeout))
        };

        let wait_handle = {
            let child = Arc::clone(&child);
            thread::spawn(move || wait_for_exit(child, event_tx))
        };

        Ok(Self {
            child,
            cancel,
            heartbeat,
            event_rx,
            reader_handle: Some(reader_handle),
            timer_handle: Some(timer_handle),
            wait_handle: Some(wait_handle),
            heartbeat_interval,
            heartbeat_timeout,
        })
    }

    /// Non-blocking drain of everything the supervising threads have
    /// reported so far.
    pub fn poll_events(&self) -> Vec<SupervisorEvent> {
        self.event_rx.try_iter().collect()
    }

    pub fn last_heartbeat(&self) -> Option<Instant> {
        self.heartbeat.lock().expect("heartbeat mutex poisoned").last_seen
    }

    /// Duration between send and receive of the last heartbeat: zero if the
    /// line carried no timestamp, or carried one that didn't parse.
    pub fn last_heartbeat_ping(&self) -> Duration {
        self.heartbeat.lock().expect("heartbeat mutex poisoned").last_ping
    }

    /// The child's exit code, written once it has exited; `None` while
    /// still running. A `None` exit code within `Some` means the child
    /// exited via a signal rather than `exit()`.
    pub fn exit_code(&self) -> Option<Option<i32>> {
        self.child.lock().expect("child mutex poisoned").try_wait().ok().flatten().map(|status| status.code())
    }

    /// Stops the heartbeat timer and stdout reader. The child is never
    /// force-killed: the wait-for-exit worker keeps running undisturbed and
    /// reports `Exited` whenever the child exits on its own.
    pub fn shutdown(&mut self) {
        self.cancel.store(true, Ordering::SeqCst);

        if let Some(handle) = self.reader_handle.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.timer_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::SeqCst);
    }
}

fn read_heartbeats(stdout: impl std::io::Read, heartbeat: Arc<Mutex<HeartbeatState>>, event_tx: mpsc::Sender<SupervisorEvent>, cancel: Arc<AtomicBool>) {
    let reader = BufReader::new(stdout);
    for line in reader.lines() {
        if cancel.load(Ordering::SeqCst) {
            return;
        }
        let Ok(line) = line else { return };

        if is_heartbeat_line(&line) {
            let arrival = Utc::now();
            let sent = parse_heartbeat_timestamp(&line);
            let ping = sent.map(|sent| (arrival - sent).to_std().unwrap_or(Duration::ZERO)).unwrap_or(Duration::ZERO);

            let mut state = heartbeat.lock().expect("heartbeat mutex poisoned");
            state.last_seen = Some(Instant::now());
            state.last_ping = ping;
            drop(state);

            let _ = event_tx.send(SupervisorEvent::Heartbeat(sent.unwrap_or(arrival)));
        } else {
            debug!("APP: {line}");
        }
    }
}

/// A heartbeat line is `HEARTBEAT` (case-insensitive), optionally followed
/// by whitespace and an RFC 3339 timestamp.
fn is_heartbeat_line(line: &str) -> bool {
    heartbeat_rest(line).is_some()
}

fn heartbeat_rest(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let prefix = trimmed.get(0..9)?;
    if !prefix.eq_ignore_ascii_case("HEARTBEAT") {
        return None;
    }
    Some(trimmed[9..].trim())
}

/// The timestamp a heartbeat line carried, if any and if it parsed as an
/// ISO-8601/RFC 3339 instant. `None` covers both "no timestamp" and "garbage
/// timestamp" — both make `lastHeartbeatPing` read as zero.
fn parse_heartbeat_timestamp(line: &str) -> Option<DateTime<Utc>> {
    let rest = heartbeat_rest(line)?;
    if rest.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(rest).ok().map(|parsed| parsed.with_timezone(&Utc))
}

fn watch_heartbeat_timeout(heartbeat: Arc<Mutex<HeartbeatState>>, event_tx: mpsc::Sender<SupervisorEvent>, cancel: Arc<AtomicBool>, interval: Duration, timeout: Duration) {
    let started = Instant::now();
    loop {
        if cancel.load(Ordering::SeqCst) {
            return;
        }
        thread::sleep(interval);
        if cancel.load(Ordering::SeqCst) {
            return;
        }

        let last_seen = heartbeat.lock().expect("heartbeat mutex poisoned").last_seen;
        let stalled = match last_seen {
            Some(instant) => instant.elapsed() > timeout,
            None => started.elapsed() > timeout,
        };

        if stalled {
            debug!("no heartbeat for over {timeout:?}, marking not responding");
            let _ = event_tx.send(SupervisorEvent::NotResponding);
        }
    }
}

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Unlike the heartbeat timer and stdout reader, this worker ignores the
/// cancellation signal: the child is never force-killed, so this is the one
/// thread that must keep running until the child exits on its own.
fn wait_for_exit(child: Arc<Mutex<Child>>, event_tx: mpsc::Sender<SupervisorEvent>) {
    loop {
        let exited = child.lock().expect("child mutex poisoned").try_wait().ok().flatten();
        if let Some(status) = exited {
            let _ = event_tx.send(SupervisorEvent::Exited(status.code()));
            return;
        }

        thread::sleep(EXIT_POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_bare_heartbeat_line() {
        assert!(is_heartbeat_line("HEARTBEAT"));
        assert!(is_heartbeat_line("heartbeat"));
    }

    #[test]
    fn parses_heartbeat_with_timestamp() {
        let ts = parse_heartbeat_timestamp("HEARTBEAT 2024-01-01T00:00:00Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn ignores_unrelated_lines() {
        assert!(!is_heartbeat_line("starting up"));
        assert!(!is_heartbeat_line(""));
    }

    #[test]
    fn bare_heartbeat_has_no_timestamp() {
        assert!(parse_heartbeat_timestamp("HEARTBEAT").is_none());
    }

    #[test]
    fn heartbeat_with_garbage_timestamp_still_counts_as_a_heartbeat_but_has_no_timestamp() {
        assert!(is_heartbeat_line("HEARTBEAT not-a-date"));
        assert!(parse_heartbeat_timestamp("HEARTBEAT not-a-date").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn supervisor_reports_started_heartbeat_and_exit_for_a_real_child() {
        use std::fs;
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::tempdir;

        let dir = tempdir().unwrap();
        let script_path = dir.path().join("child.sh");
        {
            let mut script = fs::File::create(&script_path).unwrap();
            writeln!(script, "#!/bin/sh").unwrap();
            writeln!(script, "echo HEARTBEAT").unwrap();
            writeln!(script, "exit 7").unwrap();
        }
        fs::set_permissions(&script_path, fs::Permissions::from_mode(0o755)).unwrap();

        let mut supervisor = Supervisor::spawn_with_timing(&script_path, dir.path(), Duration::from_millis(50), Duration::from_millis(500)).unwrap();

        let mut saw_started = false;
        let mut saw_heartbeat = false;
        let mut exit_code = None;
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline && exit_code.is_none() {
            for event in supervisor.poll_events() {
                match event {
                    SupervisorEvent::Started => saw_started = true,
                    SupervisorEvent::Heartbeat(_) => saw_heartbeat = true,
                    SupervisorEvent::Exited(code) => exit_code = Some(code),
                    _ => {}
                }
            }
            thread::sleep(Duration::from_millis(20));
        }

        assert!(saw_started);
        assert!(saw_heartbeat);
        assert_eq!(exit_code, Some(Some(7)));
        assert_eq!(supervisor.exit_code(), Some(Some(7)));

        supervisor.shutdown();
    }
}
