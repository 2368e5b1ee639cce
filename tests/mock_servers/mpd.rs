#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Mock MPD for testing
//!
//! Speaks the line protocol on a random loopback port: greeting, a handful of
//! query and control verbs, command lists, password checks, and `idle` fed
//! from a queue of scripted change ticks.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;

pub const VERSION: &str = "0.23.5";

/// Mock player state
#[derive(Debug, Clone)]
pub struct MockMpdState {
    pub volume: u32,
    pub state: &'static str,
    pub queue: Vec<(&'static str, &'static str)>,
    pub password: Option<String>,
}

impl Default for MockMpdState {
    fn default() -> Self {
        Self {
            volume: 40,
            state: "stop",
            queue: vec![
                ("music/a.flac", "Part 1: Overture"),
                ("music/b.flac", "Interlude"),
            ],
            password: None,
        }
    }
}

#[derive(Default)]
struct Shared {
    state: RwLock<MockMpdState>,
    /// Each entry answers one `idle`
    ticks: Mutex<VecDeque<Vec<String>>>,
    tick_ready: Notify,
    /// Next response is cut off mid-frame and never terminated
    stall_next: AtomicBool,
    connections: AtomicUsize,
}

/// Mock MPD server
pub struct MockMpdServer {
    addr: SocketAddr,
    shared: Arc<Shared>,
    handle: JoinHandle<()>,
}

impl MockMpdServer {
    /// Start a mock MPD on a random port
    pub async fn start() -> Self {
        let shared = Arc::new(Shared::default());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let shared_clone = shared.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                shared_clone.connections.fetch_add(1, Ordering::SeqCst);
                let shared = shared_clone.clone();
                tokio::spawn(async move {
                    handle_connection(stream, shared).await;
                });
            }
        });

        Self {
            addr,
            shared,
            handle,
        }
    }

    /// Start with a required password
    pub async fn with_password(password: &str) -> Self {
        let server = Self::start().await;
        server.shared.state.write().await.password = Some(password.to_string());
        server
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Connections accepted so far
    pub fn connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    pub async fn volume(&self) -> u32 {
        self.shared.state.read().await.volume
    }

    /// Queue one `idle` answer reporting `subsystems`
    pub async fn push_tick(&self, subsystems: &[&str]) {
        self.shared
            .ticks
            .lock()
            .await
            .push_back(subsystems.iter().map(|s| s.to_string()).collect());
        self.shared.tick_ready.notify_waiters();
    }

    /// Make the next command hang after one data line
    pub fn stall_next(&self) {
        self.shared.stall_next.store(true, Ordering::SeqCst);
    }

    pub async fn stop(self) {
        self.handle.abort();
    }
}

async fn handle_connection(stream: TcpStream, shared: Arc<Shared>) {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    let mut authenticated = shared.state.read().await.password.is_none();
    let mut batch: Option<Vec<String>> = None;

    if writer
        .write_all(format!("OK MPD {}\n", VERSION).as_bytes())
        .await
        .is_err()
    {
        return;
    }

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let command = line.trim().to_string();

        let response = match command.as_str() {
            "close" => break,
            "command_list_ok_begin" => {
                batch = Some(Vec::new());
                continue;
            }
            "command_list_end" => {
                let commands = batch.take().unwrap_or_default();
                run_batch(&commands, &shared, &mut authenticated).await
            }
            _ if batch.is_some() => {
                if let Some(commands) = batch.as_mut() {
                    commands.push(command);
                }
                continue;
            }
            _ if command == "idle" || command.starts_with("idle ") => {
                match wait_for_tick(&shared, &mut reader).await {
                    Some(response) => response,
                    None => break,
                }
            }
            _ => {
                if shared.stall_next.swap(false, Ordering::SeqCst) {
                    let _ = writer.write_all(b"volume: 40\n").await;
                    continue;
                }
                match run_command(&command, 0, &shared, &mut authenticated).await {
                    Ok(body) => format!("{}OK\n", body),
                    Err(ack) => ack,
                }
            }
        };

        if writer.write_all(response.as_bytes()).await.is_err() {
            break;
        }
    }
}

/// Block until a tick is queued. `None` if the client went away first.
async fn wait_for_tick(shared: &Shared, reader: &mut BufReader<OwnedReadHalf>) -> Option<String> {
    let mut pending = String::new();
    loop {
        let notified = shared.tick_ready.notified();
        if let Some(tick) = shared.ticks.lock().await.pop_front() {
            let mut response: String = tick.iter().map(|s| format!("changed: {}\n", s)).collect();
            response.push_str("OK\n");
            return Some(response);
        }

        tokio::select! {
            _ = notified => continue,
            read = reader.read_line(&mut pending) => {
                match read {
                    Ok(n) if n > 0 && pending.trim() == "noidle" => return Some("OK\n".to_string()),
                    _ => return None,
                }
            }
        }
    }
}

async fn run_batch(commands: &[String], shared: &Shared, authenticated: &mut bool) -> String {
    let mut response = String::new();
    for (index, command) in commands.iter().enumerate() {
        match run_command(command, index, shared, authenticated).await {
            Ok(body) => {
                response.push_str(&body);
                response.push_str("list_OK\n");
            }
            Err(ack) => {
                response.push_str(&ack);
                return response;
            }
        }
    }
    response.push_str("OK\n");
    response
}

/// Body lines on success, a full `ACK` line on failure
async fn run_command(
    command: &str,
    index: usize,
    shared: &Shared,
    authenticated: &mut bool,
) -> Result<String, String> {
    let (verb, args) = split_command(command);
    let ack = |code: u32, message: &str| Err(format!("ACK [{}@{}] {{{}}} {}\n", code, index, verb, message));

    if verb == "password" {
        let expected = shared.state.read().await.password.clone();
        return match (expected, args.first()) {
            (Some(expected), Some(given)) if *given == expected => {
                *authenticated = true;
                Ok(String::new())
            }
            (None, _) => Ok(String::new()),
            _ => ack(3, "incorrect password"),
        };
    }
    if !*authenticated {
        return ack(4, &format!("you don't have permission for \"{}\"", verb));
    }

    match verb.as_str() {
        "ping" | "clearerror" => Ok(String::new()),
        "status" => {
            let state = shared.state.read().await;
            Ok(format!(
                "volume: {}\nrepeat: 0\nrandom: 0\nplaylistlength: {}\nstate: {}\n",
                state.volume,
                state.queue.len(),
                state.state
            ))
        }
        "setvol" => match args.first().and_then(|v| v.parse::<u32>().ok()) {
            Some(volume) if volume <= 100 => {
                shared.state.write().await.volume = volume;
                Ok(String::new())
            }
            Some(_) => ack(2, "Invalid volume value"),
            None => ack(2, "Integer expected"),
        },
        "play" => {
            let mut state = shared.state.write().await;
            match args.first().map(|v| v.parse::<usize>()) {
                Some(Ok(pos)) if pos >= state.queue.len() => ack(2, "Bad song index"),
                Some(Err(_)) => ack(2, "Integer expected"),
                _ => {
                    state.state = "play";
                    Ok(String::new())
                }
            }
        }
        "stop" => {
            shared.state.write().await.state = "stop";
            Ok(String::new())
        }
        "currentsong" => {
            let state = shared.state.read().await;
            Ok(state
                .queue
                .first()
                .map(|(file, title)| format!("file: {}\nTitle: {}\nPos: 0\nId: 1\n", file, title))
                .unwrap_or_default())
        }
        "playlistinfo" => {
            let state = shared.state.read().await;
            Ok(state
                .queue
                .iter()
                .enumerate()
                .map(|(pos, (file, title))| {
                    format!("file: {}\nTitle: {}\nPos: {}\nId: {}\n", file, title, pos, pos + 1)
                })
                .collect())
        }
        "listplaylist" => match args.first().map(String::as_str) {
            Some("road") => Ok("file: music/a.flac\nfile: music/b.flac\n".to_string()),
            Some("solo") => Ok("file: music/a.flac\n".to_string()),
            _ => ack(50, "No such playlist"),
        },
        "listplaylists" => Ok(concat!(
            "playlist: road\n",
            "Last-Modified: 2024-01-01T00:00:00Z\n",
            "playlist: solo\n",
            "Last-Modified: 2024-02-01T00:00:00Z\n",
        )
        .to_string()),
        "decoders" => Ok(concat!(
            "plugin: mad\n",
            "suffix: mp3\n",
            "suffix: mp2\n",
            "mime_type: audio/mpeg\n",
            "plugin: flac\n",
            "suffix: flac\n",
        )
        .to_string()),
        "outputs" => Ok(concat!(
            "outputid: 0\n",
            "outputname: Speakers\n",
            "outputenabled: 1\n",
            "outputid: 1\n",
            "outputname: Stream\n",
            "outputenabled: 0\n",
        )
        .to_string()),
        "lsinfo" => Ok(String::new()),
        _ => Err(format!("ACK [5@{}] {{}} unknown command \"{}\"\n", index, verb)),
    }
}

/// Verb and unquoted arguments
fn split_command(command: &str) -> (String, Vec<String>) {
    let (verb, rest) = command.split_once(' ').unwrap_or((command, ""));
    let mut args = Vec::new();
    let mut chars = rest.chars();

    while let Some(c) = chars.next() {
        if c != '"' {
            continue;
        }
        let mut arg = String::new();
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        arg.push(escaped);
                    }
                }
                '"' => break,
                c => arg.push(c),
            }
        }
        args.push(arg);
    }

    (verb.to_string(), args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_command_unescapes() {
        let (verb, args) = split_command(r#"find "artist" "Say \"hi\" \\o/""#);
        assert_eq!(verb, "find");
        assert_eq!(args, vec!["artist", r#"Say "hi" \o/"#]);
    }

    #[tokio::test]
    async fn mock_mpd_starts_and_stops() {
        let server = MockMpdServer::start().await;
        assert!(server.addr().port() > 0);
        server.stop().await;
    }
}
