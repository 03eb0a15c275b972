//! mpv-backed [`MediaEngine`] over JSON IPC.
//!
//! ```text
//!   MpvEngine (UI thread, sync)
//!         │  EngineCommand via unbounded mpsc
//!         ▼
//!   command_task ── MpvHandle::send ──► writer_task ──► socket
//!                                        reader_task ◄── socket
//!                                           ├── reply (request_id) → oneshot
//!                                           └── event → event_pump
//!                                                         │ MpvEventTranslator
//!                                                         ▼
//!                                               EngineEvent → UI loop
//! ```
//!
//! Commands run strictly in order on one task, so a `stop` followed by a
//! `loadfile` always reaches mpv in that order.
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

use super::{EngineError, EngineEvent, EngineState, MediaEngine, TrackKind};
use marquee_proto::platform;

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

pub const OBS_PAUSE: u64 = 1;
pub const OBS_DURATION: u64 = 2;
pub const OBS_PLAYBACK_TIME: u64 = 3;

const DIRECT_LAVF_OPTS: &str = "reconnect=1,reconnect_streamed=1";
const ADAPTIVE_LAVF_OPTS: &str = "reconnect=1,reconnect_streamed=1,reconnect_delay_max=2,seekable=0";

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>>;

struct PendingRequest {
    req_id: u64,
    payload: String,
    reply: oneshot::Sender<anyhow::Result<Value>>,
}

/// Unsolicited mpv message (event or property change).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    /// `Some((obs_id, data))` for property-change events.
    pub fn as_property_change(&self) -> Option<(u64, &Value)> {
        if self.raw.get("event")?.as_str()? == "property-change" {
            let id = self.raw.get("id")?.as_u64()?;
            let data = self.raw.get("data").unwrap_or(&Value::Null);
            Some((id, data))
        } else {
            None
        }
    }

    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }
}

// ── translation ───────────────────────────────────────────────────────────────

/// Folds raw mpv messages into [`EngineEvent`]s, tracking the little state
/// mpv does not repeat on every message.
#[derive(Debug, Default)]
pub struct MpvEventTranslator {
    state: EngineState,
    position_ms: u64,
    duration_ms: u64,
}

impl MpvEventTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn translate(&mut self, ev: &MpvEvent) -> Vec<EngineEvent> {
        if let Some((id, data)) = ev.as_property_change() {
            return self.property(id, data);
        }
        match ev.event_name() {
            Some("start-file") => self.set_state(EngineState::Buffering),
            Some("file-loaded") => self.set_state(EngineState::Playing),
            Some("end-file") => {
                let reason = ev.raw.get("reason").and_then(Value::as_str).unwrap_or("");
                let mut out = Vec::new();
                if reason == "error" {
                    let msg = ev
                        .raw
                        .get("file_error")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error");
                    out.push(EngineEvent::Error(msg.to_string()));
                }
                out.extend(self.set_state(EngineState::Stopped));
                out.push(EngineEvent::EndOfFile {
                    reached_eof: reason == "eof",
                });
                out
            }
            Some("shutdown") => self.set_state(EngineState::Stopped),
            _ => Vec::new(),
        }
    }

    fn property(&mut self, id: u64, data: &Value) -> Vec<EngineEvent> {
        match id {
            OBS_PAUSE => match data.as_bool() {
                Some(_) if self.state == EngineState::Stopped => Vec::new(),
                Some(true) => self.set_state(EngineState::Paused),
                Some(false) => self.set_state(EngineState::Playing),
                None => Vec::new(),
            },
            OBS_DURATION => {
                if let Some(secs) = data.as_f64() {
                    self.duration_ms = (secs.max(0.0) * 1000.0) as u64;
                }
                Vec::new()
            }
            OBS_PLAYBACK_TIME => match data.as_f64() {
                Some(secs) => {
                    self.position_ms = (secs.max(0.0) * 1000.0) as u64;
                    vec![EngineEvent::Progress {
                        position_ms: self.position_ms,
                        duration_ms: self.duration_ms,
                    }]
                }
                None => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    fn set_state(&mut self, state: EngineState) -> Vec<EngineEvent> {
        self.state = state;
        if state == EngineState::Stopped {
            self.position_ms = 0;
        }
        vec![EngineEvent::StateChanged(state)]
    }
}

// ── IPC handle ────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl MpvHandle {
    pub async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "command": command, "request_id": req_id });
        let mut raw = serde_json::to_string(&msg)?;
        raw.push('\n');

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload: raw,
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(tokio::time::Duration::from_secs(5), reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    async fn set_property(&self, name: &str, value: Value) -> anyhow::Result<()> {
        self.send(json!(["set_property", name, value])).await?;
        Ok(())
    }

    pub async fn observe_properties(&self) {
        let props = [
            (OBS_PAUSE, "pause"),
            (OBS_DURATION, "duration"),
            (OBS_PLAYBACK_TIME, "playback-time"),
        ];
        for (id, name) in &props {
            match self.send(json!(["observe_property", id, name])).await {
                Ok(_) => debug!("mpv: observe_property id={} name={}", id, name),
                Err(e) => warn!("mpv: observe_property {} failed: {}", name, e),
            }
        }
    }

    async fn apply(&self, cmd: EngineCommand) -> anyhow::Result<()> {
        match cmd {
            EngineCommand::Load {
                url,
                direct,
                hint_bitrate,
            } => {
                if direct {
                    self.set_property("stream-lavf-o", json!(DIRECT_LAVF_OPTS)).await?;
                    self.set_property("cache-pause-wait", json!(2)).await?;
                    info!("mpv: direct play {}kbps", hint_bitrate);
                } else {
                    self.set_property("stream-lavf-o", json!(ADAPTIVE_LAVF_OPTS)).await?;
                    info!("mpv: adaptive stream");
                }
                debug!("mpv: loadfile {}", url);
                self.send(json!(["loadfile", url, "replace"])).await?;
            }
            EngineCommand::Pause(paused) => self.set_property("pause", json!(paused)).await?,
            EngineCommand::Stop => {
                self.send(json!(["stop"])).await?;
            }
            EngineCommand::Seek(ms) => {
                self.send(json!(["seek", ms as f64 / 1000.0, "absolute"])).await?;
            }
            EngineCommand::SeekRelative(ms) => {
                self.send(json!(["seek", ms as f64 / 1000.0, "relative"])).await?;
            }
            EngineCommand::SetTrack(kind, id) => {
                let value = id.map_or_else(|| json!("no"), |id| json!(id));
                self.set_property(track_property(kind), value).await?;
            }
            EngineCommand::CycleTrack(kind) => {
                let name = match kind {
                    TrackKind::Audio => "audio",
                    TrackKind::Subtitle => "sub",
                };
                self.send(json!(["cycle", name])).await?;
            }
            EngineCommand::ToggleStats => {
                self.send(json!(["script-binding", "stats/display-stats-toggle"]))
                    .await?;
            }
            EngineCommand::Quit => {
                self.send(json!(["quit"])).await?;
            }
        }
        Ok(())
    }
}

fn track_property(kind: TrackKind) -> &'static str {
    match kind {
        TrackKind::Audio => "aid",
        TrackKind::Subtitle => "sid",
    }
}

// ── process driver ────────────────────────────────────────────────────────────

/// Owns the mpv child process.
pub struct MpvDriver {
    pub socket_name: String,
    process: Option<tokio::process::Child>,
    cache_mb: u32,
}

impl MpvDriver {
    pub fn new(cache_mb: u32) -> Self {
        Self {
            socket_name: platform::mpv_socket_name(),
            process: None,
            cache_mb,
        }
    }

    pub async fn kill(&mut self) {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }
    }

    fn command(&self, mpv_binary: &std::path::Path) -> anyhow::Result<tokio::process::Command> {
        let stderr_path = platform::data_dir().join("mpv-stderr.log");
        if let Some(parent) = stderr_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let stderr_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&stderr_path)?;
        info!("mpv: logging stderr to {:?}", stderr_path);

        let mut cmd = tokio::process::Command::new(mpv_binary);
        cmd.arg("--idle=yes")
            .arg(platform::mpv_socket_arg(&self.socket_name))
            .arg("--quiet")
            .arg("--force-window=yes")
            .arg("--hwdec=auto")
            .arg("--ytdl=no")
            .arg("--network-timeout=30")
            .arg("--input-default-bindings=no");
        for arg in cache_args(self.cache_mb) {
            cmd.arg(arg);
        }
        cmd.stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(stderr_file)
            .kill_on_drop(true);
        Ok(cmd)
    }

    #[cfg(unix)]
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;

        let socket_path = std::path::PathBuf::from(&self.socket_name);
        let _ = tokio::fs::remove_file(&socket_path).await;

        let mpv_binary =
            platform::find_mpv_binary().ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;
        let child = self.command(&mpv_binary)?.spawn()?;
        info!("mpv: spawned process with pid {:?}", child.id());
        self.process = Some(child);

        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            anyhow::bail!("mpv IPC socket did not appear");
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

        let stream = UnixStream::connect(&socket_path).await?;
        info!("mpv: connected to IPC socket");
        let (read_half, write_half) = stream.into_split();
        Ok(start_io_tasks(BufReader::new(read_half), write_half, event_tx))
    }

    #[cfg(windows)]
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;

        let mpv_binary =
            platform::find_mpv_binary().ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;
        let child = self.command(&mpv_binary)?.spawn()?;
        self.process = Some(child);

        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if let Ok(client) = ClientOptions::new().open(&pipe_path) {
                info!("mpv: connected to named pipe");
                let (read_half, write_half) = tokio::io::split(client);
                return Ok(start_io_tasks(BufReader::new(read_half), write_half, event_tx));
            }
        }
        anyhow::bail!("mpv named pipe did not appear")
    }
}

/// Demuxer cache flags; the back buffer gets half of the forward size.
pub fn cache_args(cache_mb: u32) -> Vec<String> {
    if cache_mb == 0 {
        return vec!["--cache=no".to_string()];
    }
    vec![
        "--cache=yes".to_string(),
        format!("--demuxer-max-bytes={}MiB", cache_mb),
        format!("--demuxer-max-back-bytes={}MiB", (cache_mb / 2).max(1)),
        "--demuxer-readahead-secs=600".to_string(),
    ]
}

fn start_io_tasks<R, W>(
    reader: BufReader<R>,
    writer: W,
    event_tx: mpsc::Sender<MpvEvent>,
) -> MpvHandle
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);
    tokio::spawn(writer_task(writer, cmd_rx, pending.clone()));
    tokio::spawn(reader_task(reader, pending, event_tx));
    MpvHandle { tx: cmd_tx }
}

async fn fail_all(pending: &PendingMap, reason: &str) {
    let mut map = pending.lock().await;
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(anyhow::anyhow!("{}", reason)));
    }
}

async fn reader_task<R>(mut reader: BufReader<R>, pending: PendingMap, event_tx: mpsc::Sender<MpvEvent>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                fail_all(&pending, "mpv IPC connection closed").await;
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                if let Some(req_id) = val.get("request_id").and_then(|v| v.as_u64()) {
                    let mut map = pending.lock().await;
                    if let Some(tx) = map.remove(&req_id) {
                        let result = if val["error"].as_str() == Some("success") {
                            Ok(val)
                        } else {
                            let err = val["error"].as_str().unwrap_or("unknown error").to_string();
                            debug!("mpv reader: response req={} err={}", req_id, err);
                            Err(anyhow::anyhow!("mpv error: {}", err))
                        };
                        let _ = tx.send(result);
                    }
                } else if event_tx.send(MpvEvent { raw: val }).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                fail_all(&pending, "mpv IPC read error").await;
                break;
            }
        }
    }
}

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: PendingMap)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        pending.lock().await.insert(req.req_id, req.reply);
        debug!("mpv writer: send req={} payload={}", req.req_id, req.payload.trim());
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            if let Some(tx) = pending.lock().await.remove(&req.req_id) {
                let _ = tx.send(Err(anyhow::anyhow!("mpv write error: {}", e)));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

// ── engine ────────────────────────────────────────────────────────────────────

#[derive(Debug)]
enum EngineCommand {
    Load {
        url: String,
        direct: bool,
        hint_bitrate: u32,
    },
    Pause(bool),
    Stop,
    Seek(u64),
    SeekRelative(i64),
    SetTrack(TrackKind, Option<u64>),
    CycleTrack(TrackKind),
    ToggleStats,
    Quit,
}

pub struct MpvEngine {
    events: mpsc::Sender<EngineEvent>,
    cache_mb: u32,
    commands: Option<mpsc::UnboundedSender<EngineCommand>>,
    task: Option<JoinHandle<()>>,
}

impl MpvEngine {
    pub fn new(events: mpsc::Sender<EngineEvent>, cache_mb: u32) -> Self {
        Self {
            events,
            cache_mb,
            commands: None,
            task: None,
        }
    }

    fn submit(&mut self, cmd: EngineCommand) {
        let Some(tx) = &self.commands else {
            let _ = self
                .events
                .try_send(EngineEvent::Error("mpv is not running".to_string()));
            return;
        };
        if let Err(e) = tx.send(cmd) {
            warn!("mpv: command dropped, engine task gone: {:?}", e.0);
            self.commands = None;
        }
    }
}

impl MediaEngine for MpvEngine {
    fn init(&mut self) -> Result<(), EngineError> {
        if self.commands.is_some() {
            return Err(EngineError::AlreadyRunning);
        }
        if platform::find_mpv_binary().is_none() {
            return Err(EngineError::BinaryNotFound);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.commands = Some(tx);
        self.task = Some(tokio::spawn(command_task(
            self.cache_mb,
            rx,
            self.events.clone(),
        )));
        Ok(())
    }

    fn cleanup(&mut self) {
        if let Some(tx) = self.commands.take() {
            let _ = tx.send(EngineCommand::Quit);
        }
        // The task kills mpv once the channel drains; detach it.
        self.task.take();
    }

    fn play(&mut self, url: &str, is_direct: bool, hint_bitrate: u32) {
        self.submit(EngineCommand::Load {
            url: url.to_string(),
            direct: is_direct,
            hint_bitrate,
        });
    }

    fn pause(&mut self) {
        self.submit(EngineCommand::Pause(true));
    }

    fn resume(&mut self) {
        self.submit(EngineCommand::Pause(false));
    }

    fn stop(&mut self) {
        self.submit(EngineCommand::Stop);
        let _ = self
            .events
            .try_send(EngineEvent::StateChanged(EngineState::Stopped));
    }

    fn seek(&mut self, position_ms: u64) {
        self.submit(EngineCommand::Seek(position_ms));
    }

    fn seek_relative(&mut self, delta_ms: i64) {
        self.submit(EngineCommand::SeekRelative(delta_ms));
    }

    fn set_track(&mut self, kind: TrackKind, id: Option<u64>) {
        self.submit(EngineCommand::SetTrack(kind, id));
    }

    fn cycle_track(&mut self, kind: TrackKind) {
        self.submit(EngineCommand::CycleTrack(kind));
    }

    fn toggle_stats(&mut self) {
        self.submit(EngineCommand::ToggleStats);
    }
}

impl Drop for MpvEngine {
    fn drop(&mut self) {
        self.cleanup();
    }
}

async fn command_task(
    cache_mb: u32,
    mut rx: mpsc::UnboundedReceiver<EngineCommand>,
    events: mpsc::Sender<EngineEvent>,
) {
    let mut driver = MpvDriver::new(cache_mb);
    let (mpv_tx, mpv_rx) = mpsc::channel::<MpvEvent>(256);
    let handle = match driver.spawn_and_connect(mpv_tx).await {
        Ok(h) => h,
        Err(e) => {
            error!("mpv: failed to start: {}", e);
            let _ = events
                .send(EngineEvent::Error(format!("could not start mpv: {}", e)))
                .await;
            return;
        }
    };
    handle.observe_properties().await;
    let pump = tokio::spawn(event_pump(mpv_rx, events.clone()));

    while let Some(cmd) = rx.recv().await {
        let quit = matches!(cmd, EngineCommand::Quit);
        if let Err(e) = handle.apply(cmd).await {
            warn!("mpv: command failed: {}", e);
        }
        if quit {
            break;
        }
    }

    pump.abort();
    driver.kill().await;
    info!("mpv: engine task exiting");
}

async fn event_pump(mut rx: mpsc::Receiver<MpvEvent>, events: mpsc::Sender<EngineEvent>) {
    let mut translator = MpvEventTranslator::new();
    while let Some(ev) = rx.recv().await {
        for out in translator.translate(&ev) {
            if events.send(out).await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(raw: Value) -> MpvEvent {
        MpvEvent { raw }
    }

    #[test]
    fn test_file_lifecycle_states() {
        let mut t = MpvEventTranslator::new();
        assert_eq!(
            t.translate(&ev(json!({"event": "start-file"}))),
            vec![EngineEvent::StateChanged(EngineState::Buffering)]
        );
        assert_eq!(
            t.translate(&ev(json!({"event": "file-loaded"}))),
            vec![EngineEvent::StateChanged(EngineState::Playing)]
        );
        assert_eq!(
            t.translate(&ev(json!({"event": "end-file", "reason": "eof"}))),
            vec![
                EngineEvent::StateChanged(EngineState::Stopped),
                EngineEvent::EndOfFile { reached_eof: true },
            ]
        );
    }

    #[test]
    fn test_end_file_error_reports_message_first() {
        let mut t = MpvEventTranslator::new();
        let out = t.translate(&ev(json!({
            "event": "end-file", "reason": "error", "file_error": "loading failed"
        })));
        assert_eq!(
            out,
            vec![
                EngineEvent::Error("loading failed".into()),
                EngineEvent::StateChanged(EngineState::Stopped),
                EngineEvent::EndOfFile { reached_eof: false },
            ]
        );
    }

    #[test]
    fn test_pause_ignored_while_stopped() {
        let mut t = MpvEventTranslator::new();
        let pause = ev(json!({"event": "property-change", "id": OBS_PAUSE, "data": true}));
        assert!(t.translate(&pause).is_empty());

        t.translate(&ev(json!({"event": "file-loaded"})));
        assert_eq!(
            t.translate(&pause),
            vec![EngineEvent::StateChanged(EngineState::Paused)]
        );
        assert_eq!(t.state(), EngineState::Paused);
    }

    #[test]
    fn test_progress_carries_duration() {
        let mut t = MpvEventTranslator::new();
        t.translate(&ev(json!({"event": "property-change", "id": OBS_DURATION, "data": 120.5})));
        let out = t.translate(&ev(json!({
            "event": "property-change", "id": OBS_PLAYBACK_TIME, "data": 12.25
        })));
        assert_eq!(
            out,
            vec![EngineEvent::Progress {
                position_ms: 12_250,
                duration_ms: 120_500
            }]
        );
        // idle mpv reports null playback-time
        assert!(t
            .translate(&ev(json!({"event": "property-change", "id": OBS_PLAYBACK_TIME, "data": null})))
            .is_empty());
    }

    #[test]
    fn test_cache_args_split_back_buffer() {
        assert_eq!(cache_args(0), vec!["--cache=no".to_string()]);
        let args = cache_args(50);
        assert!(args.contains(&"--demuxer-max-bytes=50MiB".to_string()));
        assert!(args.contains(&"--demuxer-max-back-bytes=25MiB".to_string()));
    }

    #[tokio::test]
    async fn test_uninitialised_engine_reports_error() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut engine = MpvEngine::new(tx, 50);
        engine.pause();
        assert_eq!(
            rx.recv().await,
            Some(EngineEvent::Error("mpv is not running".into()))
        );
    }
}
