use crate::error::{PreviewError, Result};
use crate::handle::{MediaHandle, MediaOpener};
use reelcut_core::{Asset, AssetKind, Seconds};
use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

/// One mpv process per clip, driven over its JSON IPC socket.
pub struct MpvHandle {
    process: Option<Child>,
    socket_path: PathBuf,
}

impl MpvHandle {
    /// Start a paused mpv instance for `src`. Audio-only sources get no window.
    pub fn spawn(src: &str, video: bool) -> Result<Self> {
        let socket_path = std::env::temp_dir().join(format!(
            "reelcut-mpv-{}-{}",
            std::process::id(),
            uuid::Uuid::new_v4().simple()
        ));
        let mut args = vec![
            "--idle=yes".to_string(),
            "--keep-open=yes".to_string(),
            "--pause".to_string(),
            "--osc=no".to_string(),
            "--osd-level=0".to_string(),
            "--title=reelcut-preview".to_string(),
            format!("--input-ipc-server={}", socket_path.display()),
        ];
        if !video {
            args.push("--vid=no".to_string());
            args.push("--force-window=no".to_string());
        }

        let child = Command::new("mpv")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| PreviewError::Media(format!("Failed to start mpv: {}", e)))?;

        let mut handle = Self {
            process: Some(child),
            socket_path,
        };
        handle.wait_for_socket()?;
        handle.load_file(src)?;
        tracing::debug!(%src, socket = %handle.socket_path.display(), "mpv started");
        Ok(handle)
    }

    fn wait_for_socket(&mut self) -> Result<()> {
        for _ in 0..50 {
            if self.socket_path.exists() {
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        self.stop();
        Err(PreviewError::Ipc("mpv socket did not appear".into()))
    }

    fn send_command(&self, command: serde_json::Value) -> Result<serde_json::Value> {
        if self.process.is_none() {
            return Err(PreviewError::NotRunning);
        }
        let mut stream = UnixStream::connect(&self.socket_path)
            .map_err(|e| PreviewError::Ipc(format!("Failed to connect to mpv: {}", e)))?;
        stream.set_read_timeout(Some(Duration::from_secs(2))).ok();

        let msg = format!("{}\n", command);
        stream.write_all(msg.as_bytes())?;

        let mut reader = BufReader::new(stream);
        let mut response = String::new();
        reader.read_line(&mut response)?;

        let value: serde_json::Value = serde_json::from_str(&response)?;
        match value.get("error").and_then(|e| e.as_str()) {
            Some("success") | None => Ok(value),
            Some(err) => Err(PreviewError::Ipc(err.to_string())),
        }
    }

    fn set_property(&self, name: &str, value: serde_json::Value) -> Result<()> {
        self.send_command(json!({ "command": ["set_property", name, value] }))?;
        Ok(())
    }

    fn get_property(&self, name: &str) -> Result<serde_json::Value> {
        let resp = self.send_command(json!({ "command": ["get_property", name] }))?;
        resp.get("data")
            .cloned()
            .ok_or_else(|| PreviewError::Ipc(format!("No data for property {}", name)))
    }

    pub fn load_file(&self, path: &str) -> Result<()> {
        self.send_command(json!({ "command": ["loadfile", path] }))?;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.process.is_some()
    }

    pub fn stop(&mut self) {
        if let Some(mut child) = self.process.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

impl MediaHandle for MpvHandle {
    fn seek(&mut self, t: Seconds) -> Result<()> {
        self.send_command(json!({ "command": ["seek", t, "absolute+exact"] }))?;
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.set_property("pause", json!(false))
    }

    fn pause(&mut self) -> Result<()> {
        self.set_property("pause", json!(true))
    }

    fn set_rate(&mut self, rate: f64) -> Result<()> {
        self.set_property("speed", json!(rate))
    }

    fn set_volume(&mut self, volume: f64) -> Result<()> {
        // mpv volume is a percentage.
        self.set_property("volume", json!((volume * 100.0).clamp(0.0, 1000.0)))
    }

    fn position(&self) -> Result<Seconds> {
        self.get_property("time-pos")?
            .as_f64()
            .ok_or_else(|| PreviewError::Ipc("No position data".into()))
    }

    fn is_paused(&self) -> Result<bool> {
        self.get_property("pause")?
            .as_bool()
            .ok_or_else(|| PreviewError::Ipc("No pause data".into()))
    }
}

impl Drop for MpvHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Opens every video/audio asset in its own mpv process.
#[derive(Debug, Default, Clone, Copy)]
pub struct MpvOpener;

impl MediaOpener for MpvOpener {
    fn open(&mut self, asset: &Asset) -> Result<Box<dyn MediaHandle>> {
        match asset.kind {
            AssetKind::Video | AssetKind::Audio => Ok(Box::new(MpvHandle::spawn(
                &asset.src,
                asset.kind == AssetKind::Video,
            )?)),
            AssetKind::Image | AssetKind::Text => Err(PreviewError::Media(format!(
                "{:?} assets have no playable media",
                asset.kind
            ))),
        }
    }
}
