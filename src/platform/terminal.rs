//! Host ports for running the daemon in a terminal: bell for audio, window
//! title for the flash, printed banners for modal and system alerts.

use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use crossterm::execute;
use crossterm::terminal::SetTitle;
use dashmap::DashMap;

use crate::config::PermissionPolicy;
use crate::notifications::ack::{AckHandle, AckSource};
use crate::platform::ports::{
    AgentMessage, AlertSpec, AlertSurface, AudioPlayer, BackgroundAgent, DeepLinkHandler,
    ModalSpec, ModalSurface, PermissionPort, PermissionState, TitleBar,
};

pub const DEFAULT_TITLE: &str = "alertline";

pub struct TerminalTitle {
    current: Mutex<String>,
}

impl TerminalTitle {
    pub fn new(initial: &str) -> Self {
        let title = Self {
            current: Mutex::new(String::new()),
        };
        title.set(initial);
        title
    }
}

impl TitleBar for TerminalTitle {
    fn current(&self) -> String {
        self.current
            .lock()
            .map(|title| title.clone())
            .unwrap_or_default()
    }

    fn set(&self, title: &str) {
        if let Ok(mut current) = self.current.lock() {
            *current = title.to_string();
        }
        if let Err(err) = execute!(std::io::stdout(), SetTitle(title)) {
            tracing::debug!(error = %err, "terminal title not updated");
        }
    }
}

/// Rings the terminal bell; the clip path is only logged.
#[derive(Debug, Default)]
pub struct TerminalBell;

impl AudioPlayer for TerminalBell {
    fn is_supported(&self) -> bool {
        true
    }

    fn play(&self, clip: &Path) -> anyhow::Result<()> {
        let mut out = std::io::stdout();
        out.write_all(b"\x07")?;
        out.flush()?;
        tracing::debug!(event = "audio_cue", clip = %clip.display(), "bell");
        Ok(())
    }
}

/// Prints a banner and waits for `ack <id>` on stdin.
#[derive(Default)]
pub struct TerminalModal {
    open: DashMap<String, AckHandle>,
}

impl TerminalModal {
    /// Acknowledges an open modal, or the only open one when `id` is `None`.
    pub fn acknowledge(&self, id: Option<&str>) -> bool {
        let id = match id {
            Some(id) => id.to_string(),
            None => {
                if self.open.len() != 1 {
                    return false;
                }
                match self.open.iter().next() {
                    Some(entry) => entry.key().clone(),
                    None => return false,
                }
            }
        };
        match self.open.remove(&id) {
            Some((_, handle)) => handle.acknowledge(AckSource::Modal),
            None => false,
        }
    }

    pub fn open_ids(&self) -> Vec<String> {
        self.open.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl ModalSurface for TerminalModal {
    fn is_supported(&self) -> bool {
        true
    }

    fn show(&self, modal: ModalSpec, on_acknowledge: AckHandle) -> anyhow::Result<()> {
        let mut err = std::io::stderr();
        writeln!(err, "\n==================== CRITICAL ====================")?;
        writeln!(err, "{}", modal.title)?;
        writeln!(err, "{}", modal.body)?;
        writeln!(
            err,
            "[{}] type: ack {}",
            modal.action_label, modal.notification_id
        )?;
        writeln!(err, "==================================================")?;
        self.open.insert(modal.notification_id, on_acknowledge);
        Ok(())
    }

    fn dismiss(&self, notification_id: &str) {
        if self.open.remove(notification_id).is_some() {
            eprintln!("[dismissed {notification_id}]");
        }
    }
}

#[derive(Debug, Default)]
pub struct TerminalAlerts;

#[async_trait]
impl AlertSurface for TerminalAlerts {
    fn is_supported(&self) -> bool {
        true
    }

    async fn show(&self, alert: AlertSpec, _on_click: AckHandle) -> anyhow::Result<()> {
        let marker = if alert.require_interaction { "!!" } else { "--" };
        eprintln!("{marker} {}: {} ({})", alert.title, alert.body, alert.url);
        Ok(())
    }
}

/// Permission decided by config; `prompt` asks once on stdin.
pub struct PolicyPermission {
    state: Mutex<PermissionState>,
}

impl PolicyPermission {
    pub fn new(policy: PermissionPolicy) -> Self {
        let state = match policy {
            PermissionPolicy::Granted => PermissionState::Granted,
            PermissionPolicy::Denied => PermissionState::Denied,
            PermissionPolicy::Prompt => PermissionState::Prompt,
        };
        Self {
            state: Mutex::new(state),
        }
    }

    fn store(&self, state: PermissionState) {
        if let Ok(mut current) = self.state.lock() {
            *current = state;
        }
    }
}

#[async_trait]
impl PermissionPort for PolicyPermission {
    fn state(&self) -> PermissionState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or(PermissionState::Denied)
    }

    async fn request(&self) -> PermissionState {
        if self.state() != PermissionState::Prompt {
            return self.state();
        }
        let answer = tokio::task::spawn_blocking(|| {
            eprint!("Allow critical alerts on this device? [y/N] ");
            let _ = std::io::stderr().flush();
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line).map(|_| line)
        })
        .await;
        let granted = matches!(
            answer,
            Ok(Ok(line)) if matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
        );
        let state = if granted {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        };
        self.store(state);
        state
    }

    fn show_enable_instructions(&self) {
        eprintln!(
            "Critical alerts are blocked. Set `[permission] policy = \"granted\"` in the config \
             file and restart to receive booking alerts."
        );
    }
}

/// In-process stand-in for the background agent.
#[derive(Debug, Default)]
pub struct LocalAgent {
    active: AtomicBool,
}

#[async_trait]
impl BackgroundAgent for LocalAgent {
    fn is_supported(&self) -> bool {
        true
    }

    async fn register(&self) -> anyhow::Result<()> {
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn post_message(&self, message: AgentMessage) -> anyhow::Result<()> {
        tracing::info!(
            event = "agent_message",
            kind = message.kind,
            data = %message.data,
            "background agent received message"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct LoggedDeepLinks;

impl DeepLinkHandler for LoggedDeepLinks {
    fn open(&self, target: &str) {
        tracing::info!(event = "deep_link", target, "navigating");
    }
}
