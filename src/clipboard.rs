//! Hand-off of node URLs to the desktop: clipboard and default browser.

use std::{
    env,
    io::Write,
    process::{Command, Stdio},
};

use anyhow::Result;
use arboard::Clipboard as SystemClipboardHandle;
use tracing::{debug, info};

pub trait ClipboardSink {
    fn set_text(&mut self, text: String) -> Result<()>;
}

pub trait BrowserOpener {
    fn open(&mut self, url: &str) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Session {
    Wayland,
    X11,
}

/// Command-line program that takes the text to copy on stdin.
#[derive(Debug, PartialEq, Eq)]
pub struct PipeHelper {
    program: &'static str,
    args: &'static [&'static str],
    session: Session,
}

static PIPE_HELPERS: [PipeHelper; 2] = [
    PipeHelper {
        program: "wl-copy",
        args: &[],
        session: Session::Wayland,
    },
    PipeHelper {
        program: "xclip",
        args: &["-selection", "clipboard"],
        session: Session::X11,
    },
];

#[derive(Debug, PartialEq, Eq)]
pub enum ClipboardBackend {
    Arboard,
    Pipe(&'static PipeHelper),
    None,
}

/// What the desktop offers for copying, captured once at startup.
#[derive(Debug, Default)]
pub struct DesktopEnv {
    arboard: bool,
    wayland: bool,
    x11: bool,
    installed: Vec<&'static str>,
}

impl DesktopEnv {
    pub fn detect() -> Self {
        Self {
            arboard: SystemClipboardHandle::new().is_ok(),
            wayland: env::var_os("WAYLAND_DISPLAY").is_some(),
            x11: env::var_os("DISPLAY").is_some(),
            installed: PIPE_HELPERS
                .iter()
                .map(|helper| helper.program)
                .filter(|program| command_exists(program))
                .collect(),
        }
    }

    pub fn backend(&self) -> ClipboardBackend {
        if self.arboard {
            return ClipboardBackend::Arboard;
        }
        PIPE_HELPERS
            .iter()
            .find(|helper| {
                self.has_session(helper.session) && self.installed.contains(&helper.program)
            })
            .map_or(ClipboardBackend::None, ClipboardBackend::Pipe)
    }

    fn has_session(&self, session: Session) -> bool {
        match session {
            Session::Wayland => self.wayland,
            Session::X11 => self.x11,
        }
    }
}

fn command_exists(program: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {program} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// `None` means copying is unavailable in this session.
pub fn build_clipboard() -> Option<Box<dyn ClipboardSink>> {
    let backend = DesktopEnv::detect().backend();
    info!(backend = ?backend, "clipboard backend");
    match backend {
        ClipboardBackend::Arboard => SystemClipboardHandle::new()
            .ok()
            .map(|inner| Box::new(SystemClipboard { inner }) as Box<dyn ClipboardSink>),
        ClipboardBackend::Pipe(helper) => Some(Box::new(PipeClipboard { helper })),
        ClipboardBackend::None => None,
    }
}

struct SystemClipboard {
    inner: SystemClipboardHandle,
}

impl ClipboardSink for SystemClipboard {
    fn set_text(&mut self, text: String) -> Result<()> {
        self.inner
            .set_text(text)
            .map_err(|err| anyhow::anyhow!("clipboard write failed: {err}"))
    }
}

struct PipeClipboard {
    helper: &'static PipeHelper,
}

impl ClipboardSink for PipeClipboard {
    fn set_text(&mut self, text: String) -> Result<()> {
        let program = self.helper.program;
        debug!(program, "piping URL to clipboard helper");
        let mut child = Command::new(program)
            .args(self.helper.args)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|err| anyhow::anyhow!("{program} failed to start: {err}"))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes())?;
        }
        let status = child.wait()?;
        if !status.success() {
            anyhow::bail!("{program} exited with {status}");
        }
        Ok(())
    }
}

pub struct SystemBrowser;

impl BrowserOpener for SystemBrowser {
    fn open(&mut self, url: &str) -> Result<()> {
        open::that(url).map_err(|err| anyhow::anyhow!("no browser for {url}: {err}"))
    }
}
