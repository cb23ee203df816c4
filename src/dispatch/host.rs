//! Operating-system side effects triggered by built-in commands

use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, info, warn};

const MAC_TOGGLE_MUTE: &str = "set volume output muted not (output muted of (get volume settings))";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),

    #[error("{program} failed: {reason}")]
    Command { program: String, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VolumeStep {
    Up,
    Down,
    /// Toggle mute
    Mute,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerAction {
    Shutdown,
    Restart,
}

pub trait HostActions: Send + Sync {
    /// Start a program without waiting for it
    fn launch(&self, program: &str) -> Result<(), ActionError>;

    /// Open a file or folder with its default application
    fn open_path(&self, path: &Path) -> Result<(), ActionError>;

    fn open_url(&self, url: &str) -> Result<(), ActionError>;

    /// Press a volume key `times` times
    fn volume(&self, step: VolumeStep, times: u32) -> Result<(), ActionError>;

    /// Current display brightness in percent
    fn brightness(&self) -> Result<u8, ActionError>;

    fn set_brightness(&self, percent: u8) -> Result<(), ActionError>;

    fn lock_workstation(&self) -> Result<(), ActionError>;

    fn power(&self, action: PowerAction) -> Result<(), ActionError>;

    fn set_wallpaper(&self, path: &Path) -> Result<(), ActionError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Platform {
    Linux,
    MacOs,
    Windows,
}

impl Platform {
    fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }
}

/// Host actions implemented by spawning the platform's standard tools
#[derive(Debug)]
pub struct SystemHost {
    platform: Platform,
}

impl Default for SystemHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemHost {
    pub fn new() -> Self {
        Self {
            platform: Platform::current(),
        }
    }

    /// Run a helper to completion and fail on a non-zero exit
    fn run(&self, program: &str, args: &[&str]) -> Result<String, ActionError> {
        debug!("Running {} {:?}", program, args);
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| command_error(program, e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(command_error(program, format!("{}: {}", output.status, stderr)));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Start a helper and leave it running
    fn detach(&self, program: &str, args: &[&str]) -> Result<(), ActionError> {
        debug!("Starting {} {:?}", program, args);
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| command_error(program, e.to_string()))?;
        if let Err(e) = reap(child) {
            warn!("No reaper thread for {}: {}", program, e);
        }
        Ok(())
    }

    fn open(&self, target: &str) -> Result<(), ActionError> {
        match self.platform {
            Platform::Linux => self.detach("xdg-open", &[target]),
            Platform::MacOs => self.detach("open", &[target]),
            Platform::Windows => self.detach("cmd", &["/C", "start", "", target]),
        }
    }

    fn osascript(&self, script: &str) -> Result<String, ActionError> {
        self.run("osascript", &["-e", script])
    }
}

/// Wait for a detached child on its own thread so it never lingers as a zombie
fn reap(mut child: Child) -> std::io::Result<JoinHandle<Option<ExitStatus>>> {
    thread::Builder::new()
        .name("reaper".to_string())
        .spawn(move || match child.wait() {
            Ok(status) => {
                debug!("Helper {} exited with {}", child.id(), status);
                Some(status)
            }
            Err(e) => {
                warn!("Failed to wait for helper {}: {}", child.id(), e);
                None
            }
        })
}

fn command_error(program: &str, reason: String) -> ActionError {
    ActionError::Command {
        program: program.to_string(),
        reason,
    }
}

/// Parse the percentage column of `brightnessctl -m` output,
/// e.g. `intel_backlight,backlight,400,40%,1000`
fn parse_brightnessctl(output: &str) -> Option<u8> {
    output
        .lines()
        .next()?
        .split(',')
        .find_map(|field| field.trim().strip_suffix('%'))
        .and_then(|value| value.parse().ok())
}

impl HostActions for SystemHost {
    fn launch(&self, program: &str) -> Result<(), ActionError> {
        let parts = shlex::split(program).unwrap_or_default();
        let Some((name, args)) = parts.split_first() else {
            return Err(ActionError::NotFound("empty program".into()));
        };
        if self.platform == Platform::MacOs && args.is_empty() && !name.contains('/') {
            // Application bundle names like "Calculator"
            return self.detach("open", &["-a", name]);
        }
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.detach(name, &args)
    }

    fn open_path(&self, path: &Path) -> Result<(), ActionError> {
        if !path.exists() {
            return Err(ActionError::NotFound(path.display().to_string()));
        }
        self.open(&path.to_string_lossy())
    }

    fn open_url(&self, url: &str) -> Result<(), ActionError> {
        self.open(url)
    }

    fn volume(&self, step: VolumeStep, times: u32) -> Result<(), ActionError> {
        match self.platform {
            Platform::Linux => {
                if step == VolumeStep::Mute {
                    return self
                        .run("pactl", &["set-sink-mute", "@DEFAULT_SINK@", "toggle"])
                        .map(|_| ());
                }
                let delta = if step == VolumeStep::Up { "+2%" } else { "-2%" };
                for _ in 0..times {
                    self.run("pactl", &["set-sink-volume", "@DEFAULT_SINK@", delta])?;
                }
                Ok(())
            }
            Platform::MacOs => {
                let script = match step {
                    VolumeStep::Mute => MAC_TOGGLE_MUTE.to_string(),
                    VolumeStep::Up | VolumeStep::Down => {
                        let sign = if step == VolumeStep::Up { '+' } else { '-' };
                        format!(
                            "set volume output volume ((output volume of (get volume settings)) {} {})",
                            sign,
                            2 * times
                        )
                    }
                };
                self.osascript(&script).map(|_| ())
            }
            Platform::Windows => Err(ActionError::Unsupported("volume control")),
        }
    }

    fn brightness(&self) -> Result<u8, ActionError> {
        match self.platform {
            Platform::Linux => {
                let output = self.run("brightnessctl", &["-m"])?;
                parse_brightnessctl(&output).ok_or_else(|| {
                    command_error("brightnessctl", format!("unexpected output: {}", output.trim()))
                })
            }
            _ => Err(ActionError::Unsupported("brightness control")),
        }
    }

    fn set_brightness(&self, percent: u8) -> Result<(), ActionError> {
        match self.platform {
            Platform::Linux => {
                let value = format!("{}%", percent.min(100));
                self.run("brightnessctl", &["set", &value]).map(|_| ())
            }
            _ => Err(ActionError::Unsupported("brightness control")),
        }
    }

    fn lock_workstation(&self) -> Result<(), ActionError> {
        info!("Locking workstation");
        match self.platform {
            Platform::Linux => self.run("loginctl", &["lock-session"]).map(|_| ()),
            Platform::MacOs => self.run("pmset", &["displaysleepnow"]).map(|_| ()),
            Platform::Windows => self
                .run("rundll32.exe", &["user32.dll,LockWorkStation"])
                .map(|_| ()),
        }
    }

    fn power(&self, action: PowerAction) -> Result<(), ActionError> {
        info!("Host power action: {:?}", action);
        match (self.platform, action) {
            (Platform::Linux, PowerAction::Shutdown) => {
                self.run("systemctl", &["poweroff"]).map(|_| ())
            }
            (Platform::Linux, PowerAction::Restart) => {
                self.run("systemctl", &["reboot"]).map(|_| ())
            }
            (Platform::MacOs, PowerAction::Shutdown) => {
                self.osascript("tell application \"System Events\" to shut down").map(|_| ())
            }
            (Platform::MacOs, PowerAction::Restart) => {
                self.osascript("tell application \"System Events\" to restart").map(|_| ())
            }
            (Platform::Windows, PowerAction::Shutdown) => {
                self.run("shutdown", &["/s", "/t", "1"]).map(|_| ())
            }
            (Platform::Windows, PowerAction::Restart) => {
                self.run("shutdown", &["/r", "/t", "1"]).map(|_| ())
            }
        }
    }

    fn set_wallpaper(&self, path: &Path) -> Result<(), ActionError> {
        let absolute = path
            .canonicalize()
            .map_err(|_| ActionError::NotFound(path.display().to_string()))?;
        let absolute = absolute.to_string_lossy();
        match self.platform {
            Platform::Linux => {
                let uri = format!("file://{}", absolute);
                self.run(
                    "gsettings",
                    &["set", "org.gnome.desktop.background", "picture-uri", &uri],
                )?;
                // Dark-style desktops read a separate key; older ones lack it
                let _ = self.run(
                    "gsettings",
                    &["set", "org.gnome.desktop.background", "picture-uri-dark", &uri],
                );
                Ok(())
            }
            Platform::MacOs => {
                let script = format!(
                    "tell application \"System Events\" to tell every desktop to set picture to \"{}\"",
                    absolute
                );
                self.osascript(&script).map(|_| ())
            }
            Platform::Windows => Err(ActionError::Unsupported("wallpaper changes")),
        }
    }
}
