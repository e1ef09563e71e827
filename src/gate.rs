//! # System gate
//!
//! Decides whether checks may run right now, from two host signals: the power
//! source and the user's idle time. Either signal may be undetectable; the gate
//! then fails open so that monitoring is never blocked by a missing sysfs node
//! or an absent idle helper.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// A host signal that may be unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal<T> {
    Available(T),
    Unavailable,
}

/// Power source capability.
pub trait PowerProbe: Send + Sync {
    /// `Available(true)` when running on mains power.
    fn on_ac_power(&self) -> Signal<bool>;
}

/// Idle time capability.
#[async_trait]
pub trait IdleProbe: Send + Sync {
    async fn idle_time(&self) -> Signal<Duration>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    pub allowed: bool,
    pub reason: String,
}

impl GateDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: "OK".to_string(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

pub struct SystemGate {
    power: Box<dyn PowerProbe>,
    idle: Box<dyn IdleProbe>,
}

impl SystemGate {
    pub fn new(power: Box<dyn PowerProbe>, idle: Box<dyn IdleProbe>) -> Self {
        Self { power, idle }
    }

    /// sysfs power supply + KDE/X11 idle helpers.
    pub fn linux() -> Self {
        Self::new(
            Box::new(SysfsPower::default()),
            Box::new(CommandIdle::default()),
        )
    }

    /// Battery is checked first: on battery the answer is "no" whatever the idle time.
    pub async fn permit(&self, require_ac_power: bool, idle_threshold_minutes: u32) -> GateDecision {
        if require_ac_power {
            match self.power.on_ac_power() {
                Signal::Available(false) => return GateDecision::deny("On battery power"),
                Signal::Available(true) => {}
                Signal::Unavailable => debug!("power source undetectable, assuming AC"),
            }
        }

        let threshold = Duration::from_secs(u64::from(idle_threshold_minutes) * 60);
        match self.idle.idle_time().await {
            Signal::Available(idle) if idle >= threshold => {
                return GateDecision::deny(format!(
                    "User idle for >{idle_threshold_minutes} minutes"
                ));
            }
            Signal::Available(_) => {}
            Signal::Unavailable => debug!("idle time undetectable, assuming active"),
        }

        GateDecision::allow()
    }

    pub fn power_signal(&self) -> Signal<bool> {
        self.power.on_ac_power()
    }
}

// ------------------------------------------------------------
// Power: /sys/class/power_supply
// ------------------------------------------------------------

pub struct SysfsPower {
    root: PathBuf,
}

impl Default for SysfsPower {
    fn default() -> Self {
        Self::new("/sys/class/power_supply")
    }
}

impl SysfsPower {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl PowerProbe for SysfsPower {
    /// First readable `AC*/online` (covers `ACAD*`) decides.
    fn on_ac_power(&self) -> Signal<bool> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Signal::Unavailable;
        };
        let mut adapters: Vec<PathBuf> = entries
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with("AC"))
            .map(|e| e.path())
            .collect();
        adapters.sort();

        for adapter in adapters {
            if let Ok(s) = std::fs::read_to_string(adapter.join("online")) {
                return Signal::Available(s.trim() == "1");
            }
        }
        Signal::Unavailable
    }
}

// ------------------------------------------------------------
// Idle: external helpers, each time-bounded
// ------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleUnit {
    Seconds,
    Millis,
}

#[derive(Debug, Clone)]
pub struct IdleCommand {
    pub program: String,
    pub args: Vec<String>,
    pub unit: IdleUnit,
}

impl IdleCommand {
    pub fn new(program: &str, args: &[&str], unit: IdleUnit) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            unit,
        }
    }

    fn parse(&self, stdout: &str) -> Option<Duration> {
        let n: u64 = stdout.trim().parse().ok()?;
        Some(match self.unit {
            IdleUnit::Seconds => Duration::from_secs(n),
            IdleUnit::Millis => Duration::from_millis(n),
        })
    }
}

/// Tries each helper in order; the first one that answers wins.
pub struct CommandIdle {
    commands: Vec<IdleCommand>,
    timeout: Duration,
}

impl Default for CommandIdle {
    fn default() -> Self {
        Self::new(vec![
            IdleCommand::new(
                "qdbus",
                &["org.kde.screensaver", "/ScreenSaver", "GetSessionIdleTime"],
                IdleUnit::Seconds,
            ),
            IdleCommand::new("xprintidle", &[], IdleUnit::Millis),
        ])
    }
}

impl CommandIdle {
    pub fn new(commands: Vec<IdleCommand>) -> Self {
        Self {
            commands,
            timeout: Duration::from_secs(5),
        }
    }

    async fn run(&self, cmd: &IdleCommand) -> Option<Duration> {
        let child = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(out)) => out,
            Ok(Err(e)) => {
                debug!(program = %cmd.program, "idle helper unavailable: {e}");
                return None;
            }
            Err(_) => {
                debug!(program = %cmd.program, "idle helper timed out");
                return None;
            }
        };
        if !output.status.success() {
            return None;
        }
        cmd.parse(&String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait]
impl IdleProbe for CommandIdle {
    async fn idle_time(&self) -> Signal<Duration> {
        for cmd in &self.commands {
            if let Some(idle) = self.run(cmd).await {
                return Signal::Available(idle);
            }
        }
        Signal::Unavailable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sysfs_reads_first_ac_adapter() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("BAT0")).unwrap();
        std::fs::write(dir.path().join("BAT0/online"), "1\n").unwrap();
        std::fs::create_dir_all(dir.path().join("ACAD")).unwrap();
        std::fs::write(dir.path().join("ACAD/online"), "0\n").unwrap();

        let probe = SysfsPower::new(dir.path());
        assert_eq!(probe.on_ac_power(), Signal::Available(false));

        std::fs::write(dir.path().join("ACAD/online"), "1\n").unwrap();
        assert_eq!(probe.on_ac_power(), Signal::Available(true));
    }

    #[test]
    fn sysfs_without_adapter_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("BAT0")).unwrap();
        assert_eq!(SysfsPower::new(dir.path()).on_ac_power(), Signal::Unavailable);
        assert_eq!(
            SysfsPower::new(dir.path().join("missing")).on_ac_power(),
            Signal::Unavailable
        );
    }

    #[test]
    fn idle_units_are_converted() {
        let secs = IdleCommand::new("x", &[], IdleUnit::Seconds);
        let ms = IdleCommand::new("x", &[], IdleUnit::Millis);
        assert_eq!(secs.parse("42\n"), Some(Duration::from_secs(42)));
        assert_eq!(ms.parse("1500"), Some(Duration::from_millis(1500)));
        assert_eq!(ms.parse("n/a"), None);
    }

    #[tokio::test]
    async fn missing_idle_helpers_are_unavailable() {
        let idle = CommandIdle::new(vec![IdleCommand::new(
            "watchdog-agent-no-such-helper",
            &[],
            IdleUnit::Millis,
        )]);
        assert_eq!(idle.idle_time().await, Signal::Unavailable);
    }
}
