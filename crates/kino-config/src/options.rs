//! Command-line surface of the server.
//!
//! The server historically accepts single-dash long flags (`-configdir`)
//! and the DOS-style `/?`. Tokens are normalised into clap's long form before
//! parsing so both spellings reach the same definitions; the value following
//! a value-taking flag is never rewritten.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use clap::Parser;
use strum::{EnumIter, IntoEnumIterator};
use thiserror::Error;

/// Flags recognised on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum StartupFlag {
    /// `-h`, `--help`, or `/?`.
    Help,
    /// `-v` or `--version`.
    Version,
    /// `-programdata <path>`.
    ProgramData,
    /// `-configdir <path>`.
    ConfigDir,
    /// `-logdir <path>`.
    LogDir,
    /// `-ffmpeg <path>`.
    Ffmpeg,
    /// `-ffprobe <path>`.
    Ffprobe,
    /// `-restartpath <path>`.
    RestartPath,
    /// `-restartargs <string>`.
    RestartArgs,
    /// `-service`.
    Service,
    /// `-noautorunwebapp`.
    NoAutorunWebApp,
    /// `-package <name>`.
    Package,
}

impl StartupFlag {
    /// Long name of the flag, without leading dashes.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Help => "help",
            Self::Version => "version",
            Self::ProgramData => "programdata",
            Self::ConfigDir => "configdir",
            Self::LogDir => "logdir",
            Self::Ffmpeg => "ffmpeg",
            Self::Ffprobe => "ffprobe",
            Self::RestartPath => "restartpath",
            Self::RestartArgs => "restartargs",
            Self::Service => "service",
            Self::NoAutorunWebApp => "noautorunwebapp",
            Self::Package => "package",
        }
    }

    /// Whether the flag consumes the following token as its value.
    #[must_use]
    pub const fn takes_value(self) -> bool {
        !matches!(
            self,
            Self::Help | Self::Version | Self::Service | Self::NoAutorunWebApp
        )
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::iter().find(|flag| flag.name() == name)
    }
}

#[derive(Parser, Debug, Clone, Default, PartialEq, Eq)]
#[command(
    name = "kinod",
    disable_help_flag = true,
    disable_version_flag = true
)]
struct ParsedFlags {
    #[arg(short = 'h', long = "help")]
    help: bool,
    #[arg(short = 'v', long = "version")]
    version: bool,
    #[arg(long = "programdata", value_name = "PATH")]
    program_data: Option<PathBuf>,
    #[arg(long = "configdir", value_name = "PATH")]
    config_dir: Option<PathBuf>,
    #[arg(long = "logdir", value_name = "PATH")]
    log_dir: Option<PathBuf>,
    #[arg(long = "ffmpeg", value_name = "PATH")]
    ffmpeg: Option<PathBuf>,
    #[arg(long = "ffprobe", value_name = "PATH")]
    ffprobe: Option<PathBuf>,
    #[arg(long = "restartpath", value_name = "PATH")]
    restart_path: Option<PathBuf>,
    #[arg(long = "restartargs", value_name = "ARGS", allow_hyphen_values = true)]
    restart_args: Option<String>,
    #[arg(long = "service")]
    service: bool,
    #[arg(long = "noautorunwebapp")]
    no_autorun_web_app: bool,
    #[arg(long = "package", value_name = "NAME")]
    package: Option<String>,
}

/// Errors raised while interpreting the command line.
#[derive(Debug, Error)]
pub enum OptionsError {
    /// The arguments did not match the command-line surface.
    #[error("{0}")]
    Usage(#[source] clap::Error),
    /// `-ffmpeg` was supplied on its own.
    #[error("Must also supply -ffprobe <path> when using -ffmpeg")]
    MissingFfprobe,
    /// `-ffprobe` was supplied on its own.
    #[error("Must also supply -ffmpeg <path> when using -ffprobe")]
    MissingFfmpeg,
}

/// What the process should do with the parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupAction {
    /// Print usage and exit.
    ShowHelp,
    /// Print the version and exit.
    ShowVersion,
    /// Start the server.
    Run(StartupOptions),
}

/// Immutable view of the parsed command line.
///
/// The original invocation is retained so a restart can replay it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupOptions {
    flags: ParsedFlags,
    invocation: Vec<OsString>,
}

impl StartupOptions {
    /// Parses the full argument vector, including the executable name.
    pub fn parse_from<I, T>(args: I) -> Result<Self, OptionsError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let invocation: Vec<OsString> = args.into_iter().map(Into::into).collect();
        let flags = ParsedFlags::try_parse_from(normalise(&invocation))
            .map_err(OptionsError::Usage)?;
        Ok(Self { flags, invocation })
    }

    /// Decides between help, version, validation failure, and running.
    ///
    /// Help wins over version, and both win over flag validation.
    pub fn action(self) -> Result<StartupAction, OptionsError> {
        if self.flags.help {
            return Ok(StartupAction::ShowHelp);
        }
        if self.flags.version {
            return Ok(StartupAction::ShowVersion);
        }
        match (self.flags.ffmpeg.is_some(), self.flags.ffprobe.is_some()) {
            (true, false) => Err(OptionsError::MissingFfprobe),
            (false, true) => Err(OptionsError::MissingFfmpeg),
            _ => Ok(StartupAction::Run(self)),
        }
    }

    /// Returns true when `flag` was supplied.
    #[must_use]
    pub fn contains(&self, flag: StartupFlag) -> bool {
        match flag {
            StartupFlag::Help => self.flags.help,
            StartupFlag::Version => self.flags.version,
            StartupFlag::Service => self.flags.service,
            StartupFlag::NoAutorunWebApp => self.flags.no_autorun_web_app,
            _ => self.value(flag).is_some(),
        }
    }

    /// Returns the value supplied for `flag`, if any.
    ///
    /// Switches without values always return `None`.
    #[must_use]
    pub fn value(&self, flag: StartupFlag) -> Option<&OsStr> {
        match flag {
            StartupFlag::ProgramData => path_value(self.flags.program_data.as_deref()),
            StartupFlag::ConfigDir => path_value(self.flags.config_dir.as_deref()),
            StartupFlag::LogDir => path_value(self.flags.log_dir.as_deref()),
            StartupFlag::Ffmpeg => path_value(self.flags.ffmpeg.as_deref()),
            StartupFlag::Ffprobe => path_value(self.flags.ffprobe.as_deref()),
            StartupFlag::RestartPath => path_value(self.flags.restart_path.as_deref()),
            StartupFlag::RestartArgs => self.flags.restart_args.as_deref().map(OsStr::new),
            StartupFlag::Package => self.flags.package.as_deref().map(OsStr::new),
            StartupFlag::Help
            | StartupFlag::Version
            | StartupFlag::Service
            | StartupFlag::NoAutorunWebApp => None,
        }
    }

    /// Program data directory given with `-programdata`.
    #[must_use]
    pub fn program_data(&self) -> Option<&Path> {
        self.flags.program_data.as_deref()
    }

    /// Configuration directory given with `-configdir`.
    #[must_use]
    pub fn config_dir(&self) -> Option<&Path> {
        self.flags.config_dir.as_deref()
    }

    /// Log directory given with `-logdir`.
    #[must_use]
    pub fn log_dir(&self) -> Option<&Path> {
        self.flags.log_dir.as_deref()
    }

    /// External `ffmpeg` and `ffprobe` executables, when both were given.
    #[must_use]
    pub fn ffmpeg_tools(&self) -> Option<(&Path, &Path)> {
        self.flags
            .ffmpeg
            .as_deref()
            .zip(self.flags.ffprobe.as_deref())
    }

    /// Executable given with `-restartpath`.
    #[must_use]
    pub fn restart_path(&self) -> Option<&Path> {
        self.flags.restart_path.as_deref()
    }

    /// Argument string given with `-restartargs`.
    ///
    /// `Some("")` means an explicitly empty argument string.
    #[must_use]
    pub fn restart_args(&self) -> Option<&str> {
        self.flags.restart_args.as_deref()
    }

    /// Whether the server runs as a headless service.
    #[must_use]
    pub fn is_service(&self) -> bool {
        self.flags.service
    }

    /// Whether the web app should stay closed after the startup wizard.
    #[must_use]
    pub fn no_autorun_web_app(&self) -> bool {
        self.flags.no_autorun_web_app
    }

    /// Packaging target given with `-package`.
    #[must_use]
    pub fn package(&self) -> Option<&str> {
        self.flags.package.as_deref()
    }

    /// The full original argument vector, executable first.
    #[must_use]
    pub fn invocation(&self) -> &[OsString] {
        &self.invocation
    }
}

fn path_value(path: Option<&Path>) -> Option<&OsStr> {
    path.map(Path::as_os_str)
}

/// Rewrites legacy spellings into the long form clap understands.
fn normalise(invocation: &[OsString]) -> Vec<OsString> {
    let mut normalised = Vec::with_capacity(invocation.len());
    let mut tokens = invocation.iter();
    if let Some(program) = tokens.next() {
        normalised.push(program.clone());
    }
    let mut value_pending = false;
    for token in tokens {
        if value_pending {
            normalised.push(token.clone());
            value_pending = false;
            continue;
        }
        let Some(text) = token.to_str() else {
            normalised.push(token.clone());
            continue;
        };
        if text == "/?" {
            normalised.push(OsString::from("--help"));
            continue;
        }
        let name = text
            .strip_prefix("--")
            .or_else(|| text.strip_prefix('-'))
            .filter(|name| name.len() > 1 && !name.contains('='));
        match name.and_then(StartupFlag::from_name) {
            Some(flag) => {
                normalised.push(OsString::from(format!("--{}", flag.name())));
                value_pending = flag.takes_value();
            }
            None => normalised.push(token.clone()),
        }
    }
    normalised
}

/// Usage text printed for `-h`, `--help`, and `/?`.
#[must_use]
pub fn usage() -> String {
    format!(
        "\
kino {version} - media server

Usage: kinod [options]

Options:
  -h|--help|/?          Show command line help.
  -v|--version          Display the server version.

Paths:
  -programdata <path>   Directory for program data (databases and metadata).
  -configdir <path>     Directory for configuration files.
  -logdir <path>        Directory for log files.

External FFmpeg:
  -ffmpeg <path>        External ffmpeg executable to use in place of the bundled one.
  -ffprobe <path>       External ffprobe executable; must be given together with -ffmpeg.

Restart:
  -restartpath <path>   Executable to launch when the server restarts.
  -restartargs <args>   Argument string passed to the restart executable.

Other:
  -service              Run as a headless service.
  -noautorunwebapp      Do not open the web app once the startup wizard is complete.
  -package <name>       Name of the package this build ships in.

Examples:
  kinod -configdir /home/media/config -logdir /tmp/logs
  kinod -ffmpeg /opt/ffmpeg/ffmpeg -ffprobe /opt/ffmpeg/ffprobe
",
        version = env!("CARGO_PKG_VERSION"),
    )
}
