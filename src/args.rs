//! These structs provide the CLI interface for the insights CLI.

use crate::config::DEFAULT_BIND;
use crate::dashboard::Analysis;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// insights: A dashboard for retail outlet and product sales.
///
/// Upload an `.xlsx` export of sales transactions or product line items and explore sales trends,
/// outlet comparisons and product mixes in the browser. Access is gated by a shared code that is
/// stored in the config file created by `insights init`.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the insights home directory and its config file.
    ///
    /// This is the first command you should run. Decide on the access code operators will type
    /// into the login page and pass it as --auth-code. The directory defaults to $HOME/insights,
    /// pass --insights-home to put it somewhere else.
    Init(InitArgs),
    /// Run the dashboard web server.
    Serve(ServeArgs),
    /// Print the headline metrics of a spreadsheet without starting the server.
    Summary(SummaryArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where the insights configuration is held. Defaults to ~/insights
    #[arg(long, env = "INSIGHTS_HOME", default_value_t = default_insights_home())]
    insights_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, insights_home: PathBuf) -> Self {
        Self {
            log_level,
            insights_home: insights_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn insights_home(&self) -> &DisplayPath {
        &self.insights_home
    }
}

/// (Not shown): Args for the `insights init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The shared access code for the login page.
    #[arg(long)]
    auth_code: String,

    /// The address the server will listen on.
    #[arg(long, default_value = DEFAULT_BIND)]
    bind: String,
}

impl InitArgs {
    pub fn new(auth_code: impl Into<String>, bind: impl Into<String>) -> Self {
        Self {
            auth_code: auth_code.into(),
            bind: bind.into(),
        }
    }

    pub fn auth_code(&self) -> &str {
        &self.auth_code
    }

    pub fn bind(&self) -> &str {
        &self.bind
    }
}

/// (Not shown): Args for the `insights serve` command.
#[derive(Debug, Parser, Clone)]
pub struct ServeArgs {
    /// Listen on this address instead of the configured one, e.g. 0.0.0.0:8501
    #[arg(long)]
    bind: Option<String>,

    /// Use this access code instead of the configured one.
    #[arg(long, env = "INSIGHTS_AUTH_CODE", hide_env_values = true)]
    auth_code: Option<String>,
}

impl ServeArgs {
    pub fn new(bind: Option<String>, auth_code: Option<String>) -> Self {
        Self { bind, auth_code }
    }

    pub fn bind(&self) -> Option<&str> {
        self.bind.as_deref()
    }

    pub fn auth_code(&self) -> Option<&str> {
        self.auth_code.as_deref()
    }
}

/// (Not shown): Args for the `insights summary` command.
#[derive(Debug, Parser, Clone)]
pub struct SummaryArgs {
    /// The .xlsx file to summarize.
    #[arg(long)]
    file: PathBuf,

    /// Which dashboard to compute: "sales" or "products"
    #[arg(long, default_value_t = Analysis::Sales)]
    analysis: Analysis,

    /// The outlet (PCNumber) for outlet-level figures. Defaults to the first outlet.
    #[arg(long)]
    outlet: Option<String>,
}

impl SummaryArgs {
    pub fn new(file: impl Into<PathBuf>, analysis: Analysis, outlet: Option<String>) -> Self {
        Self {
            file: file.into(),
            analysis,
            outlet,
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn analysis(&self) -> Analysis {
        self.analysis
    }

    pub fn outlet(&self) -> Option<&str> {
        self.outlet.as_deref()
    }
}

fn default_insights_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("insights"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --insights-home or INSIGHTS_HOME instead of relying on the \
                default insights home directory.",
            );
            PathBuf::from("insights")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}
