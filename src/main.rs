use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use admon_types::{QuotaIdType, StatsKind};
use admon_watch::app::{App, OutputFormat, Projection, View};
use admon_watch::command::{CommandClient, Sha256Signer};
use admon_watch::config::ClientConfig;
use admon_watch::data::duration::parse_duration;
use admon_watch::data::{StatsSession, TimeSpan};
use admon_watch::refresh::{RefreshHandle, RefreshLoop, RefreshMode};
use admon_watch::source::{http_client, Poller, RequestDescriptor};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "admon-watch")]
#[command(about = "Poll and display the XML endpoints of an admon daemon")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Daemon host
    #[arg(long, global = true)]
    host: Option<String>,

    /// Daemon port
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Delay between polls (e.g., "1s", "500ms")
    #[arg(short, long, global = true)]
    interval: Option<String>,

    /// How long to wait for data before reporting (e.g., "10s")
    #[arg(long, global = true)]
    wait_timeout: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    /// Shorthand for --format json
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch an endpoint once and print it
    Get {
        /// Endpoint name, e.g. XML_MetanodesOverview
        endpoint: String,
        #[command(flatten)]
        request: RequestArgs,
        #[command(flatten)]
        projection: ProjectionArgs,
    },
    /// Poll an endpoint periodically and print every new document
    Watch {
        endpoint: String,
        #[command(flatten)]
        request: RequestArgs,
        #[command(flatten)]
        projection: ProjectionArgs,
        /// Stop after this many documents
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },
    /// Follow chart series of an overview endpoint
    Chart {
        endpoint: String,
        /// Series element names
        #[arg(short, long = "series", required = true)]
        series: Vec<String>,
        /// Displayed time span, e.g. "10 min", "6 h", "1 d"
        #[arg(long, default_value = "10 min")]
        time_span: TimeSpan,
        /// Request parameter carrying the time span in minutes
        #[arg(long, default_value = "timeSpanRequests")]
        span_param: String,
        #[command(flatten)]
        request: RequestArgs,
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },
    /// Follow client or user operation statistics
    Stats {
        /// client-meta, user-meta, client-storage or user-storage
        kind: StatsKind,
        /// Aggregation interval in seconds
        #[arg(long, default_value_t = 10)]
        interval_secs: u32,
        /// Number of host lines
        #[arg(long, default_value_t = 10)]
        lines: u32,
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },
    /// Show quota usage
    Quota {
        /// Show group instead of user quota
        #[arg(long)]
        group: bool,
        /// Include entries without usage
        #[arg(long)]
        show_zeros: bool,
        /// Include system users and groups
        #[arg(long)]
        show_system: bool,
    },
    /// Submit an authenticated command
    Command {
        endpoint: String,
        #[command(flatten)]
        request: RequestArgs,
        /// Admin password (overrides the configuration)
        #[arg(long)]
        password: Option<String>,
    },
}

#[derive(Args, Debug, Default)]
struct RequestArgs {
    /// Request parameter as key=value (repeatable)
    #[arg(short = 'P', long = "param", value_parser = parse_key_value)]
    params: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum ProjectionKind {
    #[default]
    Tree,
    Map,
    Scalar,
    List,
    AttributeMap,
    Records,
    Descendants,
}

#[derive(Args, Debug, Default)]
struct ProjectionArgs {
    /// How to read the document
    #[arg(long, value_enum, default_value_t = ProjectionKind::Tree)]
    view: ProjectionKind,
    /// Element (or tag) the view reads
    #[arg(long)]
    name: Option<String>,
    /// Parent element of a scalar
    #[arg(long)]
    parent: Option<String>,
    /// Attribute used as key
    #[arg(long)]
    attr: Option<String>,
}

impl ProjectionArgs {
    fn projection(&self) -> Result<Projection> {
        let name = self.name.clone();
        let required = |what: &str, value: Option<String>| {
            value.with_context(|| format!("--view {:?} needs --{}", self.view, what))
        };

        Ok(match self.view {
            ProjectionKind::Tree => Projection::Tree,
            ProjectionKind::Map => Projection::Map(name),
            ProjectionKind::Scalar => Projection::Scalar {
                name: required("name", name)?,
                parent: self.parent.clone(),
            },
            ProjectionKind::List => Projection::List(name),
            ProjectionKind::AttributeMap => Projection::AttributeMap {
                name,
                attr: required("attr", self.attr.clone())?,
            },
            ProjectionKind::Records => Projection::Records(name),
            ProjectionKind::Descendants => Projection::Descendants {
                tag: required("name", name)?,
                attr: required("attr", self.attr.clone())?,
            },
        })
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("empty parameter name in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "admon_watch=debug",
        _ => "admon_watch=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Layer command line flags over the file and environment configuration.
fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = ClientConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(interval) = &cli.interval {
        config.interval = parse_duration(interval).context("Invalid --interval")?;
    }
    if let Some(wait_timeout) = &cli.wait_timeout {
        config.wait_timeout = parse_duration(wait_timeout).context("Invalid --wait-timeout")?;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli)?;
    debug!(?config, "configuration loaded");

    let format = if cli.json { OutputFormat::Json } else { cli.format };
    let address = config.address();
    let client = http_client(config.request_timeout);

    let poller = |request: RequestDescriptor| {
        Arc::new(
            Poller::builder()
                .request(request)
                .client(client.clone())
                .build(),
        )
    };
    let periodic = |poller: Arc<Poller>| {
        RefreshLoop::new(poller)
            .mode(RefreshMode::Periodic(config.interval))
            .wait_timeout(config.wait_timeout)
    };

    match cli.command {
        Command::Get {
            endpoint,
            request,
            projection,
        } => {
            let view = View::Document(projection.projection()?);
            let poller = poller(with_params(address.request(&endpoint), request));
            let refresh = RefreshLoop::one_shot(poller).wait_timeout(config.wait_timeout);
            let shown = run(refresh.start(), App::new(view, format), None).await?;
            if shown == 0 {
                bail!("No data received from {}", address);
            }
        }
        Command::Watch {
            endpoint,
            request,
            projection,
            count,
        } => {
            let view = View::Document(projection.projection()?);
            let poller = poller(with_params(address.request(&endpoint), request));
            run(periodic(poller).start(), App::new(view, format), count).await?;
        }
        Command::Chart {
            endpoint,
            series,
            time_span,
            span_param,
            request,
            count,
        } => {
            let request = with_params(address.request(&endpoint), request)
                .with_param(span_param, time_span.to_minutes());
            let poller = poller(request);
            run(periodic(poller).start(), App::new(View::chart(series), format), count).await?;
        }
        Command::Stats {
            kind,
            interval_secs,
            lines,
            count,
        } => {
            let mut session = StatsSession::new(kind);
            session.set_interval(interval_secs);
            session.set_num_lines(lines);

            let poller = poller(session.request(&address));
            run(
                periodic(poller).start(),
                App::new(View::stats(session), format),
                count,
            )
            .await?;
        }
        Command::Quota {
            group,
            show_zeros,
            show_system,
        } => {
            let id_type = if group {
                QuotaIdType::Group
            } else {
                QuotaIdType::User
            };
            let request = address
                .request("XML_GetQuota")
                .with_param("idType", id_type.as_param())
                .with_param("showZeros", show_zeros)
                .with_param("showSystemUser", show_system);
            let refresh = RefreshLoop::one_shot(poller(request)).wait_timeout(config.wait_timeout);
            let shown = run(refresh.start(), App::new(View::Quota { id_type }, format), None).await?;
            if shown == 0 {
                bail!("No quota data received from {}", address);
            }
        }
        Command::Command {
            endpoint,
            request,
            password,
        } => {
            let password = password
                .or(config.password.clone())
                .context("A password is required for commands (--password or config)")?;
            let commands = CommandClient::new(address, Sha256Signer::new(password))
                .with_client(client.clone());

            let outcome = commands.submit(&endpoint, request.params).await?;
            match format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::json!({
                        "authenticated": outcome.authenticated,
                        "errors": outcome.errors,
                    })
                ),
                OutputFormat::Text => {
                    for error in &outcome.errors {
                        println!("error: {}", error);
                    }
                }
            }
            if !outcome.authenticated {
                bail!("Authentication failed");
            }
            if !outcome.errors.is_empty() {
                bail!("Command reported {} error(s)", outcome.errors.len());
            }
            info!(%endpoint, "command accepted");
        }
    }

    Ok(())
}

fn with_params(request: RequestDescriptor, args: RequestArgs) -> RequestDescriptor {
    args.params
        .into_iter()
        .fold(request, |request, (key, value)| request.with_param(key, value))
}

/// Print updates until the loop stops, `count` documents were shown, or
/// Ctrl-C is pressed.
async fn run(handle: RefreshHandle, mut app: App, count: Option<usize>) -> Result<usize> {
    let mut stdout = io::stdout();

    let finished = tokio::select! {
        shown = app.run(&handle, &mut stdout, count) => Some(shown),
        _ = tokio::signal::ctrl_c() => None,
    };
    let shown = match finished {
        Some(shown) => shown?,
        None => {
            debug!("interrupted");
            app.updates_seen
        }
    };

    let stop_wait = Duration::from_secs(1);
    if tokio::time::timeout(stop_wait, handle.shutdown()).await.is_err() {
        debug!("refresh loop still finishing a request");
    }
    Ok(shown)
}
