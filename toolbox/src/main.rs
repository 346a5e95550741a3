use clap::{ArgAction, Parser, Subcommand};
use recon_core::{OutputFormat, ReconError, ReconResult, Report, Session};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};

mod config;
mod logging;
mod menu;
mod wiring;

#[derive(Debug, Parser)]
#[command(name = "osint", version, about = "Passive OSINT reconnaissance with a timestamped report")]
struct Cli {
    /// Write the report as Markdown instead of plain text
    #[arg(long, global = true)]
    md: bool,
    /// Optional config file (YAML). If omitted, loads ./osint.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// DNS, WHOIS, RDAP, CT subdomains, archive snapshots, then HTTP/TLS of https://<domain>
    Domain { domain: String },
    /// WHOIS, geo/ASN and reverse DNS for an address
    Ip { ip: String },
    /// Response headers, security header audit, TLS certificate, page summary
    Http { url: String },
    /// Hashes, magic type and embedded metadata of a local file
    File { path: PathBuf },
    /// Print the manual OSINT checklist
    Checklist,
    /// Interactive numbered menu (default)
    Menu,
    /// Print version information
    Version,
}

fn run(cli: Cli) -> ReconResult<()> {
    let command = cli.command.unwrap_or(Commands::Menu);
    if let Commands::Version = command {
        println!("osint {} (core {})", env!("CARGO_PKG_VERSION"), recon_core::version());
        return Ok(());
    }
    let settings = config::Settings::resolve(config::load_config(cli.config.as_deref()));
    debug!(?settings, "settings resolved");
    let format = if cli.md { OutputFormat::Markdown } else { OutputFormat::Text };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let dns_required = matches!(command, Commands::Domain { .. } | Commands::Ip { .. });
        let providers = wiring::providers(&settings, dns_required)?;
        let report = Report::create(format, &std::env::current_dir()?);
        let mut session = Session::new(report, providers).with_deadline(settings.provider_deadline);
        match command {
            Commands::Domain { domain } => session.domain(&domain).await?,
            Commands::Ip { ip } => session.ip(&ip).await?,
            Commands::Http { url } => session.http(&url).await?,
            Commands::File { path } => session.file(&path).await?,
            Commands::Checklist => session.checklist()?,
            Commands::Menu | Commands::Version => {
                let stdin = std::io::stdin();
                menu::run(&mut session, stdin.lock(), std::io::stdout()).await?
            }
        }
        if !session.report().sections().is_empty() {
            info!(artifact = %session.report().artifact_path().display(), "report written");
        }
        Ok::<(), ReconError>(())
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[-] error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
