//! xdeployctl: host process for the XDeployment composition function.

#![forbid(unsafe_code)]

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};
use xdeploy_core::{ResponseMeta, RunFunctionRequest, RunFunctionResponse, Severity, Status};
use xdeploy_function::Function;

#[derive(Parser, Debug)]
#[command(name = "xdeployctl", version, about = "XDeployment composition function host")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Seconds the caller may cache a response for
    #[arg(long = "ttl", env = "XDEPLOY_TTL", global = true, default_value_t = 60)]
    ttl: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check the composable kinds and print them
    Validate,
    /// Run the function once against a request file (JSON or YAML)
    Run {
        /// Path to the request, or "-" for stdin
        #[arg(long = "request", short = 'r', default_value = "-")]
        request: String,
    },
    /// Answer newline-delimited JSON requests on stdin until EOF or Ctrl-C
    Serve {
        /// Prometheus exporter listen address, e.g. 127.0.0.1:9464
        #[arg(long = "metrics-addr", env = "XDEPLOY_METRICS_ADDR")]
        metrics_addr: Option<String>,
    },
}

fn init_tracing() {
    let env = std::env::var("XDEPLOY_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // stdout carries responses
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics(addr: Option<&str>) {
    let Some(addr) = addr else { return };
    if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
        match builder.with_http_listener(sock).install() {
            Ok(_) => info!(addr = %addr, "Prometheus metrics exporter listening"),
            Err(e) => warn!(error = %e, "failed to install metrics exporter"),
        }
    } else {
        warn!(addr = %addr, "invalid XDEPLOY_METRICS_ADDR; expected host:port");
    }
}

/// JSON first, then YAML (a superset, but with worse error messages for JSON input).
fn parse_request(raw: &str) -> Result<RunFunctionRequest> {
    match serde_json::from_str(raw) {
        Ok(req) => Ok(req),
        Err(json_err) => serde_yaml::from_str(raw)
            .with_context(|| format!("request is neither valid JSON ({}) nor YAML", json_err)),
    }
}

async fn read_request(path: &str) -> Result<String> {
    if path == "-" {
        let mut buf = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut tokio::io::stdin(), &mut buf)
            .await
            .context("reading request from stdin")?;
        Ok(buf)
    } else {
        tokio::fs::read_to_string(path).await.with_context(|| format!("reading request from {}", path))
    }
}

/// Response for a line that never became a request: no tag to echo, one fatal result.
fn malformed_line_response(err: serde_json::Error, ttl: Duration) -> RunFunctionResponse {
    let mut rsp = RunFunctionResponse { meta: ResponseMeta { tag: String::new(), ttl }, ..Default::default() };
    let err = anyhow::Error::new(err).context("cannot decode request");
    rsp.fatal(&*err);
    rsp
}

fn print_response(rsp: &RunFunctionResponse, output: Output) -> Result<()> {
    match output {
        Output::Json => println!("{}", serde_json::to_string_pretty(rsp)?),
        Output::Human => {
            match &rsp.desired {
                Some(desired) => {
                    println!("DESIRED ({})", desired.resources.len());
                    for (name, r) in &desired.resources {
                        let kind = r.resource.get("kind").and_then(|k| k.as_str()).unwrap_or("-");
                        println!("  {:<40} {:<12} ready={:?}", name, kind, r.ready);
                    }
                }
                None => println!("DESIRED (none)"),
            }
            if !rsp.conditions.is_empty() {
                println!("CONDITIONS");
                for c in &rsp.conditions {
                    let status = match c.status {
                        Status::True => "True",
                        Status::False => "False",
                        Status::Unknown => "Unknown",
                    };
                    println!("  {:<16} {:<6} {:<18} {}", c.type_, status, c.reason, c.message.as_deref().unwrap_or(""));
                }
            }
            for r in &rsp.results {
                let sev = match r.severity {
                    Severity::Fatal => "FATAL",
                    Severity::Warning => "WARN",
                    Severity::Normal => "INFO",
                };
                println!("{}: {}", sev, r.message);
            }
        }
    }
    Ok(())
}

async fn serve(function: &Function, ttl: Duration) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut served: u64 = 0;
    info!("serving requests on stdin");
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!(served, "received Ctrl-C; shutting down");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    info!(served, "stdin closed; shutting down");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let rsp = match serde_json::from_str::<RunFunctionRequest>(&line) {
                    Ok(req) => function.run_function(&req),
                    Err(e) => {
                        warn!(error = %e, "malformed request line");
                        malformed_line_response(e, ttl)
                    }
                };
                let mut out = serde_json::to_vec(&rsp)?;
                out.push(b'\n');
                stdout.write_all(&out).await?;
                stdout.flush().await?;
                served += 1;
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let ttl = Duration::from_secs(cli.ttl);
    let function = Function::new().context("building composition scheme")?.with_ttl(ttl);

    match cli.command {
        Commands::Validate => {
            let keys = function.scheme().keys();
            match cli.output {
                Output::Json => println!("{}", serde_json::to_string_pretty(&keys)?),
                Output::Human => {
                    println!("KINDS ({})", keys.len());
                    for k in keys {
                        println!("  {}", k);
                    }
                }
            }
        }
        Commands::Run { request } => {
            let raw = read_request(&request).await?;
            let req = parse_request(&raw)?;
            let rsp = function.run_function(&req);
            print_response(&rsp, cli.output)?;
            if rsp.is_fatal() {
                error!(tag = %rsp.meta.tag, "function returned a fatal result");
                std::process::exit(2);
            }
        }
        Commands::Serve { metrics_addr } => {
            init_metrics(metrics_addr.as_deref());
            serve(&function, ttl).await?;
        }
    }
    Ok(())
}
