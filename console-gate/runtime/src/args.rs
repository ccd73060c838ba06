use crate::{
    backend::{self, Backend},
    core::ExclusionSet,
    shell::{self, Screen, Shell},
    Admin, Metrics,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use prometheus_client::registry::Registry;
use serde::Serialize;
use snfok_console_gate_core::{ListClusters, ValidateSession};
use std::{net::SocketAddr, sync::Arc};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::TcpListener,
    time::Duration,
};
use tracing::{error, info_span, Instrument};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[clap(
    name = "snfok-console-gate",
    about = "Resolves SNFOK console navigations through the session gate"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "snfok=info,warn",
        env = "SNFOK_CONSOLE_GATE_LOG"
    )]
    log_level: String,

    #[clap(long, value_enum, default_value = "plain")]
    log_format: LogFormat,

    /// Scheme and authority of the SNFOK backend.
    #[clap(long, env = "SNFOK_BACKEND_URL", default_value = "http://localhost:8080")]
    backend_url: String,

    #[clap(long, default_value = backend::DEFAULT_VALIDATE_PATH)]
    validate_path: String,

    #[clap(long, default_value = backend::DEFAULT_CLUSTERS_PATH)]
    clusters_path: String,

    /// Value of the `access_token` session cookie.
    #[clap(long, env = "SNFOK_ACCESS_TOKEN", hide_env_values = true)]
    session_cookie: Option<String>,

    /// The `meta.code` the registry reports when no cluster is registered.
    #[clap(long, default_value = "1004")]
    no_cluster_code: i64,

    /// Comma-separated routes that never require session validation.
    #[clap(long, default_value = "/login")]
    excluded_routes: ExclusionSet,

    #[clap(long, default_value = "/login")]
    login_route: String,

    #[clap(long, default_value = "/dashboard")]
    dashboard_route: String,

    /// Bounds every backend call. Elapsed calls count as failures.
    #[clap(long, default_value = "10000")]
    request_timeout_ms: u64,

    /// Serves `/ready`, `/live`, and `/metrics` when set.
    #[clap(long)]
    admin_addr: Option<SocketAddr>,

    #[clap(long, value_enum, default_value = "plain")]
    output: OutputFormat,

    /// Paths to navigate to, in order. When empty, paths are read from stdin,
    /// one per line.
    paths: Vec<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Plain,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Plain,
    Json,
}

/// One line of output per settled navigation.
#[derive(Debug, Serialize)]
struct Record<'a> {
    path: &'a str,
    #[serde(flatten)]
    screen: &'a Screen,
    clusters: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    notices: Vec<String>,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            backend_url,
            validate_path,
            clusters_path,
            session_cookie,
            no_cluster_code,
            excluded_routes,
            login_route,
            dashboard_route,
            request_timeout_ms,
            admin_addr,
            output,
            paths,
        } = self;

        init_log(&log_level, log_format)?;

        let backend = Backend::new(backend::Config {
            base_url: backend_url,
            validate_path,
            clusters_path,
            access_token: session_cookie,
            no_cluster_code,
        })
        .context("invalid backend configuration")?;
        let backend = Arc::new(backend);

        let mut prom = Registry::with_prefix("console_gate");
        let metrics = Metrics::register(&mut prom);

        let mut shell = Shell::new(
            shell::Config {
                exclusions: excluded_routes,
                login_route,
                dashboard_route,
                request_timeout: Duration::from_millis(request_timeout_ms),
            },
            backend.clone(),
            backend,
            metrics,
        );

        if let Some(addr) = admin_addr {
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind admin server on {addr}"))?;
            let admin = Admin::new(shell.readiness(), prom);
            tokio::spawn(
                async move {
                    if let Err(error) = admin.serve(listener).await {
                        error!(%error, "Admin server failed");
                    }
                }
                .instrument(info_span!("admin")),
            );
        }

        if !paths.is_empty() {
            for path in &paths {
                visit(&mut shell, path, output).await?;
            }
            return Ok(());
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let path = line.trim();
            if !path.is_empty() {
                visit(&mut shell, path, output).await?;
            }
        }
        Ok(())
    }
}

fn init_log(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(level).context("invalid log level")?;
    let logs = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Plain => logs.try_init(),
        LogFormat::Json => logs.json().try_init(),
    }
    .map_err(|error| anyhow::anyhow!("failed to initialize logging: {error}"))
}

/// Navigates, waits for the console to settle, and prints what it shows.
async fn visit<V, L>(shell: &mut Shell<V, L>, path: &str, output: OutputFormat) -> Result<()>
where
    V: ValidateSession + Send + Sync + 'static,
    L: ListClusters + Send + Sync + 'static,
{
    shell.navigate(path);
    let screen = shell.settle().await;

    let mut notices = Vec::new();
    while let Some(notice) = shell.dismiss_notice(0) {
        notices.push(notice.to_string());
    }
    let clusters = shell
        .resolver()
        .resolved()
        .map(|b| b.clusters().len())
        .unwrap_or_default();

    match output {
        OutputFormat::Plain => {
            println!("{path} => {screen}");
            for notice in &notices {
                println!("  notice: {notice}");
            }
        }
        OutputFormat::Json => {
            let record = Record {
                path,
                screen: &screen,
                clusters,
                notices,
            };
            println!("{}", serde_json::to_string(&record)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["snfok-console-gate", "/dashboard"]).unwrap();
        assert_eq!(args.backend_url, "http://localhost:8080");
        assert_eq!(args.validate_path, backend::DEFAULT_VALIDATE_PATH);
        assert_eq!(args.clusters_path, backend::DEFAULT_CLUSTERS_PATH);
        assert_eq!(args.no_cluster_code, 1004);
        assert_eq!(args.excluded_routes, ExclusionSet::default());
        assert_eq!(args.request_timeout_ms, 10_000);
        assert_eq!(args.output, OutputFormat::Plain);
        assert_eq!(args.paths, vec!["/dashboard".to_string()]);
    }

    #[test]
    fn parses_route_lists() {
        let args = Args::try_parse_from([
            "snfok-console-gate",
            "--excluded-routes",
            "/login,/register",
            "--output",
            "json",
            "/a",
            "/b",
        ])
        .unwrap();
        assert_eq!(
            args.excluded_routes,
            ExclusionSet::new(["/login", "/register"])
        );
        assert_eq!(args.output, OutputFormat::Json);
        assert_eq!(args.paths.len(), 2);
    }

    #[test]
    fn records_flatten_the_screen() {
        let screen = Screen::Dashboard(crate::core::View::Onboarding);
        let record = Record {
            path: "/dashboard",
            screen: &screen,
            clusters: 0,
            notices: vec![],
        };
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            serde_json::json!({
                "path": "/dashboard",
                "screen": "dashboard",
                "target": "onboarding",
                "clusters": 0,
            })
        );
    }
}
