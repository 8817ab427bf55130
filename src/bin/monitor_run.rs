//! Sample a shell command on a host for the lifetime of a task runner scope.
//!
//! ```text
//! monitor-run [--config FILE] [--host [USER@]HOST] -- COMMAND...
//! ```
//!
//! Runs locally unless `--host` is given. Stops at Ctrl+C, or once the
//! configured bounds allow it, then prints one line per sample to stdout.
//! Tracing output goes to stderr.

use monitor_runner::device::{
    DeviceCredentials, LocalShell, RemoteDevice, ShellCommand, ShellConnection,
};
use monitor_runner::{CommandMonitor, MonitorConfig, RunnerError};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, PartialEq, Eq)]
struct Args {
    config: Option<PathBuf>,
    host: Option<String>,
    command: String,
}

fn parse_args(argv: &[String]) -> monitor_runner::Result<Option<Args>> {
    let mut config = None;
    let mut host = None;
    let mut iter = argv.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = iter.next().ok_or_else(|| {
                    RunnerError::Config("--config requires a file path".to_owned())
                })?;
                config = Some(PathBuf::from(path));
            }
            "--host" => {
                let dest = iter.next().ok_or_else(|| {
                    RunnerError::Config("--host requires [user@]host".to_owned())
                })?;
                host = Some(dest.clone());
            }
            "help" | "--help" | "-h" => return Ok(None),
            "--" => break,
            other => {
                return Err(RunnerError::Config(format!(
                    "unknown argument `{other}` (command goes after `--`)"
                )));
            }
        }
    }

    let command: Vec<&str> = iter.map(String::as_str).collect();
    if command.is_empty() {
        return Ok(None);
    }

    Ok(Some(Args {
        config,
        host,
        command: command.join(" "),
    }))
}

fn print_usage() {
    println!("usage: monitor-run [--config FILE] [--host [USER@]HOST] -- COMMAND...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("monitor_runner=info")),
        )
        .init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let Some(args) = parse_args(&argv)? else {
        print_usage();
        return Ok(());
    };

    let config = match &args.config {
        Some(path) => MonitorConfig::from_file(path)?,
        None => MonitorConfig::default(),
    };
    let command = ShellCommand::new(args.command);

    match args.host {
        Some(dest) => {
            let device =
                RemoteDevice::connect_ssh(DeviceCredentials::parse_destination(&dest)).await?;
            run(device, command, &config).await
        }
        None => {
            let device =
                RemoteDevice::with_connection(DeviceCredentials::new("localhost"), LocalShell);
            run(device, command, &config).await
        }
    }
}

async fn run<C: ShellConnection + 'static>(
    device: RemoteDevice<C>,
    command: ShellCommand,
    config: &MonitorConfig,
) -> anyhow::Result<()> {
    let monitor = CommandMonitor::new(Arc::new(device), command)
        .with_interval(config.interval()?)
        .with_fail_fast(config.fail_fast)
        .with_max_samples(config.max_samples);
    let mut runner = monitor.runner(config.runner)?;
    let window = runner.timeout().max(runner.at_least());

    runner
        .scope(|handle| async move {
            if window.is_zero() {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("received Ctrl+C, finishing monitor");
                }
                handle.done();
            } else {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("received Ctrl+C, finishing monitor");
                        handle.done();
                    }
                    _ = tokio::time::sleep(window) => {}
                }
            }
            Ok::<(), RunnerError>(())
        })
        .await?;

    for sample in monitor.samples() {
        let offset = sample.offset.as_secs_f64();
        match sample.result {
            Ok(output) => println!(
                "{offset:>9.3}s\tstatus={:?}\t{}",
                output.status,
                output.stdout.trim_end()
            ),
            Err(message) => println!("{offset:>9.3}s\terror\t{message}"),
        }
    }
    Ok(())
}
