use crate::console;
use anyhow::{Context, Result};
use clap::Args;
use kbnav::{Authorizer, DenyAll, Navigator, StaticCredentials};
use kbnav_sheet::{DatasetWatcher, SheetDataset, WatcherConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::Interval;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Dataset file (.xlsx, .csv or .json)
    #[arg(short, long, env = "KBNAV_DATA", default_value = "data.xlsx")]
    pub data: PathBuf,

    /// Administrator user name
    #[arg(long, env = "KBNAV_ADMIN_USER")]
    pub admin_user: Option<String>,

    /// Administrator password
    #[arg(long, env = "KBNAV_ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,

    /// Do not reload when the dataset file changes on disk
    #[arg(long)]
    pub no_watch: bool,

    /// Fallback poll interval for the file watcher, in seconds
    #[arg(long, default_value_t = 5)]
    pub poll_secs: u64,

    /// Forget conversations idle for longer than this many seconds
    #[arg(long)]
    pub session_ttl_secs: Option<u64>,
}

pub fn run(args: ServeArgs) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(serve(args))
}

fn authorizer(user: Option<String>, password: Option<String>) -> Arc<dyn Authorizer> {
    match (user, password) {
        (Some(user), Some(password)) => Arc::new(StaticCredentials::new(user, password)),
        _ => {
            tracing::warn!("no administrator credentials configured, privileged commands disabled");
            Arc::new(DenyAll)
        }
    }
}

fn load(bot: &Navigator) {
    match bot.load_dataset() {
        Ok(Some(summary)) => {
            tracing::info!(nodes = summary.nodes, root = %summary.root, "dataset active")
        }
        Ok(None) if bot.tree_store().is_empty() => tracing::warn!("no dataset, serving without data"),
        Ok(None) => {}
        Err(e) => tracing::error!(error = %e, "dataset not loaded, keeping current data"),
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let dataset = SheetDataset::new(&args.data)
        .with_context(|| format!("Unsupported dataset file {:?}", args.data))?;
    let bot = Arc::new(Navigator::new(
        Arc::new(dataset),
        authorizer(args.admin_user, args.admin_password),
    ));
    load(&bot);

    let (change_tx, mut change_rx) = mpsc::channel::<()>(4);
    let watcher = if args.no_watch {
        drop(change_tx);
        None
    } else {
        let config = WatcherConfig {
            poll_interval: Duration::from_secs(args.poll_secs.max(1)),
            ..WatcherConfig::default()
        };
        let watcher = DatasetWatcher::new(args.data.clone(), Some(config));
        tracing::info!(path = %watcher.path().display(), "watching dataset file");
        Some(watcher.start(change_tx).await?)
    };

    let ttl = args.session_ttl_secs.map(|secs| Duration::from_secs(secs.max(1)));
    let mut sweep = ttl.map(|ttl| tokio::time::interval(ttl.min(Duration::from_secs(60))));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                let worker = bot.clone();
                let output = tokio::task::spawn_blocking(move || console::handle_line(&worker, &line)).await?;
                if let Some(output) = output {
                    println!("{}", output);
                }
            }

            Some(()) = change_rx.recv() => {
                tracing::info!(path = %args.data.display(), "dataset file changed");
                let worker = bot.clone();
                tokio::task::spawn_blocking(move || load(&worker)).await?;
            }

            _ = tick(&mut sweep) => {
                if let Some(ttl) = ttl.and_then(|t| chrono::Duration::from_std(t).ok()) {
                    bot.sessions().evict_idle(ttl);
                }
            }
        }
    }

    if let Some(handle) = watcher {
        handle.stop().await;
    }
    Ok(())
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}
