use taskboard::client::submitter::Submitter;
use taskboard::datapack::types::RelayConfig;
use taskboard::request::generator::RequestGenerator;
use taskboard::space::handlers::router;
use taskboard::space::http::HttpSpace;
use taskboard::space::memory::MemorySpace;
use taskboard::space::types::Space;
use taskboard::worker::dispatcher::{Worker, WorkerConfig};
use taskboard::worker::registry::TaskRegistry;
use taskboard::worker::shell::ShellExecutor;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        usage(&args[0]);
        std::process::exit(1);
    }

    match args[1].as_str() {
        "space" => run_space(&args[2..]).await,
        "worker" => run_worker(&args[2..]).await,
        "submit" => run_submit(&args[2..]).await,
        _ => {
            usage(&args[0]);
            std::process::exit(1);
        }
    }
}

fn usage(program: &str) {
    eprintln!("Usage:");
    eprintln!("  {} space --bind <addr:port>", program);
    eprintln!(
        "  {} worker --space <url> [--name <name>] [--staging <dir>] [--scripts <dir>] [--relay-dir <dir> --relay-url <url>]",
        program
    );
    eprintln!(
        "  {} submit --space <url> [--submitter <name>] [--allow-prompt] (--script <file> | <target> <task> [params...])",
        program
    );
    eprintln!("Example: {} space --bind 127.0.0.1:6000", program);
    eprintln!(
        "Example: {} worker --space http://127.0.0.1:6000 --scripts ./scripts",
        program
    );
    eprintln!(
        "Example: {} submit --space http://127.0.0.1:6000 Kappa stats comwest",
        program
    );
}

/// Serves a shared board over HTTP.
async fn run_space(args: &[String]) -> anyhow::Result<()> {
    let mut bind_addr: Option<SocketAddr> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" => {
                bind_addr = Some(args[i + 1].parse()?);
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    let bind_addr = bind_addr.expect("--bind is required");
    let space = MemorySpace::new();

    // Periodic board size report
    let reporter = space.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(10));
        loop {
            interval.tick().await;
            tracing::info!("Board holds {} live entries", reporter.len());
        }
    });

    tracing::info!("Board server listening on {}", bind_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, router(space)).await?;

    Ok(())
}

/// Runs one worker loop against a remote board.
async fn run_worker(args: &[String]) -> anyhow::Result<()> {
    let mut space_url: Option<String> = None;
    let mut config = WorkerConfig::default();
    let mut script_dirs: Vec<PathBuf> = Vec::new();
    let mut relay_dir: Option<PathBuf> = None;
    let mut relay_url: Option<String> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--space" => {
                space_url = Some(args[i + 1].clone());
                i += 2;
            }
            "--name" => {
                config.name = args[i + 1].clone();
                i += 2;
            }
            "--staging" => {
                config.staging_root = PathBuf::from(&args[i + 1]);
                i += 2;
            }
            "--scripts" => {
                script_dirs.push(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--relay-dir" => {
                relay_dir = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--relay-url" => {
                relay_url = Some(args[i + 1].clone());
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    let space_url = space_url.expect("--space is required");
    config.relay = match (relay_dir, relay_url) {
        (Some(dir), Some(base_url)) => Some(RelayConfig { dir, base_url }),
        (None, None) => None,
        _ => anyhow::bail!("--relay-dir and --relay-url must be given together"),
    };

    let space: Arc<dyn Space> = Arc::new(HttpSpace::new(&space_url));
    let registry = TaskRegistry::new();

    // Built-in diagnostic task answered in-process
    registry.register("taskboard", "echo", |request| async move {
        let id = request
            .id
            .clone()
            .ok_or_else(|| anyhow::anyhow!("request carries no id"))?;
        let mut reply = taskboard::space::types::Reply::new(id);
        reply.messages.push(request.params.join(" "));
        Ok(reply)
    });

    let worker = Worker::new(
        space,
        registry,
        ShellExecutor::new(script_dirs),
        config,
    );
    tracing::info!("Worker {} attached to {}", worker.name(), space_url);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Periodic progress report
    let stats_worker = worker.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(10));
        loop {
            interval.tick().await;
            tracing::info!("Served {} request(s) so far", stats_worker.served());
        }
    });

    let runner = tokio::spawn(worker.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    let _ = shutdown_tx.send(true);
    runner.await??;

    Ok(())
}

/// Submits a script or an inline command and reports per-worker statistics.
async fn run_submit(args: &[String]) -> anyhow::Result<()> {
    let mut space_url: Option<String> = None;
    let mut submitter_name = format!("client-{}", uuid::Uuid::new_v4());
    let mut script: Option<PathBuf> = None;
    let mut allow_prompt = false;
    let mut inline: Vec<String> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--space" => {
                space_url = Some(args[i + 1].clone());
                i += 2;
            }
            "--submitter" => {
                submitter_name = args[i + 1].clone();
                i += 2;
            }
            "--script" => {
                script = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--allow-prompt" => {
                allow_prompt = true;
                i += 1;
            }
            other => {
                inline.push(other.to_string());
                i += 1;
            }
        }
    }

    let space_url = space_url.expect("--space is required");
    let space: Arc<dyn Space> = Arc::new(HttpSpace::new(&space_url));

    let mut generator = match script {
        Some(path) => RequestGenerator::from_script(&submitter_name, &path)?,
        None => RequestGenerator::from_args(&submitter_name, &inline)?,
    };
    if allow_prompt {
        generator = generator.allow_prompt();
    }

    let mut submitter = Submitter::new(space, &submitter_name);
    let replies = submitter.run(&mut generator).await?;

    for reply in &replies {
        for message in &reply.messages {
            println!("{}: {}", reply.id, message);
        }
        if let Some(results) = &reply.results {
            for (key, value) in results {
                println!("{}: {} = {}", reply.id, key, value);
            }
        }
    }

    let table = submitter.jobs().complete_stats();
    tracing::info!(
        "Jobs complete: {} completed, {} in progress, {} waiting",
        table.global.completed,
        table.global.in_progress,
        table.global.waiting
    );
    for (worker, stats) in &table.per_worker {
        tracing::info!("  - {} completed {} job(s)", worker, stats.completed);
    }

    Ok(())
}
