mod config;

use anyhow::Context;
use async_std::task;
use config::Config;
use hearth_core::prelude::*;
use slog::{crit, info, o, Drain, Logger};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

fn init() {
    dotenv::dotenv().unwrap_or_default();
}

fn make_logger() -> Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_envlogger::new(drain).fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, o!())
}

fn main() {
    init();
    let conf = Config::load();
    let logger = make_logger();
    info!(logger, "loaded config {:?}", conf);

    // the runtime reads this before spawning its executor threads
    if conf.enable_multithreading {
        let threads = if conf.threads_count > 0 {
            conf.threads_count
        } else {
            num_cpus::get().saturating_sub(1).max(1)
        };
        std::env::set_var("ASYNC_STD_THREAD_COUNT", threads.to_string());
        info!(logger, "using {} executor threads", threads);
    } else {
        std::env::set_var("ASYNC_STD_THREAD_COUNT", "1");
    }

    // fail early on a bad endpoint rather than inside the reconnect loop
    if conf.thermite_address.parse::<IpAddr>().is_err() {
        crit!(logger, "invalid edge address: {}", conf.thermite_address);
        std::process::exit(1);
    }

    let code = match task::block_on(run(conf, logger.clone())) {
        Ok(GameLoop::Shutdown) => {
            info!(logger, "shutting down...");
            0
        }
        Ok(GameLoop::Restart) => {
            info!(logger, "restart feature not implemented, shutting down...");
            0
        }
        Ok(GameLoop::Running) => {
            crit!(logger, "game loop exited while still running");
            1
        }
        Err(err) => {
            crit!(logger, "fatal: {:#}", err);
            1
        }
    };
    std::process::exit(code);
}

async fn run(conf: Config, logger: Logger) -> anyhow::Result<GameLoop> {
    let db = Db::open(&conf.db_name)
        .await
        .with_context(|| format!("open database {}", conf.db_name))?;
    db.ready().await.context("apply database schema")?;

    let world = World::new(logger.clone());
    let (outbound_tx, outbound_rx) = async_std::channel::bounded(1024);
    let (events_tx, events_rx) = async_std::channel::bounded(1024);

    let mut core = Core::new(world, db, outbound_tx, events_rx);
    core.heartbeat_interval = conf.heartbeat_interval;
    hearth_core::commands::register_defaults(&mut core.commands)
        .context("register default commands")?;
    core.commands.expand();

    let mut systems = SystemRegistry::default();
    register_default_systems(&mut systems);

    info!(logger, "loading game database... please wait warmly...");
    let started = Instant::now();
    let count = core.load().await.context("load world")?;
    info!(
        logger,
        "database loaded in {:.3} seconds", started.elapsed().as_secs_f64();
        "objects" => count
    );

    let stop = Arc::new(AtomicBool::new(false));
    let manager = LinkManager::new(
        format!("ws://{}:{}", conf.thermite_address, conf.thermite_port),
        events_tx,
        outbound_rx,
        stop.clone(),
        logger.clone(),
    );
    let link_task = task::spawn(manager.run());

    let status = run_game(&mut core, &mut systems).await;

    stop.store(true, Ordering::SeqCst);
    link_task.cancel().await;

    // whatever the loop's fate, try to leave the store consistent
    if let Err(err) = core.flush_dirty().await {
        crit!(logger, "final flush failed: {}", err);
    }

    Ok(status.context("heartbeat failure")?)
}
