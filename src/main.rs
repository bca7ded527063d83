use acolyte::cli::{Cli, Command};
use acolyte::gui::NullPresenter;
use acolyte::install;
use acolyte::supervisor::Supervisor;
use clap::Parser;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn init_logging(verbose: bool, logfile: Option<&std::path::Path>) {
    let level = if verbose { "debug" } else { "info" };
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(level);
    if let Some(path) = logfile {
        if let Ok(file) = std::fs::File::create(path) {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
    }
    let _ = builder.try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.logfile.as_deref());

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        // Ctrl-C is the only interrupt path that needs explicit handling
        // here; the rest of the supervisor's suspension points (FIFO reads,
        // WaitForSingleObject) are bounded or already polling.
        let _ = ctrlc::set_handler(move || {
            log::info!("interrupt received, shutting down");
            interrupted.store(true, Ordering::SeqCst);
        });
    }

    let overrides = cli.overrides();
    let paths = match install::find_paths(&overrides) {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::from(1);
        }
    };

    let mut supervisor = Supervisor::new(
        paths,
        Box::new(NullPresenter),
        cli.logfile.clone(),
        Vec::new(),
        cli.forward_tokens(),
    );

    let result = match cli.command {
        None => supervisor.run_daemon(&interrupted).map(|_| ()),
        Some(Command::Store) => supervisor.store(),
        Some(Command::Switch { user }) => supervisor.switch(&user).map(|_| ()),
        Some(Command::Start { user }) => supervisor.start(&user, &[]).map(|_| ()),
        Some(Command::Shutdown) => supervisor.send_shutdown().map(|_| ()),
    };

    match result {
        Ok(()) => {
            if interrupted.load(Ordering::SeqCst) {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
