use clap::Parser;
use reqrec::config::{Cli, Command, ReplayConfig, ReqArgs, ServerArgs, ServerConfig};
use reqrec::replay;
use std::io;
use std::process::ExitCode;
use tracing::{error, info};

fn main() -> ExitCode {
    let cli = Cli::parse();
    reqrec::logging::init(&cli.log_level);

    let result = match cli.command {
        Command::Server(args) => run_server(&args),
        Command::Req(args) => run_replay(&args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_server(args: &ServerArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_args(args)?;
    let save_dir = config.save_dir.clone();
    let listener = config.bind()?;

    let scheme = if listener.is_tls() { "HTTPS" } else { "HTTP" };
    info!("Starting {} server on '{}'", scheme, listener.local_addr()?);
    info!(
        "Requests save to '{}', file number start from {}",
        save_dir.display(),
        listener.handler().sequence().current() + 1
    );

    listener.run()?;
    Ok(())
}

fn run_replay(args: &ReqArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = ReplayConfig::from_args(args)?;
    let builder = config.builder();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    replay::replay_file(&config.record, &builder, &config.options, &mut out)?;
    Ok(())
}
