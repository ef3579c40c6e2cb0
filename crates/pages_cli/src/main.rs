//! Pages service entry point.
//!
//! # Responsibility
//! - Load configuration, start logging and open the store.
//! - Arm the thing sweeper and serve the line protocol until stdin closes.
//!
//! Usage: `pages [config.json]`

mod session;

use log::{error, info};
use pages_api::PagesApiHandler;
use pages_core::{
    init_from_config, open_db, share, ActiveThings, PagesConfig, SweepConfig, ThingBridge,
    ThingSweeper,
};
use session::Session;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_exit module=cli status=error error={}", err);
            eprintln!("pages: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = PagesConfig::load(config_path.as_deref())?;
    init_from_config(&config)?;

    let conn = share(open_db(&config.db_location)?);
    let active = Arc::new(ActiveThings::new());
    let sweep_config = SweepConfig {
        initial_delay: config.sweep_initial_delay(),
        interval: config.sweep_interval(),
    };

    let mut session = Session::new(
        PagesApiHandler::new(Arc::clone(&conn), config.debug.clone()),
        ThingBridge::new(Arc::clone(&conn), Arc::clone(&active)),
        ThingSweeper::new(conn, active, sweep_config),
    );
    session.sweeper_mut().start()?;
    info!(
        "event=cli_start module=cli status=ok db={}",
        config.db_location.display()
    );

    let served = serve(&session).await;
    session.sweeper_mut().stop().await?;
    info!("event=cli_exit module=cli status=ok");
    served
}

async fn serve(session: &Session) -> Result<(), Box<dyn Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let Some(reply) = session.handle_line(&line) else {
            continue;
        };
        let mut encoded = serde_json::to_string(&reply)?;
        encoded.push('\n');
        stdout.write_all(encoded.as_bytes()).await?;
        stdout.flush().await?;
    }
    Ok(())
}
