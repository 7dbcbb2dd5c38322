//! Turnstile session daemon.
//!
//! Hosts the online-session registry: restores the snapshot at startup,
//! sweeps expired sessions in the background and writes the snapshot back on
//! shutdown. The `verify` subcommand runs one login through the configured
//! pipeline.

mod app;
mod config;
mod logging;
mod metrics;

use std::{io::BufRead, net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Error};
use config::{Overrides, ServerConfig};
use log::info;
use pico_args::Arguments;
use turnstile::auth::{LoginRequest, LoginType};

const HELP: &str = "\
Run the turnstile session daemon

USAGE:
  ts_server [OPTIONS]
  ts_server [OPTIONS] verify USERNAME [--address IP] [--token] [--force]

OPTIONS:
  --accounts   PATH        Accounts JSON file          [default: env ACCOUNTS_FILE]
  --snapshot   PATH        Session snapshot file       [default: env SESSION_SNAPSHOT_PATH]
  --metrics    IP:PORT     Prometheus exporter address [default: env METRICS_BIND]

FLAGS:
  -h, --help               Print help information

VERIFY:
  Reads the password from the first line of stdin and prints the login result.
  --address    IP          Remote address of the attempt [default: 127.0.0.1]
  --token                  Log in with the token login type
  --force                  Log in even if the user is online elsewhere

ENVIRONMENT:
  LOCKOUT_THRESHOLD        Failures before an account is locked (0 disables)
  SESSION_TTL_SECS         Session idle timeout (0 disables)
  SESSION_API_KEY          Key required for session operations
  LDAP_ENABLED             Enable the directory authenticator
  (See .env.example for all configuration options)
";

struct Verify {
    username: String,
    address: String,
    token: bool,
    force: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let overrides = Overrides {
        accounts_file: pargs.opt_value_from_str::<_, PathBuf>("--accounts")?,
        snapshot_path: pargs.opt_value_from_str::<_, PathBuf>("--snapshot")?,
        metrics_bind: pargs.opt_value_from_str::<_, SocketAddr>("--metrics")?,
    };

    let verify = match pargs.subcommand()?.as_deref() {
        Some("verify") => Some(Verify {
            address: pargs
                .opt_value_from_str("--address")?
                .unwrap_or_else(|| "127.0.0.1".to_string()),
            token: pargs.contains("--token"),
            force: pargs.contains("--force"),
            username: pargs.free_from_str().context("verify needs a USERNAME")?,
        }),
        Some(other) => anyhow::bail!("Unknown command '{other}', see --help"),
        None => None,
    };

    logging::init();

    let config = ServerConfig::from_env(overrides)?;
    config.validate()?;

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(|e| anyhow::anyhow!(e))?;
        info!("Metrics exporter listening on {addr}");
    }

    let accounts = Arc::new(app::load_accounts(config.accounts_file.as_deref())?);
    let service = app::build_service(&config, accounts)?;

    if let Some(verify) = verify {
        return run_verify(&service, verify).await;
    }

    info!("Session daemon started");
    let sweeper = tokio::spawn(app::run_sweeper(
        service.sessions().clone(),
        config.sessions.sweep_interval,
    ));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to install CTRL+C signal handler")?;

    info!("Shutting down session daemon...");
    sweeper.abort();
    service
        .sessions()
        .store()
        .context("Failed to store session snapshot")?;

    Ok(())
}

async fn run_verify(service: &turnstile::LoginService, verify: Verify) -> Result<(), Error> {
    let mut password = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut password)
        .context("Failed to read password from stdin")?;
    let password = password.trim_end_matches(['\r', '\n']);

    let login_type = if verify.token {
        LoginType::Token
    } else {
        LoginType::None
    };
    let request = LoginRequest::new(verify.username.clone(), password, verify.address.clone())
        .with_login_type(login_type)
        .with_force_login(if verify.force { "on" } else { "" });

    match service.login(request).await {
        Ok(result) => {
            metrics::login_attempts_total(true);
            println!("{}", serde_json::to_string_pretty(&result)?);
            service
                .sessions()
                .store()
                .context("Failed to store session snapshot")?;
            Ok(())
        }
        Err(e) => {
            metrics::login_attempts_total(false);
            logging::log_security_event(
                "login_failed",
                Some(&verify.username),
                Some(&verify.address),
                &e.to_string(),
            );
            anyhow::bail!(e.client_message())
        }
    }
}
