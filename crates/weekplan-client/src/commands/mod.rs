//! Subcommand implementations.

pub mod calendars;
pub mod config;
pub mod users;
pub mod week;

use tracing::debug;
use weekplan_caldav::{CalDavService, ConnectionInfo};

use crate::cli::Cli;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// A ready-to-use service plus the credentials to send with every request.
pub struct Session {
    pub service: CalDavService,
    pub conn: ConnectionInfo,
}

/// Assembles the connection from CLI flags, falling back to the config
/// file for anything not given on the command line.
pub fn connect(cli: &Cli, config: &ClientConfig) -> ClientResult<Session> {
    let settings = &config.connection;

    let url = cli
        .url
        .clone()
        .or_else(|| settings.url.clone())
        .ok_or_else(|| {
            ClientError::Config(format!(
                "no server URL; pass --url or set connection.url in {}",
                ClientConfig::default_path().display()
            ))
        })?;
    let username = cli
        .username
        .clone()
        .or_else(|| settings.username.clone())
        .ok_or_else(|| {
            ClientError::Config("no username; pass --username or set connection.username".to_string())
        })?;
    let password = match cli.password.clone() {
        Some(password) => password,
        None => settings.resolve_password()?.ok_or_else(|| {
            ClientError::Config(
                "no password; pass --password, set WEEKPLAN_PASSWORD, \
                 or set connection.password to a `pass::` or `env::` reference"
                    .to_string(),
            )
        })?,
    };

    let conn = ConnectionInfo::new(url, username, password);
    conn.validate()?;

    let caldav_config = settings
        .caldav_config()
        .with_trust_all_certificates(cli.trust_all_certificates || settings.trust_all_certificates);
    let service = CalDavService::with_config(&caldav_config)?;

    debug!(?conn, "Connection assembled");
    Ok(Session { service, conn })
}
