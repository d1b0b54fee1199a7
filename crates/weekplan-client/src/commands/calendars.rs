//! `weekplan calendars`: list calendar collections.

use crate::commands::Session;
use crate::error::ClientResult;
use crate::render::render_calendars;

/// Lists the calendars below the configured URL, or those of every
/// principal when `all` is set.
pub async fn run(session: &Session, all: bool) -> ClientResult<()> {
    let calendars = if all {
        session.service.discover_all_calendars(&session.conn).await?
    } else {
        session.service.discover_calendars(&session.conn).await?
    };

    if calendars.is_empty() {
        println!("No calendars found.");
    } else {
        println!("{}", render_calendars(&calendars));
    }
    Ok(())
}
