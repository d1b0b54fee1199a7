//! `weekplan users`: list principals.

use crate::commands::Session;
use crate::error::ClientResult;
use crate::render::render_users;

/// Lists every user, or only those matching `search`.
pub async fn run(session: &Session, search: Option<&str>) -> ClientResult<()> {
    let users = match search {
        Some(term) => session.service.search_users(&session.conn, term).await?,
        None => session.service.discover_users(&session.conn).await?,
    };

    if users.is_empty() {
        println!("No users found.");
    } else {
        println!("{}", render_users(&users));
    }
    Ok(())
}
