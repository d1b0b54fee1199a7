//! `weekplan week`: the availability grid.

use chrono::{NaiveDate, Utc};
use tracing::warn;
use weekplan_core::{User, week_start_of};

use crate::commands::Session;
use crate::error::ClientResult;
use crate::render::{render_grid, render_json};

/// Fetches the week containing `week` (today when `None`) for the given
/// principal hrefs and prints the grid.
///
/// Users whose events fail to load still get a row. The command only fails
/// when nobody could be loaded.
pub async fn run(
    session: &Session,
    user_hrefs: &[String],
    week: Option<NaiveDate>,
    json: bool,
) -> ClientResult<()> {
    let week_start = week_start_of(week.unwrap_or_else(|| Utc::now().date_naive()));

    let known = match session.service.discover_users(&session.conn).await {
        Ok(users) => users,
        Err(e) => {
            warn!(error = %e, "User discovery failed, showing hrefs instead of names");
            Vec::new()
        }
    };
    let users = match_users(&known, user_hrefs);

    let fetch = session
        .service
        .fetch_users_week(&session.conn, &users, week_start)
        .await;
    for (user, error) in fetch.errors() {
        eprintln!("warning: could not load events for {}: {}", user.display_name, error);
    }

    let rows = fetch.schedule_rows();
    let output = if json {
        render_json(&rows, week_start)?
    } else {
        render_grid(&rows, week_start)
    };
    println!("{}", output);

    if fetch.failed_users().len() == users.len() {
        if let Some(error) = fetch.outcomes.into_iter().find_map(|outcome| outcome.result.err()) {
            return Err(error.into());
        }
    }
    Ok(())
}

/// Pairs each requested href with a discovered user to get its display
/// name. Unknown hrefs become users named after their href; repeats are
/// dropped.
fn match_users(known: &[User], hrefs: &[String]) -> Vec<User> {
    let mut users: Vec<User> = Vec::with_capacity(hrefs.len());
    for href in hrefs {
        let user = known
            .iter()
            .find(|user| same_href(&user.href, href))
            .cloned()
            .unwrap_or_else(|| User::new(href.clone(), href.clone()));
        if !users.iter().any(|existing| same_href(&existing.href, &user.href)) {
            users.push(user);
        }
    }
    users
}

fn same_href(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}
