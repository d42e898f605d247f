//! User-facing message templates.

/// Reply to `/start`.
pub const GREETING: &str = "Hi! Send /connect to link your chorewheel account with this chat.";

/// Reply to any unknown `/command`.
pub const NOT_UNDERSTOOD: &str = "Command not understood. Try another one!";

/// Sent to a chat identity once its connect code is redeemed.
pub const CONNECTED: &str = "Your chat is now connected. Task reminders will arrive here.";

/// Body of a manually triggered test notification.
pub const TEST_NOTIFICATION: &str = "This is a test notification. Reminders reach you here.";

const SHARED_HEADER: &str = "Shared tasks due today:";
const ASSIGNED_HEADER: &str = "You have the following assigned tasks due today:";

/// Digest of unassigned tasks for the whole group.
#[must_use]
pub fn shared_digest(titles: &[String], public_url: &str) -> String {
    digest(SHARED_HEADER, titles, public_url)
}

/// Digest of tasks assigned to one member.
#[must_use]
pub fn assigned_digest(titles: &[String], public_url: &str) -> String {
    digest(ASSIGNED_HEADER, titles, public_url)
}

fn digest(header: &str, titles: &[String], public_url: &str) -> String {
    let mut out = String::with_capacity(header.len() + public_url.len() + titles.len() * 32);
    out.push_str(header);
    out.push('\n');
    for title in titles {
        out.push_str("• ");
        out.push_str(title);
        out.push('\n');
    }
    out.push('\n');
    out.push_str(public_url);
    out
}

/// Broadcast sent to the group when a member completes a task.
#[must_use]
pub fn completion(actor_name: &str, title: &str) -> String {
    format!("{actor_name} just completed '{title}'")
}

/// Redemption link for a connect code.
#[must_use]
pub fn connect_link(public_url: &str, code: &str) -> String {
    format!("{}/telegram/connect/{code}", public_url.trim_end_matches('/'))
}

/// Reply to `/connect`.
#[must_use]
pub fn connect_instructions(public_url: &str, code: &str) -> String {
    format!(
        "To link this chat with your chorewheel account:\n\n\
         1. Log in at {} if you are not already\n\
         2. Open this link: {}",
        public_url.trim_end_matches('/'),
        connect_link(public_url, code)
    )
}
