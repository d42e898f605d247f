//! Assignee rotation for rotating tasks.

use crate::store::AccountId;

/// Result of resolving the next assignee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rotation {
    /// Member who holds the task after this completion.
    pub next: AccountId,
    /// `false` when the holder of record was no longer in the member list and
    /// rotation restarted from the first member.
    pub holder_was_member: bool,
}

/// Compute who takes over a rotating task after `completed_by` finishes it.
///
/// The holder of record is `current`, or the completer when nobody is
/// assigned. The result is the member after the holder in `members`,
/// wrapping to the first member. A holder that left the group restarts the
/// rotation at the first member. Returns `None` for an empty member list.
#[must_use]
pub fn next_assignee(
    current: Option<&AccountId>,
    members: &[AccountId],
    completed_by: &AccountId,
) -> Option<Rotation> {
    let first = members.first()?;
    let holder = current.unwrap_or(completed_by);

    let Some(position) = members.iter().position(|m| m == holder) else {
        return Some(Rotation {
            next: first.clone(),
            holder_was_member: false,
        });
    };

    let next = members.get(position + 1).unwrap_or(first);
    Some(Rotation {
        next: next.clone(),
        holder_was_member: true,
    })
}
