//! Store key builders for every entry the session subsystem writes.
//!
//! Centralising key construction prevents typos and keeps the namespaces
//! of blacklist entries, family pointers, counters and codes disjoint.
//! Providers prepend their configured prefix.

use uuid::Uuid;

// ── Token keys ─────────────────────────────────────────────

/// Blacklist entry for a revoked token id.
pub fn blacklist(jti: &str) -> String {
    format!("blacklist:{jti}")
}

/// Current-token pointer (or terminal marker) of a refresh family.
pub fn family(family_id: Uuid) -> String {
    format!("family:{family_id}")
}

/// Id and expiry of the most recently issued access token of a user.
pub fn user_latest_access(user_id: Uuid) -> String {
    format!("user:{user_id}:latest_access")
}

/// Session epoch of a user; tokens stamped with an older epoch are dead.
pub fn user_epoch(user_id: Uuid) -> String {
    format!("user:{user_id}:epoch")
}

// ── Rate limiting ──────────────────────────────────────────

/// Counter for one rate-limit scope and caller key.
pub fn rate_limit(scope: &str, key: &str) -> String {
    format!("rate:{scope}:{key}")
}

// ── MFA / password reset ───────────────────────────────────

/// Outstanding email code of a user.
pub fn mfa_email_code(user_id: Uuid) -> String {
    format!("mfa:email:{user_id}")
}

/// Marker that a TOTP time step has already been accepted for a user.
pub fn totp_step_used(user_id: Uuid, step: u64) -> String {
    format!("mfa:totp_used:{user_id}:{step}")
}

/// Pending password reset ticket.
pub fn password_reset(reset_id: &str) -> String {
    format!("reset:{reset_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaces_are_disjoint() {
        let id = Uuid::nil();
        let keys = [
            blacklist("abc"),
            family(id),
            user_latest_access(id),
            user_epoch(id),
            rate_limit("login", "bob"),
            mfa_email_code(id),
            totp_step_used(id, 7),
            password_reset("r1"),
        ];
        for (i, a) in keys.iter().enumerate() {
            for b in keys.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
        assert_eq!(rate_limit("login", "bob"), "rate:login:bob");
    }
}
