use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// Process-scoped logout list. Injected as a capability so a deployment can
/// back it with an external store with real expiry instead.
pub trait TokenRevocation: Send + Sync + 'static {
    /// Marks a token revoked until its natural expiry.
    fn revoke(&self, token: &str, expires_at: DateTime<Utc>);

    fn is_revoked(&self, token: &str) -> bool;
}

/// In-memory revocation list. Entries are evicted once the token they cover
/// would have expired anyway, so the set stays bounded by the number of
/// logouts within one token lifetime.
#[derive(Default)]
pub struct InMemoryRevocation {
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl InMemoryRevocation {
    pub fn new() -> Self {
        Self::default()
    }

    fn prune(entries: &mut HashMap<String, DateTime<Utc>>, now: DateTime<Utc>) {
        entries.retain(|_, expires_at| *expires_at > now);
    }
}

impl TokenRevocation for InMemoryRevocation {
    fn revoke(&self, token: &str, expires_at: DateTime<Utc>) {
        let now = Utc::now();
        let mut entries = self.entries.lock().expect("revocation lock poisoned");
        Self::prune(&mut entries, now);
        if expires_at > now {
            entries.insert(token.to_string(), expires_at);
        }
    }

    fn is_revoked(&self, token: &str) -> bool {
        let now = Utc::now();
        let mut entries = self.entries.lock().expect("revocation lock poisoned");
        match entries.get(token) {
            Some(expires_at) if *expires_at > now => true,
            Some(_) => {
                entries.remove(token);
                false
            }
            None => false,
        }
    }
}
