//! Identity resolution at connect time.
//!
//! Token verification belongs to an external service; the server only
//! consumes it through [`Authenticator`]. A missing or rejected token falls
//! back to an anonymous identity that lives as long as the connection.

use log::warn;
use std::collections::HashMap;
use std::fmt;
use url::form_urlencoded;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityKind {
    /// Issued by the authenticator; reconnects resolve to the same session.
    Durable,
    /// Scoped to one connection, never reconnectable.
    Anonymous,
    /// A supervised computer opponent.
    Bot,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    key: String,
    kind: IdentityKind,
}

impl Identity {
    pub fn durable(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: IdentityKind::Durable,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            key: format!("anon-{}", Uuid::new_v4().simple()),
            kind: IdentityKind::Anonymous,
        }
    }

    pub fn bot() -> Self {
        Self {
            key: format!("bot-{}", Uuid::new_v4().simple()),
            kind: IdentityKind::Bot,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> IdentityKind {
        self.kind
    }

    pub fn is_anonymous(&self) -> bool {
        self.kind == IdentityKind::Anonymous
    }

    pub fn is_bot(&self) -> bool {
        self.kind == IdentityKind::Bot
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub identity: Identity,
    pub display_name: String,
}

impl AuthenticatedUser {
    pub fn anonymous() -> Self {
        let identity = Identity::anonymous();
        let display_name = format!("Guest-{}", &identity.key()[5..9]);
        Self {
            identity,
            display_name,
        }
    }
}

/// Verifies a connect token and yields a stable identity.
pub trait Authenticator: Send + Sync {
    fn verify(&self, token: &str) -> Option<AuthenticatedUser>;
}

/// Fixed token table, configured from the command line.
#[derive(Debug, Default, Clone)]
pub struct StaticTokens {
    tokens: HashMap<String, (String, String)>,
}

impl StaticTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        token: impl Into<String>,
        user: impl Into<String>,
        display_name: impl Into<String>,
    ) {
        self.tokens
            .insert(token.into(), (user.into(), display_name.into()));
    }

    /// Parses `TOKEN=USER` or `TOKEN=USER:Display Name` entries.
    pub fn from_entries<S: AsRef<str>>(entries: &[S]) -> Result<Self, String> {
        let mut table = Self::new();
        for entry in entries {
            let entry = entry.as_ref();
            let (token, rest) = entry
                .split_once('=')
                .ok_or_else(|| format!("expected TOKEN=USER, got '{}'", entry))?;
            let (user, display) = match rest.split_once(':') {
                Some((user, display)) => (user, display),
                None => (rest, rest),
            };
            if token.is_empty() || user.is_empty() {
                return Err(format!("empty token or user in '{}'", entry));
            }
            if user.starts_with("anon-") || user.starts_with("bot-") {
                return Err(format!("user '{}' uses a reserved prefix", user));
            }
            table.insert(token, user, display);
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Authenticator for StaticTokens {
    fn verify(&self, token: &str) -> Option<AuthenticatedUser> {
        self.tokens
            .get(token)
            .map(|(user, display)| AuthenticatedUser {
                identity: Identity::durable(user.clone()),
                display_name: display.clone(),
            })
    }
}

/// Resolves the connecting user, falling back to an anonymous identity.
pub fn authenticate(authenticator: &dyn Authenticator, token: Option<&str>) -> AuthenticatedUser {
    match token {
        Some(token) if !token.is_empty() => match authenticator.verify(token) {
            Some(user) => user,
            None => {
                warn!("Rejected connect token, continuing anonymously");
                AuthenticatedUser::anonymous()
            }
        },
        _ => AuthenticatedUser::anonymous(),
    }
}

/// Extracts and percent-decodes `name` from a raw query string such as
/// `token=abc&x=1`.
pub fn query_param(query: &str, name: &str) -> Option<String> {
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> StaticTokens {
        StaticTokens::from_entries(&["s3cret=alice:Alice A", "t0ken=bob"]).unwrap()
    }

    #[test]
    fn test_static_tokens_resolve_durable_identity() {
        let user = table().verify("s3cret").unwrap();
        assert_eq!(user.identity, Identity::durable("alice"));
        assert_eq!(user.display_name, "Alice A");
        assert_eq!(user.identity.kind(), IdentityKind::Durable);

        let bob = table().verify("t0ken").unwrap();
        assert_eq!(bob.display_name, "bob");
    }

    #[test]
    fn test_bad_specs_rejected() {
        assert!(StaticTokens::from_entries(&["missing-separator"]).is_err());
        assert!(StaticTokens::from_entries(&["=alice"]).is_err());
        assert!(StaticTokens::from_entries(&["x=bot-1"]).is_err());
    }

    #[test]
    fn test_authenticate_falls_back_to_anonymous() {
        let auth = table();
        let user = authenticate(&auth, Some("wrong"));
        assert!(user.identity.is_anonymous());
        assert!(user.display_name.starts_with("Guest-"));

        let none = authenticate(&auth, None);
        assert!(none.identity.is_anonymous());
        assert_ne!(none.identity, user.identity);

        let alice = authenticate(&auth, Some("s3cret"));
        assert_eq!(alice.identity.key(), "alice");
    }

    #[test]
    fn test_bot_identities_are_unique() {
        let a = Identity::bot();
        let b = Identity::bot();
        assert!(a.is_bot());
        assert!(a.key().starts_with("bot-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_query_param() {
        assert_eq!(query_param("token=abc&game=1", "token").as_deref(), Some("abc"));
        assert_eq!(query_param("game=1&token=xyz", "token").as_deref(), Some("xyz"));
        assert_eq!(query_param("game=1", "token"), None);
        assert_eq!(query_param("", "token"), None);
    }

    #[test]
    fn test_query_param_percent_decodes() {
        let token = query_param("token=k%2B%2F9%3D%3D", "token");
        assert_eq!(token.as_deref(), Some("k+/9=="));
        assert_eq!(query_param("token=a+b", "token").as_deref(), Some("a b"));

        let mut auth = table();
        auth.insert("k+/9==", "carol", "Carol");
        let user = authenticate(&auth, token.as_deref());
        assert_eq!(user.identity, Identity::durable("carol"));
        assert!(!user.identity.is_anonymous());
    }
}
