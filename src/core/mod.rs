/// Core abstractions shared by the health tracker, topology cache and executor
pub mod clock;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};

use std::fmt;

/// Credentials an endpoint presents to its node
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic { username: String, password: String },
    ApiKey(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::ApiKey(_) => f.debug_tuple("ApiKey").field(&"<redacted>").finish(),
        }
    }
}

/// One reachable node (primary or secondary)
///
/// Health is tracked by address only: two endpoints sharing an address but
/// carrying different credentials map to the same failure record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    address: String,
    credentials: Option<Credentials>,
}

impl Endpoint {
    pub fn new<S: Into<String>>(address: S) -> Self {
        Self {
            address: address.into(),
            credentials: None,
        }
    }

    pub fn with_basic_auth<U: Into<String>, P: Into<String>>(mut self, username: U, password: P) -> Self {
        self.credentials = Some(Credentials::Basic {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.credentials = Some(Credentials::ApiKey(api_key.into()));
        self
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Same address, credentials borrowed from `other`
    pub fn with_credentials_of(&self, other: &Endpoint) -> Self {
        Self {
            address: self.address.clone(),
            credentials: other.credentials.clone(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

/// Read/write classification of an operation; gates secondary eligibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Read,
    Write,
}

impl OperationKind {
    /// `GET` is a read, every other verb is a write
    pub fn from_method(method: &str) -> Self {
        if method.eq_ignore_ascii_case("GET") {
            OperationKind::Read
        } else {
            OperationKind::Write
        }
    }

    pub fn is_read(self) -> bool {
        matches!(self, OperationKind::Read)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Read => write!(f, "read"),
            OperationKind::Write => write!(f, "write"),
        }
    }
}
