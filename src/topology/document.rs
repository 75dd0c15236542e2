/// Replication destinations document as stored on the primary

use crate::core::{Credentials, Endpoint};
use crate::error::{RelevoError, RelevoResult};
use crate::utils::root_database_url;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReplicationDocument {
    #[serde(default)]
    pub destinations: Option<Vec<ReplicationDestination>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ReplicationDestination {
    pub url: Option<String>,
    pub client_visible_url: Option<String>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
    pub disabled: bool,
    pub ignored_client: bool,
}

impl ReplicationDocument {
    /// Parse a raw document; `None` when it carries no usable destination list
    ///
    /// An absent `Destinations` field, a null value, or a document that does
    /// not deserialize all mean "no replicas known" rather than an error.
    pub fn from_value(value: &Value) -> Option<Self> {
        Self::parse(value).unwrap_or_else(|e| {
            tracing::warn!("Ignoring replication destinations document: {}", e);
            None
        })
    }

    /// Strict parse: a destination list that does not deserialize is an error
    pub fn parse(value: &Value) -> RelevoResult<Option<Self>> {
        match value.get("Destinations") {
            None | Some(Value::Null) => return Ok(None),
            Some(_) => {}
        }
        serde_json::from_value::<ReplicationDocument>(value.clone())
            .map(Some)
            .map_err(|e| RelevoError::topology(format!("malformed destinations document: {}", e)))
    }

    /// Reachable destinations, in document order
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.destinations
            .iter()
            .flatten()
            .filter_map(ReplicationDestination::to_endpoint)
            .collect()
    }
}

impl ReplicationDestination {
    pub fn effective_url(&self) -> Option<&str> {
        let visible = self.client_visible_url.as_deref().filter(|u| !u.is_empty());
        visible.or_else(|| self.url.as_deref().filter(|u| !u.is_empty()))
    }

    /// Destinations without a URL are private (connection-string only) and
    /// cannot be reached from this client.
    pub fn to_endpoint(&self) -> Option<Endpoint> {
        if self.disabled || self.ignored_client {
            return None;
        }
        let url = self.effective_url()?;
        let address = match self.database.as_deref().filter(|d| !d.is_empty()) {
            Some(database) => format!("{}/databases/{}/", root_database_url(url), database),
            None => url.to_string(),
        };
        Some(Endpoint::new(address).with_credentials(self.credentials()))
    }

    fn credentials(&self) -> Option<Credentials> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            return Some(Credentials::ApiKey(key.to_string()));
        }
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(username), password) if !username.is_empty() => Some(Credentials::Basic {
                username: username.to_string(),
                password: password.unwrap_or_default().to_string(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_disabled_destination_is_dropped() {
        let value = json!({
            "Destinations": [
                { "Url": "http://disabled:8080", "Disabled": true },
                { "Url": "http://enabled:8080" }
            ]
        });
        let endpoints = ReplicationDocument::from_value(&value).unwrap().endpoints();
        assert_eq!(endpoints, vec![Endpoint::new("http://enabled:8080")]);
    }

    #[test]
    fn test_ignored_and_urlless_destinations_are_dropped() {
        let value = json!({
            "Destinations": [
                { "Url": "http://ignored:8080", "IgnoredClient": true },
                { "Url": "", "Database": "orders" },
                { "Database": "orders" },
                { "Url": "http://kept:8080" }
            ]
        });
        let endpoints = ReplicationDocument::from_value(&value).unwrap().endpoints();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].address(), "http://kept:8080");
    }

    #[test]
    fn test_client_visible_url_wins() {
        let value = json!({
            "Destinations": [
                { "Url": "http://internal:8080", "ClientVisibleUrl": "http://public:80" }
            ]
        });
        let endpoints = ReplicationDocument::from_value(&value).unwrap().endpoints();
        assert_eq!(endpoints[0].address(), "http://public:80");
    }

    #[test]
    fn test_database_name_is_composed_onto_root_url() {
        let value = json!({
            "Destinations": [
                { "Url": "http://replica:8080/", "Database": "orders" },
                { "Url": "http://replica:8081/databases/other", "Database": "orders" }
            ]
        });
        let endpoints = ReplicationDocument::from_value(&value).unwrap().endpoints();
        assert_eq!(endpoints[0].address(), "http://replica:8080/databases/orders/");
        assert_eq!(endpoints[1].address(), "http://replica:8081/databases/orders/");
    }

    #[test]
    fn test_destination_credentials() {
        let value = json!({
            "Destinations": [
                { "Url": "http://a:8080", "Username": "repl", "Password": "pw" },
                { "Url": "http://b:8080", "ApiKey": "key/secret" },
                { "Url": "http://c:8080" }
            ]
        });
        let endpoints = ReplicationDocument::from_value(&value).unwrap().endpoints();
        assert!(matches!(endpoints[0].credentials(), Some(Credentials::Basic { .. })));
        assert_eq!(
            endpoints[1].credentials(),
            Some(&Credentials::ApiKey("key/secret".to_string()))
        );
        assert!(!endpoints[2].has_credentials());
    }

    #[test]
    fn test_invalid_documents_mean_no_replicas() {
        assert!(ReplicationDocument::from_value(&json!({})).is_none());
        assert!(ReplicationDocument::from_value(&json!({ "Destinations": null })).is_none());
        assert!(ReplicationDocument::from_value(&json!({ "Destinations": "nope" })).is_none());
        assert!(ReplicationDocument::from_value(&json!("not an object")).is_none());
    }

    #[test]
    fn test_strict_parse_reports_malformed_list() {
        let error = ReplicationDocument::parse(&json!({ "Destinations": 42 })).unwrap_err();
        assert!(matches!(error, RelevoError::Topology { .. }));
        assert!(ReplicationDocument::parse(&json!({})).unwrap().is_none());
    }
}
