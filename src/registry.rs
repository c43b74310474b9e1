//! Named org sessions resolved once at startup.
//!
//! The registry is built in one pass over the configured connection names.
//! Any failed resolution aborts the build, so a registry value always holds a
//! session for every configured name. After construction it is read-only and
//! shared through `Arc`.

use std::collections::BTreeMap;

use tracing::{error, info};

use crate::config::BrokerConfig;
use crate::error::AppError;
use crate::salesforce::broker::BrokerClient;
use crate::salesforce::session::Session;

#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    sessions: BTreeMap<String, Session>,
}

impl ConnectionRegistry {
    /// Resolves every configured connection through the broker.
    ///
    /// # Errors
    ///
    /// `AppError::Configuration` when no connection names are configured, or
    /// `AppError::ConnectionInit` naming the first connection that failed.
    pub async fn initialize(
        config: &BrokerConfig,
        broker: &BrokerClient,
    ) -> Result<Self, AppError> {
        if config.connection_names.is_empty() {
            return Err(AppError::Configuration(
                "No connection names configured".to_string(),
            ));
        }

        info!(
            "[REGISTRY] Initializing {} connection(s)",
            config.connection_names.len()
        );

        let mut sessions = BTreeMap::new();
        for name in &config.connection_names {
            let name = name.trim();
            if name.is_empty() || sessions.contains_key(name) {
                continue;
            }

            let session = broker.resolve(name).await.map_err(|e| {
                error!("[REGISTRY] Failed to initialize connection '{}': {}", name, e);
                AppError::connection_init(name, e)
            })?;

            info!("[REGISTRY] Connection '{}' ready", name);
            sessions.insert(name.to_string(), session);
        }

        Ok(Self { sessions })
    }

    /// Builds a registry from already resolved sessions.
    pub fn from_sessions<I>(sessions: I) -> Self
    where
        I: IntoIterator<Item = (String, Session)>,
    {
        Self {
            sessions: sessions.into_iter().collect(),
        }
    }

    /// # Errors
    ///
    /// `AppError::UnknownConnection` if `name` was not configured.
    pub fn get(&self, name: &str) -> Result<&Session, AppError> {
        self.sessions
            .get(name)
            .ok_or_else(|| AppError::UnknownConnection(name.to_string()))
    }

    /// Owned snapshot of every session, ordered by name.
    pub fn list(&self) -> BTreeMap<String, Session> {
        self.sessions.clone()
    }

    /// Iterates sessions in name order without copying.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Session)> {
        self.sessions.iter().map(|(name, s)| (name.as_str(), s))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sessions.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.sessions.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn broker_config(uri: &str, names: &[&str]) -> BrokerConfig {
        BrokerConfig {
            base_url: Url::parse(uri).unwrap(),
            token: SecretString::from("broker-token".to_string()),
            app_id: "app-1234".to_string(),
            connection_names: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    async fn mount_authorization(server: &MockServer, name: &str, instance: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/authorizations/{}", name)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "org": {
                    "instance_url": instance,
                    "api_version": "v61.0",
                    "user_auth": { "access_token": format!("{}-token", name) }
                }
            })))
            .mount(server)
            .await;
    }

    async fn init(server: &MockServer, names: &[&str]) -> Result<ConnectionRegistry, AppError> {
        let config = broker_config(&server.uri(), names);
        let broker = BrokerClient::new(reqwest::Client::new(), &config);
        ConnectionRegistry::initialize(&config, &broker).await
    }

    #[tokio::test]
    async fn initialize_resolves_every_connection() {
        let server = MockServer::start().await;
        mount_authorization(&server, "orgA", "https://a.my.salesforce.com").await;
        mount_authorization(&server, "orgB", "https://b.my.salesforce.com/").await;

        let registry = init(&server, &["orgA", "orgB"]).await.unwrap();

        assert_eq!(registry.names(), vec!["orgA", "orgB"]);
        for name in ["orgA", "orgB"] {
            let session = registry.get(name).unwrap();
            assert!(session
                .service_endpoint()
                .as_str()
                .ends_with("/services/Soap/u/61.0"));
        }
        assert_eq!(
            registry.get("orgB").unwrap().service_endpoint().as_str(),
            "https://b.my.salesforce.com/services/Soap/u/61.0"
        );
    }

    #[tokio::test]
    async fn initialize_fails_as_a_whole_and_names_connection() {
        let server = MockServer::start().await;
        mount_authorization(&server, "orgA", "https://a.my.salesforce.com").await;
        Mock::given(method("GET"))
            .and(path("/authorizations/orgB"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let error = init(&server, &["orgA", "orgB"]).await.unwrap_err();

        match &error {
            AppError::ConnectionInit { connection, source } => {
                assert_eq!(connection, "orgB");
                assert!(matches!(**source, AppError::BrokerUnavailable(_)));
            }
            other => panic!("expected ConnectionInit, got {:?}", other),
        }
        assert_eq!(
            error.to_string(),
            "Failed to initialize connection for: orgB"
        );
    }

    #[tokio::test]
    async fn duplicate_names_resolve_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/authorizations/orgA"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "org": {
                    "instance_url": "https://a.my.salesforce.com",
                    "api_version": "62.0",
                    "user_auth": { "access_token": "t" }
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let registry = init(&server, &["orgA", "orgA"]).await.unwrap();

        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn empty_name_list_is_configuration_error() {
        let server = MockServer::start().await;

        let result = init(&server, &[]).await;

        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn get_unknown_connection() {
        let registry = ConnectionRegistry::default();

        match registry.get("nope") {
            Err(e @ AppError::UnknownConnection(_)) => {
                assert_eq!(e.to_string(), "No Salesforce connection found for: nope")
            }
            other => panic!("expected UnknownConnection, got {:?}", other),
        }
    }

    #[test]
    fn list_returns_independent_copy() {
        let session = Session::new(
            "https://a.my.salesforce.com",
            "62.0",
            SecretString::from("t".to_string()),
        )
        .unwrap();
        let registry = ConnectionRegistry::from_sessions([("orgA".to_string(), session)]);

        let mut snapshot = registry.list();
        snapshot.remove("orgA");
        snapshot.insert(
            "orgZ".to_string(),
            Session::new("https://z.example", "1.0", SecretString::from("z".to_string())).unwrap(),
        );

        assert!(registry.get("orgA").is_ok());
        assert!(!registry.contains("orgZ"));
        assert_eq!(registry.len(), 1);
    }
}
