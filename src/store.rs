// Copyright 2026, Quartermaster Contributors
// SPDX-License-Identifier: Apache-2.0

//! Read/write access to the two cluster-resident resources backing all
//! settings. Writes are never retried here; optimistic-concurrency
//! violations surface to the caller as conflicts.

use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::{
    api::{ListParams, PostParams},
    Api, Client, ResourceExt,
};
use tracing::{debug, instrument};

use crate::error::{QuartermasterError, Result};

#[derive(Clone)]
pub struct CredentialStore {
    client: Client,
    namespace: String,
}

impl CredentialStore {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            client,
            namespace: namespace.to_string(),
        }
    }

    fn config_maps(&self) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn secrets(&self) -> Api<Secret> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    /// Fetch a ConfigMap, mapping 404 to None
    #[instrument(skip(self))]
    pub async fn get_config_map(&self, name: &str) -> Result<Option<ConfigMap>> {
        match self.config_maps().get(name).await {
            Ok(cm) => Ok(Some(cm)),
            Err(kube::Error::Api(err)) if err.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch a Secret, mapping 404 to None
    #[instrument(skip(self))]
    pub async fn get_secret(&self, name: &str) -> Result<Option<Secret>> {
        match self.secrets().get(name).await {
            Ok(secret) => Ok(Some(secret)),
            Err(kube::Error::Api(err)) if err.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List secrets matching a label selector, in listing order
    #[instrument(skip(self))]
    pub async fn list_secrets(&self, label_selector: &str) -> Result<Vec<Secret>> {
        let lp = ListParams::default().labels(label_selector);
        let list = self.secrets().list(&lp).await?;
        debug!(
            "Listed {} secrets matching '{}'",
            list.items.len(),
            label_selector
        );
        Ok(list.items)
    }

    pub async fn create_config_map(&self, cm: &ConfigMap) -> Result<()> {
        self.config_maps()
            .create(&PostParams::default(), cm)
            .await
            .map_err(map_write_error)?;
        Ok(())
    }

    pub async fn update_config_map(&self, cm: &ConfigMap) -> Result<()> {
        self.config_maps()
            .replace(&cm.name_any(), &PostParams::default(), cm)
            .await
            .map_err(map_write_error)?;
        Ok(())
    }

    pub async fn create_secret(&self, secret: &Secret) -> Result<()> {
        self.secrets()
            .create(&PostParams::default(), secret)
            .await
            .map_err(map_write_error)?;
        Ok(())
    }

    pub async fn update_secret(&self, secret: &Secret) -> Result<()> {
        self.secrets()
            .replace(&secret.name_any(), &PostParams::default(), secret)
            .await
            .map_err(map_write_error)?;
        Ok(())
    }
}

/// Surface optimistic-concurrency violations as a distinct conflict error
fn map_write_error(err: kube::Error) -> QuartermasterError {
    match err {
        kube::Error::Api(ref ae) if ae.code == 409 => {
            QuartermasterError::WriteConflict(ae.message.clone())
        }
        e => e.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::resources;
    use crate::test_utils::{config_map_json, conflict_json, not_found_json, MockService};

    #[tokio::test]
    async fn test_get_config_map_found() {
        let client = MockService::new()
            .on_get(
                "/api/v1/namespaces/platform/configmaps/quartermaster-cm",
                200,
                &config_map_json(resources::CONFIG_MAP_NAME, &[("url", "https://qm.example.com")]),
            )
            .into_client();
        let store = CredentialStore::new(client, "platform");

        let cm = store
            .get_config_map(resources::CONFIG_MAP_NAME)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            cm.data.unwrap().get("url").unwrap(),
            "https://qm.example.com"
        );
    }

    #[tokio::test]
    async fn test_get_config_map_not_found_is_none() {
        let client = MockService::new()
            .on_get(
                "/api/v1/namespaces/platform/configmaps/quartermaster-cm",
                404,
                &not_found_json("configmaps", resources::CONFIG_MAP_NAME),
            )
            .into_client();
        let store = CredentialStore::new(client, "platform");

        assert!(store
            .get_config_map(resources::CONFIG_MAP_NAME)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_update_conflict_surfaces_as_write_conflict() {
        let client = MockService::new()
            .on_put(
                "/api/v1/namespaces/platform/configmaps/quartermaster-cm",
                409,
                &conflict_json("configmaps", resources::CONFIG_MAP_NAME),
            )
            .into_client();
        let store = CredentialStore::new(client, "platform");

        let cm = ConfigMap {
            metadata: kube::api::ObjectMeta {
                name: Some(resources::CONFIG_MAP_NAME.to_string()),
                namespace: Some("platform".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = store.update_config_map(&cm).await.unwrap_err();
        assert!(matches!(err, QuartermasterError::WriteConflict(_)));
    }
}
