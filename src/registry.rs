use crate::config::{ProbeMethod, ProviderConfig};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// Registry errors. All of them are fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("At least one provider must be configured")]
    Empty,

    #[error("Duplicate provider id: {0}")]
    DuplicateId(String),

    #[error("Provider '{0}' has an empty id or display name")]
    MissingField(String),

    #[error("Invalid probe URL for provider '{id}': {url}")]
    InvalidUrl { id: String, url: String },
}

/// One monitored provider. Immutable after load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDescriptor {
    pub id: String,
    pub display_name: String,
    pub probe_url: String,
    /// Shown to users; never polled.
    pub status_page_url: String,
    pub method: ProbeMethod,
}

impl From<&ProviderConfig> for ProviderDescriptor {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            id: config.id.clone(),
            display_name: config.display_name.clone(),
            probe_url: config.probe_url.clone(),
            status_page_url: config.status_page_url.clone(),
            method: config.method,
        }
    }
}

/// Ordered, non-empty, read-only list of providers.
///
/// Cloning is cheap: descriptors are shared behind an `Arc` so probe tasks can
/// hold on to them without copying.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Arc<[Arc<ProviderDescriptor>]>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<ProviderDescriptor>) -> Result<Self, RegistryError> {
        if providers.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut seen = HashSet::with_capacity(providers.len());
        for provider in &providers {
            if provider.id.trim().is_empty() || provider.display_name.trim().is_empty() {
                return Err(RegistryError::MissingField(provider.id.clone()));
            }
            if !seen.insert(provider.id.as_str()) {
                return Err(RegistryError::DuplicateId(provider.id.clone()));
            }
            let valid = url::Url::parse(&provider.probe_url)
                .map(|u| matches!(u.scheme(), "http" | "https"))
                .unwrap_or(false);
            if !valid {
                return Err(RegistryError::InvalidUrl {
                    id: provider.id.clone(),
                    url: provider.probe_url.clone(),
                });
            }
        }

        Ok(Self {
            providers: providers.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn from_config(providers: &[ProviderConfig]) -> Result<Self, RegistryError> {
        Self::new(providers.iter().map(ProviderDescriptor::from).collect())
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Always false for a constructed registry; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ProviderDescriptor>> {
        self.providers.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<ProviderDescriptor>> {
        self.providers.get(index)
    }
}

#[cfg(test)]
pub(crate) fn descriptor(id: &str) -> ProviderDescriptor {
    ProviderDescriptor {
        id: id.to_string(),
        display_name: id.to_uppercase(),
        probe_url: format!("https://api.{}.test/v1/models", id),
        status_page_url: format!("https://status.{}.test/", id),
        method: ProbeMethod::Get,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preserves_order() {
        let registry =
            ProviderRegistry::new(vec![descriptor("openai"), descriptor("anthropic"), descriptor("groq")])
                .unwrap();

        let ids: Vec<&str> = registry.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["openai", "anthropic", "groq"]);
        assert_eq!(registry.len(), 3);
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(ProviderRegistry::new(vec![]).unwrap_err(), RegistryError::Empty);
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let err = ProviderRegistry::new(vec![descriptor("openai"), descriptor("openai")]).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateId("openai".to_string()));
    }

    #[test]
    fn test_rejects_bad_url() {
        let mut bad = descriptor("cohere");
        bad.probe_url = "ftp://api.cohere.test".to_string();
        assert!(matches!(
            ProviderRegistry::new(vec![bad]),
            Err(RegistryError::InvalidUrl { .. })
        ));

        let mut garbage = descriptor("mistral");
        garbage.probe_url = "not a url".to_string();
        assert!(ProviderRegistry::new(vec![garbage]).is_err());
    }

    #[test]
    fn test_rejects_blank_display_name() {
        let mut blank = descriptor("groq");
        blank.display_name = "  ".to_string();
        assert_eq!(
            ProviderRegistry::new(vec![blank]).unwrap_err(),
            RegistryError::MissingField("groq".to_string())
        );
    }
}
