//! Three-tier encryption decision per service invocation.
//!
//! Priority order: whitelist (forces off), then the per-service override,
//! then the per-group override, then the global default. `mode` and
//! `algorithm` resolve independently of `enabled`: an override with an
//! empty field defers that field to the next tier.

use crate::config::EncryptionConfig;

/// The resolver's verdict for one service invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether the envelope applies.
    pub enabled: bool,
    /// `symmetric` or `asymmetric`.
    pub mode: String,
    /// Algorithm name for the resolved mode.
    pub algorithm: String,
}

/// Resolves encryption settings for a `(service, group)` pair.
#[derive(Debug, Clone)]
pub struct EncryptionResolver {
    config: EncryptionConfig,
}

impl EncryptionResolver {
    /// Build the resolver over the loaded configuration.
    pub fn new(config: EncryptionConfig) -> Self {
        Self { config }
    }

    /// The underlying configuration (key material for the ciphers).
    pub fn config(&self) -> &EncryptionConfig {
        &self.config
    }

    /// Resolve the decision for one invocation.
    pub fn resolve(&self, service: &str, group: &str) -> Decision {
        Decision {
            enabled: self.enabled_for(service, group),
            mode: self.mode_for(service, group),
            algorithm: self.algorithm_for(service, group),
        }
    }

    /// Whether signature verification applies. Top-level only.
    pub fn signature_enabled(&self) -> bool {
        self.config.signature.enabled
    }

    fn whitelisted(&self, service: &str, group: &str) -> bool {
        self.config.whitelist.services.iter().any(|s| s == service)
            || (!group.is_empty() && self.config.whitelist.groups.iter().any(|g| g == group))
    }

    fn enabled_for(&self, service: &str, group: &str) -> bool {
        if self.whitelisted(service, group) {
            return false;
        }
        if let Some(override_) = self.config.services.get(service) {
            return override_.enabled;
        }
        if let Some(override_) = self.config.groups.get(group) {
            return override_.enabled;
        }
        self.config.global.enabled
    }

    fn mode_for(&self, service: &str, group: &str) -> String {
        if let Some(override_) = self.config.services.get(service) {
            if !override_.mode.is_empty() {
                return override_.mode.clone();
            }
        }
        if let Some(override_) = self.config.groups.get(group) {
            if !override_.mode.is_empty() {
                return override_.mode.clone();
            }
        }
        self.config.global.mode.clone()
    }

    fn algorithm_for(&self, service: &str, group: &str) -> String {
        if let Some(override_) = self.config.services.get(service) {
            if !override_.algorithm.is_empty() {
                return override_.algorithm.clone();
            }
        }
        if let Some(override_) = self.config.groups.get(group) {
            if !override_.algorithm.is_empty() {
                return override_.algorithm.clone();
            }
        }
        self.config.global.algorithm.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TierConfig;

    fn base_config() -> EncryptionConfig {
        EncryptionConfig {
            global: TierConfig {
                enabled: true,
                mode: "symmetric".to_string(),
                algorithm: "AES256-GCM".to_string(),
            },
            ..Default::default()
        }
    }

    #[test]
    fn global_default_applies() {
        let resolver = EncryptionResolver::new(base_config());
        let decision = resolver.resolve("get_user", "user");
        assert!(decision.enabled);
        assert_eq!(decision.mode, "symmetric");
        assert_eq!(decision.algorithm, "AES256-GCM");
    }

    #[test]
    fn whitelist_beats_everything() {
        let mut config = base_config();
        config.whitelist.services.push("get_public".to_string());
        config.whitelist.groups.push("open".to_string());
        config.services.insert(
            "get_public".to_string(),
            TierConfig {
                enabled: true,
                ..Default::default()
            },
        );
        let resolver = EncryptionResolver::new(config);

        assert!(!resolver.resolve("get_public", "user").enabled);
        assert!(!resolver.resolve("anything", "open").enabled);
        assert!(resolver.resolve("other", "user").enabled);
    }

    #[test]
    fn service_override_beats_group_and_global() {
        let mut config = base_config();
        config.groups.insert(
            "user".to_string(),
            TierConfig {
                enabled: true,
                mode: "asymmetric".to_string(),
                algorithm: "RSA-OAEP".to_string(),
            },
        );
        config.services.insert(
            "get_user".to_string(),
            TierConfig {
                enabled: false,
                mode: String::new(),
                algorithm: "ChaCha20-Poly1305".to_string(),
            },
        );
        let resolver = EncryptionResolver::new(config);

        let decision = resolver.resolve("get_user", "user");
        assert!(!decision.enabled);
        // Empty service mode defers to the group override.
        assert_eq!(decision.mode, "asymmetric");
        assert_eq!(decision.algorithm, "ChaCha20-Poly1305");
    }

    #[test]
    fn group_override_beats_global() {
        let mut config = base_config();
        config.global.enabled = false;
        config.groups.insert(
            "internal".to_string(),
            TierConfig {
                enabled: true,
                mode: String::new(),
                algorithm: String::new(),
            },
        );
        let resolver = EncryptionResolver::new(config);

        let decision = resolver.resolve("sync", "internal");
        assert!(decision.enabled);
        assert_eq!(decision.mode, "symmetric");
        assert_eq!(decision.algorithm, "AES256-GCM");
    }

    #[test]
    fn empty_group_never_matches_group_tiers() {
        let mut config = base_config();
        config.whitelist.groups.push(String::new());
        let resolver = EncryptionResolver::new(config);
        assert!(resolver.resolve("svc", "").enabled);
    }

    #[test]
    fn signature_gate_is_top_level() {
        let mut config = base_config();
        config.signature.enabled = true;
        let resolver = EncryptionResolver::new(config);
        assert!(resolver.signature_enabled());
    }
}
