//! In-memory registry of pre-approved message templates.
//!
//! Meta approves templates out of band; the catalog only records what exists
//! and which positional body parameters each template takes. An unregistered
//! name is rejected before any network call.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One approved template: its Cloud API name, the language it was approved
/// in, and its body placeholders in positional order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateDefinition {
    pub name: String,
    /// Grouping used by the admin screens (e.g. "rsvp", "reminder").
    pub category: String,
    /// BCP 47 code the template was approved under, e.g. "de" or "en_US".
    pub language: String,
    /// Parameter keys in the order the template body expects them.
    pub body_params: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: HashMap<String, TemplateDefinition>,
}

impl TemplateCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template, replacing any previous definition of the same
    /// name.
    pub fn register(&mut self, template: TemplateDefinition) {
        self.templates.insert(template.name.clone(), template);
    }

    pub fn lookup(&self, name: &str) -> Result<&TemplateDefinition> {
        self.templates
            .get(name)
            .ok_or_else(|| Error::template_not_found(name))
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }
}

impl TemplateDefinition {
    /// Resolve the positional body parameters from the merged parameter map.
    /// Caller-supplied values override base values of the same key.
    pub fn resolve_params(
        &self,
        base: &HashMap<String, String>,
        caller: &HashMap<String, String>,
    ) -> Result<Vec<String>> {
        self.body_params
            .iter()
            .map(|key| {
                caller
                    .get(key)
                    .or_else(|| base.get(key))
                    .cloned()
                    .ok_or_else(|| Error::MissingParameter {
                        template: self.name.clone(),
                        name: key.clone(),
                    })
            })
            .collect()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn rsvp_template() -> TemplateDefinition {
        TemplateDefinition {
            name: "rsvp_invite".to_string(),
            category: "rsvp".to_string(),
            language: "de".to_string(),
            body_params: vec!["guest_name".to_string(), "event_name".to_string()],
        }
    }

    #[test]
    fn caller_params_override_base() {
        let template = rsvp_template();
        let base = HashMap::from([
            ("guest_name".to_string(), "Gast".to_string()),
            ("event_name".to_string(), "Hochzeit".to_string()),
        ]);
        let caller = HashMap::from([("guest_name".to_string(), "Anna".to_string())]);

        let params = template.resolve_params(&base, &caller).unwrap();
        assert_eq!(params, vec!["Anna".to_string(), "Hochzeit".to_string()]);
    }

    #[test]
    fn missing_param_is_rejected() {
        let template = rsvp_template();
        let base = HashMap::from([("guest_name".to_string(), "Anna".to_string())]);

        let err = template.resolve_params(&base, &HashMap::new()).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingParameter { ref name, .. } if name == "event_name"
        ));
    }

    #[test]
    fn unknown_template_is_rejected() {
        let mut catalog = TemplateCatalog::new();
        catalog.register(rsvp_template());

        assert!(catalog.lookup("rsvp_invite").is_ok());
        assert!(matches!(
            catalog.lookup("nope"),
            Err(Error::TemplateNotFound { .. })
        ));
    }
}
