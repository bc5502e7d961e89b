//! Volume context lookup and placeholder interpolation.

use std::collections::HashMap;

use super::keys;

/// Sub-directory placeholders and the context key that supplies each value.
pub const PLACEHOLDERS: [(&str, &str); 7] = [
    ("${pod.metadata.name}", keys::POD_NAME),
    ("${pod.metadata.namespace}", keys::POD_NAMESPACE),
    ("${pod.metadata.uid}", keys::POD_UID),
    ("${serviceAccount.metadata.name}", keys::SERVICE_ACCOUNT_NAME),
    ("${pvc.metadata.name}", keys::PVC_NAME),
    ("${pvc.metadata.namespace}", keys::PVC_NAMESPACE),
    ("${pv.metadata.name}", keys::PV_NAME),
];

/// Request volume context with keys normalized to lowercase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeContext {
    entries: HashMap<String, String>,
}

impl VolumeContext {
    /// Build a context from the raw request map.
    ///
    /// If two keys differ only in case, which one wins is unspecified.
    #[must_use]
    pub fn new(raw: &HashMap<String, String>) -> Self {
        let entries = raw
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.clone()))
            .collect();
        Self { entries }
    }

    /// Look up a key case-insensitively.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(&key.to_lowercase()).map(String::as_str)
    }

    /// Replace known placeholders in `template` with their context values.
    ///
    /// Substitution is literal and single-pass: a substituted value is never
    /// scanned again, and placeholders that are unknown or have no value in
    /// the context are kept verbatim.
    #[must_use]
    pub fn interpolate(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            rest = &rest[start..];

            let matched = PLACEHOLDERS.iter().find_map(|(placeholder, key)| {
                if rest.starts_with(placeholder) {
                    self.get(key).map(|value| (placeholder.len(), value))
                } else {
                    None
                }
            });

            match matched {
                Some((len, value)) => {
                    out.push_str(value);
                    rest = &rest[len..];
                }
                None => {
                    out.push_str("${");
                    rest = &rest[2..];
                }
            }
        }

        out.push_str(rest);
        out
    }
}
