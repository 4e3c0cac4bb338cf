use serde::Deserialize;

/// Operational limits applied at the check-in counter
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CheckinRules {
    /// Per-piece limit in kilograms
    #[serde(default = "default_max_bag_weight")]
    pub max_bag_weight: f64,
    #[serde(default = "default_document_type")]
    pub default_document_type: String,
}

fn default_max_bag_weight() -> f64 { 32.0 }

fn default_document_type() -> String { "PASSPORT".to_string() }

impl Default for CheckinRules {
    fn default() -> Self {
        Self {
            max_bag_weight: default_max_bag_weight(),
            default_document_type: default_document_type(),
        }
    }
}
