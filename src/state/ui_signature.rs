use serde::{Deserialize, Serialize};

/// CTA hrefs above this count mark a page as link-heavy
const MANY_EXTERNAL_LINKS: usize = 5;

/// Structured summary of a page's interactive surface
///
/// Produced in the page by the signature script and decoded here. Field
/// order is fixed, so [`UiSignature::to_canonical_json`] is stable for equal
/// signatures and can feed the node key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UiSignature {
    /// Comma-joined counts of structural selectors
    pub dom_hash: String,
    pub ctas: Vec<Cta>,
    pub forms: Vec<FormDescriptor>,
    pub nav_elements: Vec<NavElement>,
    pub metadata: SignatureMetadata,
}

/// A clickable or navigable element
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cta {
    /// Lower-case tag name
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    pub href: Option<String>,
    /// Best-effort CSS selector for the element
    pub selector: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormDescriptor {
    pub action: Option<String>,
    pub method: String,
    pub fields: Vec<FormField>,
}

impl Default for FormDescriptor {
    fn default() -> Self {
        Self {
            action: None,
            method: "GET".to_string(),
            fields: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormField {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: Option<String>,
    pub id: Option<String>,
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavElement {
    pub links: Vec<NavLink>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavLink {
    pub text: String,
    pub href: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureMetadata {
    pub title: Option<String>,
    pub viewport: ViewportSize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

/// Compact view of a signature for graph consumers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureSummary {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub cta_texts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub form_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub form_field_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub nav_link_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dom_hash: Option<String>,
}

/// Heuristic risk flags derived from a signature
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskTags {
    #[serde(skip_serializing_if = "is_false", default)]
    pub has_forms: bool,
    #[serde(skip_serializing_if = "is_false", default)]
    pub has_required_fields: bool,
    #[serde(skip_serializing_if = "is_false", default)]
    pub many_external_links: bool,
}

fn is_false(value: &bool) -> bool {
    !value
}

impl RiskTags {
    pub fn is_empty(&self) -> bool {
        !self.has_forms && !self.has_required_fields && !self.many_external_links
    }
}

impl UiSignature {
    /// Decodes a signature from the value returned by the page script
    pub fn from_value(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Stable JSON form used for hashing and storage
    pub fn to_canonical_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Number of CTA elements
    pub fn cta_count(&self) -> usize {
        self.ctas.len()
    }

    /// Total number of links across navigation regions
    pub fn nav_link_count(&self) -> usize {
        self.nav_elements.iter().map(|n| n.links.len()).sum()
    }

    pub fn summary(&self) -> SignatureSummary {
        let cta_texts = self
            .ctas
            .iter()
            .filter(|c| !c.text.trim().is_empty())
            .map(|c| c.text.clone())
            .collect();

        let (form_count, form_field_types) = if self.forms.is_empty() {
            (None, None)
        } else {
            let types = self
                .forms
                .iter()
                .flat_map(|f| f.fields.iter().map(|field| field.kind.clone()))
                .collect();
            (Some(self.forms.len()), Some(types))
        };

        let nav_links = self.nav_link_count();

        SignatureSummary {
            cta_texts,
            form_count,
            form_field_types,
            nav_link_count: (nav_links > 0).then_some(nav_links),
            dom_hash: (!self.dom_hash.is_empty()).then(|| self.dom_hash.clone()),
        }
    }

    pub fn risk_tags(&self) -> RiskTags {
        let has_forms = !self.forms.is_empty();
        let has_required_fields = self
            .forms
            .iter()
            .any(|f| f.fields.iter().any(|field| field.required));
        let external = self
            .ctas
            .iter()
            .filter(|c| c.href.as_deref().is_some_and(|h| h.starts_with("http")))
            .count();

        RiskTags {
            has_forms,
            has_required_fields,
            many_external_links: external > MANY_EXTERNAL_LINKS,
        }
    }
}
