//! Category registry: document type → ordered field descriptors.
//!
//! The registry is plain data so the service and any client can validate the
//! same schema. [`CategoryRegistry::default`] carries the categories the
//! barangay hall issues today; deployments replace or extend it from YAML:
//!
//! ```yaml
//! "Barangay Clearance":
//!   - { name: purpose, label: Purpose, type: text, required: true }
//! "Business Permit":
//!   - { name: business_name, label: Business Name, type: text, required: true }
//! ```
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::RecordError;
use crate::sanitize::sanitize_optional;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Text,
    Number,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub label: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
}

impl FieldSpec {
    fn new(name: &str, label: &str, field_type: FieldType, required: bool) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            field_type,
            required,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryRegistry {
    categories: BTreeMap<String, Vec<FieldSpec>>,
}

impl CategoryRegistry {
    pub fn empty() -> Self {
        Self {
            categories: BTreeMap::new(),
        }
    }

    pub fn with_category(mut self, name: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        self.insert(name, fields);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, fields: Vec<FieldSpec>) {
        self.categories.insert(name.into(), fields);
    }

    /// Adds or replaces every category of `other`.
    pub fn merge(&mut self, other: CategoryRegistry) {
        self.categories.extend(other.categories);
    }

    pub fn fields(&self, category: &str) -> Option<&[FieldSpec]> {
        self.categories.get(category).map(Vec::as_slice)
    }

    pub fn contains(&self, category: &str) -> bool {
        self.categories.contains_key(category)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Checks `values` against the descriptors of `category`.
    ///
    /// Returns the sanitized values in descriptor order. Blank optional
    /// fields are dropped, unknown keys are rejected, numbers must parse.
    pub fn validate(
        &self,
        category: &str,
        values: BTreeMap<String, String>,
        strip_control: bool,
    ) -> Result<BTreeMap<String, String>, RecordError> {
        let specs = self
            .fields(category)
            .ok_or_else(|| RecordError::UnknownCategory(category.to_string()))?;

        if let Some(unknown) = values
            .keys()
            .find(|key| !specs.iter().any(|spec| &spec.name == *key))
        {
            return Err(RecordError::invalid(
                format!("fields.{unknown}"),
                format!("not a field of {category}"),
            ));
        }

        let mut values = values;
        let mut out = BTreeMap::new();
        for spec in specs {
            let value = sanitize_optional(values.remove(&spec.name), strip_control);
            match value {
                Some(value) => {
                    if spec.field_type == FieldType::Number && value.parse::<f64>().is_err() {
                        return Err(RecordError::invalid(
                            format!("fields.{}", spec.name),
                            format!("{} must be a number", spec.label),
                        ));
                    }
                    out.insert(spec.name.clone(), value);
                }
                None if spec.required => {
                    return Err(RecordError::missing(format!("fields.{}", spec.name)));
                }
                None => {}
            }
        }
        Ok(out)
    }
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        use FieldType::{Number, Text};

        let one = |name: &str, label: &str, ty: FieldType, required: bool| {
            vec![FieldSpec::new(name, label, ty, required)]
        };

        CategoryRegistry::empty()
            .with_category(
                "Barangay Clearance",
                one("purpose", "Purpose", Text, true),
            )
            .with_category(
                "Certificate of Residency",
                one("years_resided", "Years of Residency", Number, false),
            )
            .with_category(
                "Certificate of Indigency",
                one("household_income", "Household Monthly Income", Number, false),
            )
            .with_category(
                "Good Moral Certificate",
                one("school", "School / Employer", Text, false),
            )
            .with_category(
                "Business Permit",
                vec![
                    FieldSpec::new("business_name", "Business Name", Text, true),
                    FieldSpec::new("business_address", "Business Address", Text, true),
                    FieldSpec::new("business_owner", "Owner's Full Name", Text, true),
                    FieldSpec::new("business_type", "Type of Business", Text, false),
                    FieldSpec::new(
                        "business_registration",
                        "Business Registration / DTI Number",
                        Text,
                        false,
                    ),
                ],
            )
            .with_category(
                "Certificate of Death",
                one("deceased_name", "Deceased Name", Text, true),
            )
            .with_category(
                "Certificate for PWD",
                one("disability_type", "Type of Disability", Text, false),
            )
            .with_category(
                "Certificate of Vaccination",
                one("vaccine_type", "Vaccine Type", Text, false),
            )
            .with_category(
                "Certificate of Appearance",
                one("purpose", "Purpose", Text, false),
            )
            .with_category(
                "Certificate for Achiever",
                one("achievement", "Achievement Details", Text, false),
            )
            .with_category(
                "First Time Jobseeker Oath",
                one("school_graduated", "School Graduated From", Text, false),
            )
            .with_category(
                "Certificate of Live-In",
                one("partner_name", "Partner Name", Text, false),
            )
    }
}
