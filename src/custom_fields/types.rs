use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::shared::error::CrmError;
use crate::core::shared::schema::{
    custom_field_enabled_in, custom_field_options, custom_field_visibility, custom_fields,
};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = custom_fields)]
pub struct DbCustomField {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub module: String,
    pub required: bool,
    pub placeholder: Option<String>,
    pub help_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = custom_field_options)]
pub struct NewFieldOption {
    pub id: Uuid,
    pub custom_field_id: Uuid,
    pub option_value: String,
    pub display_order: i32,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = custom_field_visibility)]
pub struct NewFieldVisibility {
    pub id: Uuid,
    pub custom_field_id: Uuid,
    pub visibility: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = custom_field_enabled_in)]
pub struct NewFieldEnabledIn {
    pub id: Uuid,
    pub custom_field_id: Uuid,
    pub enabled_in: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomFieldDetail {
    #[serde(flatten)]
    pub field: DbCustomField,
    pub options: Vec<String>,
    pub visibility: Vec<String>,
    pub enabled_in: Vec<String>,
}

/// Body of both `POST` and `PUT`; a `PUT` replaces the whole definition.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomFieldRequest {
    pub label: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub field_type: Option<String>,
    pub module: Option<String>,
    #[serde(default)]
    pub required: bool,
    pub placeholder: Option<String>,
    pub help_text: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub visibility: Vec<String>,
    #[serde(default)]
    pub enabled_in: Vec<String>,
}

/// Validated definition ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub name: String,
    pub label: String,
    pub field_type: String,
    pub module: String,
    pub required: bool,
    pub placeholder: Option<String>,
    pub help_text: Option<String>,
    pub options: Vec<String>,
    pub visibility: Vec<String>,
    pub enabled_in: Vec<String>,
}

/// `"Contract Value (€)"` becomes `"contract_value____"`.
pub fn field_name_from_label(label: &str) -> String {
    label
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn nonblank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl CustomFieldRequest {
    pub fn validate(self) -> Result<FieldDefinition, CrmError> {
        let (Some(label), Some(field_type), Some(module)) = (
            nonblank(self.label),
            nonblank(self.field_type),
            nonblank(self.module),
        ) else {
            return Err(CrmError::validation("Label, type and module are required"));
        };

        let name = nonblank(self.name).unwrap_or_else(|| field_name_from_label(&label));

        Ok(FieldDefinition {
            name,
            label,
            field_type,
            module,
            required: self.required,
            placeholder: self.placeholder,
            help_text: self.help_text,
            options: self.options,
            visibility: self.visibility,
            enabled_in: self.enabled_in,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomFieldListQuery {
    pub module: Option<String>,
}
