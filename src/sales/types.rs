use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::totals::{lenient_f64, LineItemInput};
use crate::core::shared::schema::{deal_contacts, deal_items, deals, offer_items, offers};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = deals)]
pub struct DbDeal {
    pub id: Uuid,
    pub company_id: Uuid,
    pub deal_number: String,
    pub title: Option<String>,
    pub deal_date: Option<NaiveDate>,
    pub valid_till: Option<NaiveDate>,
    pub currency: String,
    pub client_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub lead_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub calculate_tax: String,
    pub description: Option<String>,
    pub note: Option<String>,
    pub terms: Option<String>,
    pub discount: BigDecimal,
    pub discount_type: String,
    pub sub_total: BigDecimal,
    pub discount_amount: BigDecimal,
    pub tax_amount: BigDecimal,
    pub total: BigDecimal,
    pub status: String,
    pub pipeline_id: Option<Uuid>,
    pub stage_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = deal_items)]
pub struct DbDealItem {
    pub id: Uuid,
    pub deal_id: Uuid,
    pub item_name: Option<String>,
    pub description: Option<String>,
    pub quantity: BigDecimal,
    pub unit: String,
    pub unit_price: BigDecimal,
    pub tax_rate: BigDecimal,
    pub amount: BigDecimal,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = deal_contacts)]
pub struct DbDealContact {
    pub id: Uuid,
    pub deal_id: Uuid,
    pub contact_id: Uuid,
    pub is_primary: bool,
    pub role: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = offers)]
pub struct DbOffer {
    pub id: Uuid,
    pub company_id: Uuid,
    pub offer_number: String,
    pub offer_date: Option<NaiveDate>,
    pub valid_till: Option<NaiveDate>,
    pub currency: String,
    pub client_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub lead_id: Option<Uuid>,
    pub calculate_tax: String,
    pub description: Option<String>,
    pub note: Option<String>,
    pub terms: Option<String>,
    pub discount: BigDecimal,
    pub discount_type: String,
    pub sub_total: BigDecimal,
    pub discount_amount: BigDecimal,
    pub tax_amount: BigDecimal,
    pub total: BigDecimal,
    pub status: String,
    pub created_by: Option<Uuid>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = offer_items)]
pub struct DbOfferItem {
    pub id: Uuid,
    pub offer_id: Uuid,
    pub item_name: Option<String>,
    pub description: Option<String>,
    pub quantity: BigDecimal,
    pub unit: String,
    pub unit_price: BigDecimal,
    pub tax_rate: BigDecimal,
    pub amount: BigDecimal,
    pub sort_order: i32,
}

/// Contact linked to a deal, joined with the contact master record.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable)]
pub struct LinkedContact {
    pub id: Option<Uuid>,
    pub contact_id: Uuid,
    pub is_primary: bool,
    pub role: Option<String>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub job_title: Option<String>,
    pub contact_company: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DealDetail {
    #[serde(flatten)]
    pub deal: DbDeal,
    pub items: Vec<DbDealItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_contacts: Option<Vec<LinkedContact>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OfferDetail {
    #[serde(flatten)]
    pub offer: DbOffer,
    pub items: Vec<DbOfferItem>,
}

/// Header fields shared by deal and offer create requests.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentHeaderInput {
    pub valid_till: Option<NaiveDate>,
    pub currency: Option<String>,
    pub client_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub lead_id: Option<Uuid>,
    pub calculate_tax: Option<String>,
    pub description: Option<String>,
    pub note: Option<String>,
    pub terms: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub discount: Option<f64>,
    pub discount_type: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItemInput>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub sub_total: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateDealRequest {
    #[serde(flatten)]
    pub header: DocumentHeaderInput,
    pub title: Option<String>,
    pub deal_date: Option<NaiveDate>,
    pub contact_id: Option<Uuid>,
    pub pipeline_id: Option<Uuid>,
    pub stage_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateOfferRequest {
    #[serde(flatten)]
    pub header: DocumentHeaderInput,
    pub offer_date: Option<NaiveDate>,
}

/// Header fields shared by deal and offer updates; `None` leaves a column as is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentHeaderUpdate {
    pub valid_till: Option<NaiveDate>,
    pub currency: Option<String>,
    pub client_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub lead_id: Option<Uuid>,
    pub calculate_tax: Option<String>,
    pub description: Option<String>,
    pub note: Option<String>,
    pub terms: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub discount: Option<f64>,
    pub discount_type: Option<String>,
    pub status: Option<String>,
    pub items: Option<Vec<LineItemInput>>,
}

impl DocumentHeaderUpdate {
    pub fn touches_totals(&self) -> bool {
        self.items.is_some() || self.discount.is_some() || self.discount_type.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDealRequest {
    #[serde(flatten)]
    pub header: DocumentHeaderUpdate,
    pub title: Option<String>,
    pub deal_date: Option<NaiveDate>,
    pub contact_id: Option<Uuid>,
    pub pipeline_id: Option<Uuid>,
    pub stage_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateOfferRequest {
    #[serde(flatten)]
    pub header: DocumentHeaderUpdate,
    pub offer_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentListQuery {
    pub status: Option<String>,
    pub search: Option<String>,
    pub lead_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
}

impl DocumentListQuery {
    /// Status filter, ignoring blanks and the `All` sentinel.
    pub fn status_filter(&self) -> Option<String> {
        self.status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("all"))
            .map(str::to_string)
    }

    pub fn search_pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{s}%"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DealStatusRequest {
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DealStageRequest {
    pub stage_id: Option<Uuid>,
    pub pipeline_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkContactRequest {
    pub contact_id: Option<Uuid>,
    #[serde(default)]
    pub is_primary: bool,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DealActivityQuery {
    #[serde(rename = "type")]
    pub activity_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_filter_ignores_all_and_blank() {
        let q = |s: &str| DocumentListQuery {
            status: Some(s.to_string()),
            ..Default::default()
        };
        assert_eq!(q("All").status_filter(), None);
        assert_eq!(q("  ").status_filter(), None);
        assert_eq!(q("sent").status_filter().as_deref(), Some("sent"));
    }

    #[test]
    fn test_search_pattern() {
        let q = DocumentListQuery {
            search: Some(" DEAL#00 ".into()),
            ..Default::default()
        };
        assert_eq!(q.search_pattern().as_deref(), Some("%DEAL#00%"));
    }

    #[test]
    fn test_create_request_flattens_header() {
        let req: CreateDealRequest = serde_json::from_str(
            r#"{
                "title": "Fit-out",
                "discount": "10",
                "discount_type": "%",
                "items": [{"item_name": "Desk", "quantity": 2, "unit_price": 10, "unit": "pieces"}]
            }"#,
        )
        .unwrap();
        assert_eq!(req.title.as_deref(), Some("Fit-out"));
        assert_eq!(req.header.discount, Some(10.0));
        assert_eq!(req.header.items.len(), 1);
    }

    #[test]
    fn test_update_touches_totals() {
        let update = DocumentHeaderUpdate::default();
        assert!(!update.touches_totals());
        let update = DocumentHeaderUpdate {
            discount: Some(5.0),
            ..Default::default()
        };
        assert!(update.touches_totals());
    }
}
