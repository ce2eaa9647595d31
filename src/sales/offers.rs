use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use diesel::prelude::*;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::deals::{recalculated_totals, DEFAULT_TERMS};
use super::items::{load_offer_items, replace_offer_items, stored_line};
use super::numbering::{insert_with_number, NumberedTable, TableNumbers};
use super::totals::{calculate_totals, normalize_deal_status, DealStatus, DiscountType, Totals};
use super::types::{CreateOfferRequest, DbOffer, DocumentListQuery, OfferDetail, UpdateOfferRequest};
use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::error::{ApiResponse, CrmError};
use crate::core::shared::schema::offers;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{bd, bd_to_f64, with_conn};

pub const DEFAULT_VALIDITY_DAYS: i64 = 30;

pub fn default_valid_till(today: NaiveDate) -> NaiveDate {
    today + Duration::days(DEFAULT_VALIDITY_DAYS)
}

fn find_offer(conn: &mut PgConnection, tenant: Uuid, id: Uuid) -> Result<DbOffer, CrmError> {
    offers::table
        .filter(offers::id.eq(id))
        .filter(offers::company_id.eq(tenant))
        .filter(offers::is_deleted.eq(false))
        .select(DbOffer::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| CrmError::not_found("Offer"))
}

fn detail(conn: &mut PgConnection, offer: DbOffer) -> Result<OfferDetail, CrmError> {
    let items = load_offer_items(conn, &[offer.id])?
        .remove(&offer.id)
        .unwrap_or_default();
    Ok(OfferDetail { offer, items })
}

fn list(conn: &mut PgConnection, tenant: Uuid, query: &DocumentListQuery) -> Result<Vec<OfferDetail>, CrmError> {
    let mut q = offers::table
        .filter(offers::company_id.eq(tenant))
        .filter(offers::is_deleted.eq(false))
        .into_boxed();

    if let Some(status) = query.status_filter() {
        let Some(status) = DealStatus::from_name(&status) else {
            return Ok(Vec::new());
        };
        q = q.filter(offers::status.eq(status.as_str()));
    }
    if let Some(pattern) = query.search_pattern() {
        q = q.filter(
            offers::offer_number
                .ilike(pattern.clone())
                .or(offers::description.ilike(pattern)),
        );
    }
    if let Some(lead_id) = query.lead_id {
        q = q.filter(offers::lead_id.eq(lead_id));
    }
    if let Some(client_id) = query.client_id {
        q = q.filter(offers::client_id.eq(client_id));
    }

    let rows: Vec<DbOffer> = q
        .order(offers::created_at.desc())
        .select(DbOffer::as_select())
        .load(conn)?;

    let ids: Vec<Uuid> = rows.iter().map(|o| o.id).collect();
    let mut items = load_offer_items(conn, &ids)?;

    Ok(rows
        .into_iter()
        .map(|offer| OfferDetail {
            items: items.remove(&offer.id).unwrap_or_default(),
            offer,
        })
        .collect())
}

fn create(conn: &mut PgConnection, user: &AuthenticatedUser, req: CreateOfferRequest) -> Result<OfferDetail, CrmError> {
    let header = req.header;
    let discount = header.discount.unwrap_or(0.0);
    let discount_type = DiscountType::parse(header.discount_type.as_deref());

    let totals = if !header.items.is_empty() {
        calculate_totals(&header.items, discount, discount_type)
    } else if header.total.is_some() || header.sub_total.is_some() {
        Totals::from_supplied(header.sub_total, header.total)
    } else {
        Totals::default()
    };
    let status = normalize_deal_status(header.status.as_deref().unwrap_or_default());
    let valid_till = header
        .valid_till
        .unwrap_or_else(|| default_valid_till(Utc::now().date_naive()));

    let mut numbers = TableNumbers::new(conn, NumberedTable::Offers);
    let created = insert_with_number(&mut numbers, NumberedTable::Offers.prefix(), |numbers, number| {
        numbers.conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let now = Utc::now();
            let offer = DbOffer {
                id: Uuid::new_v4(),
                company_id: user.company_id,
                offer_number: number.to_string(),
                offer_date: req.offer_date,
                valid_till: Some(valid_till),
                currency: header.currency.clone().unwrap_or_else(|| "USD".to_string()),
                client_id: header.client_id,
                project_id: header.project_id,
                lead_id: header.lead_id,
                calculate_tax: header
                    .calculate_tax
                    .clone()
                    .unwrap_or_else(|| "After Discount".to_string()),
                description: header.description.clone(),
                note: header.note.clone(),
                terms: Some(header.terms.clone().unwrap_or_else(|| DEFAULT_TERMS.to_string())),
                discount: bd(discount),
                discount_type: discount_type.as_str().to_string(),
                sub_total: bd(totals.sub_total),
                discount_amount: bd(totals.discount_amount),
                tax_amount: bd(totals.tax_amount),
                total: bd(totals.total),
                status: status.as_str().to_string(),
                created_by: Some(user.id),
                is_deleted: false,
                created_at: now,
                updated_at: now,
            };

            diesel::insert_into(offers::table).values(&offer).execute(conn)?;
            let items = replace_offer_items(conn, offer.id, &header.items)?;
            Ok(OfferDetail { offer, items })
        })
    })?;

    info!("Offer {} created as {}", created.offer.id, created.offer.offer_number);
    Ok(created)
}

#[derive(AsChangeset)]
#[diesel(table_name = offers)]
struct OfferChanges {
    offer_date: Option<NaiveDate>,
    valid_till: Option<NaiveDate>,
    currency: Option<String>,
    client_id: Option<Uuid>,
    project_id: Option<Uuid>,
    lead_id: Option<Uuid>,
    calculate_tax: Option<String>,
    description: Option<String>,
    note: Option<String>,
    terms: Option<String>,
    discount: Option<BigDecimal>,
    discount_type: Option<String>,
    sub_total: Option<BigDecimal>,
    discount_amount: Option<BigDecimal>,
    tax_amount: Option<BigDecimal>,
    total: Option<BigDecimal>,
    status: Option<String>,
    updated_at: DateTime<Utc>,
}

fn update(conn: &mut PgConnection, tenant: Uuid, id: Uuid, req: UpdateOfferRequest) -> Result<OfferDetail, CrmError> {
    conn.transaction::<_, CrmError, _>(|conn| {
        let current = find_offer(conn, tenant, id)?;
        let header = req.header;

        let totals = recalculated_totals(
            &header,
            || {
                Ok(load_offer_items(conn, &[id])?
                    .remove(&id)
                    .unwrap_or_default()
                    .iter()
                    .map(|i| stored_line(&i.amount))
                    .collect())
            },
            bd_to_f64(&current.discount),
            &current.discount_type,
            bd_to_f64(&current.sub_total),
        )?;

        let changes = OfferChanges {
            offer_date: req.offer_date,
            valid_till: header.valid_till,
            currency: header.currency,
            client_id: header.client_id,
            project_id: header.project_id,
            lead_id: header.lead_id,
            calculate_tax: header.calculate_tax,
            description: header.description,
            note: header.note,
            terms: header.terms,
            discount: header.discount.map(bd),
            discount_type: header
                .discount_type
                .as_deref()
                .map(|t| DiscountType::parse(Some(t)).as_str().to_string()),
            sub_total: totals.map(|t| bd(t.sub_total)),
            discount_amount: totals.map(|t| bd(t.discount_amount)),
            tax_amount: totals.map(|t| bd(t.tax_amount)),
            total: totals.map(|t| bd(t.total)),
            status: header
                .status
                .as_deref()
                .map(|s| normalize_deal_status(s).as_str().to_string()),
            updated_at: Utc::now(),
        };

        diesel::update(offers::table.filter(offers::id.eq(id)))
            .set(&changes)
            .execute(conn)?;

        if let Some(items) = &header.items {
            replace_offer_items(conn, id, items)?;
        }

        let offer = find_offer(conn, tenant, id)?;
        detail(conn, offer)
    })
}

pub async fn list_offers(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(query): Query<DocumentListQuery>,
) -> Result<Json<ApiResponse<Vec<OfferDetail>>>, CrmError> {
    let rows = with_conn(&state.conn, move |conn| list(conn, user.company_id, &query)).await?;
    Ok(Json(ApiResponse::ok(rows)))
}

pub async fn get_offer(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OfferDetail>>, CrmError> {
    let offer = with_conn(&state.conn, move |conn| {
        let offer = find_offer(conn, user.company_id, id)?;
        detail(conn, offer)
    })
    .await?;
    Ok(Json(ApiResponse::ok(offer)))
}

pub async fn create_offer(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateOfferRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OfferDetail>>), CrmError> {
    let offer = with_conn(&state.conn, move |conn| create(conn, &user, req)).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(offer))))
}

pub async fn update_offer(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateOfferRequest>,
) -> Result<Json<ApiResponse<OfferDetail>>, CrmError> {
    let offer = with_conn(&state.conn, move |conn| update(conn, user.company_id, id, req)).await?;
    Ok(Json(ApiResponse::ok(offer)))
}

pub async fn delete_offer(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, CrmError> {
    with_conn(&state.conn, move |conn| {
        let deleted = diesel::update(
            offers::table
                .filter(offers::id.eq(id))
                .filter(offers::company_id.eq(user.company_id))
                .filter(offers::is_deleted.eq(false)),
        )
        .set((offers::is_deleted.eq(true), offers::updated_at.eq(Utc::now())))
        .execute(conn)?;

        if deleted == 0 {
            return Err(CrmError::not_found("Offer"));
        }
        info!("Offer {} deleted", id);
        Ok(())
    })
    .await?;

    Ok(Json(ApiResponse::message("Offer deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_validity_is_thirty_days() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        assert_eq!(
            default_valid_till(today),
            NaiveDate::from_ymd_opt(2026, 2, 14).unwrap()
        );
    }
}
