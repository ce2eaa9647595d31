use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::items::{load_deal_items, replace_deal_items, stored_line};
use super::numbering::{insert_with_number, NumberedTable, TableNumbers};
use super::totals::{
    calculate_totals, normalize_deal_status, DealStatus, DiscountType, LineItemInput, Totals,
};
use super::types::{
    CreateDealRequest, DbDeal, DealDetail, DealStageRequest, DealStatusRequest,
    DocumentHeaderUpdate, DocumentListQuery, LinkedContact, UpdateDealRequest,
};
use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::error::{ApiResponse, CrmError};
use crate::core::shared::schema::{contacts, deal_contacts, deals};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{bd, bd_to_f64, with_conn};

pub const DEFAULT_TERMS: &str = "Thank you for your business.";

pub(crate) fn find_deal(conn: &mut PgConnection, tenant: Uuid, id: Uuid) -> Result<DbDeal, CrmError> {
    deals::table
        .filter(deals::id.eq(id))
        .filter(deals::company_id.eq(tenant))
        .filter(deals::is_deleted.eq(false))
        .select(DbDeal::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| CrmError::not_found("Deal"))
}

/// Live contacts of one tenant.
pub(crate) fn tenant_contacts<'a>(tenant: Uuid) -> contacts::BoxedQuery<'a, Pg> {
    contacts::table
        .filter(contacts::tenant_id.eq(tenant))
        .filter(contacts::is_deleted.eq(false))
        .into_boxed()
}

pub(crate) fn linked_contacts(
    conn: &mut PgConnection,
    tenant: Uuid,
    deal_id: Uuid,
) -> QueryResult<Vec<LinkedContact>> {
    deal_contacts::table
        .inner_join(contacts::table)
        .filter(deal_contacts::deal_id.eq(deal_id))
        .filter(contacts::tenant_id.eq(tenant))
        .filter(contacts::is_deleted.eq(false))
        .order((deal_contacts::is_primary.desc(), deal_contacts::created_at.asc()))
        .select((
            deal_contacts::id.nullable(),
            deal_contacts::contact_id,
            deal_contacts::is_primary,
            deal_contacts::role,
            contacts::name,
            contacts::email,
            contacts::phone,
            contacts::job_title,
            contacts::company,
        ))
        .load::<LinkedContact>(conn)
}

/// Explicit links, or the deal's own contact as primary when none exist.
fn contacts_for_detail(conn: &mut PgConnection, deal: &DbDeal) -> QueryResult<Vec<LinkedContact>> {
    let linked = linked_contacts(conn, deal.company_id, deal.id)?;
    if !linked.is_empty() {
        return Ok(linked);
    }
    let Some(contact_id) = deal.contact_id else {
        return Ok(linked);
    };

    let primary = tenant_contacts(deal.company_id)
        .filter(contacts::id.eq(contact_id))
        .select((
            contacts::name,
            contacts::email,
            contacts::phone,
            contacts::job_title,
            contacts::company,
        ))
        .first::<(String, Option<String>, Option<String>, Option<String>, Option<String>)>(conn)
        .optional()?;

    Ok(primary
        .map(|(name, email, phone, job_title, contact_company)| LinkedContact {
            id: None,
            contact_id,
            is_primary: true,
            role: None,
            name,
            email,
            phone,
            job_title,
            contact_company,
        })
        .into_iter()
        .collect())
}

fn detail(conn: &mut PgConnection, deal: DbDeal) -> Result<DealDetail, CrmError> {
    let items = load_deal_items(conn, &[deal.id])?.remove(&deal.id).unwrap_or_default();
    let linked = contacts_for_detail(conn, &deal)?;
    Ok(DealDetail {
        deal,
        items,
        linked_contacts: Some(linked),
    })
}

fn list(conn: &mut PgConnection, tenant: Uuid, query: &DocumentListQuery) -> Result<Vec<DealDetail>, CrmError> {
    let mut q = deals::table
        .filter(deals::company_id.eq(tenant))
        .filter(deals::is_deleted.eq(false))
        .into_boxed();

    if let Some(status) = query.status_filter() {
        let Some(status) = DealStatus::from_name(&status) else {
            return Ok(Vec::new());
        };
        q = q.filter(deals::status.eq(status.as_str()));
    }
    if let Some(pattern) = query.search_pattern() {
        q = q.filter(
            deals::deal_number
                .ilike(pattern.clone())
                .or(deals::title.ilike(pattern)),
        );
    }
    if let Some(lead_id) = query.lead_id {
        q = q.filter(deals::lead_id.eq(lead_id));
    }
    if let Some(client_id) = query.client_id {
        q = q.filter(deals::client_id.eq(client_id));
    }

    let rows: Vec<DbDeal> = q
        .order(deals::created_at.desc())
        .select(DbDeal::as_select())
        .load(conn)?;

    let ids: Vec<Uuid> = rows.iter().map(|d| d.id).collect();
    let mut items = load_deal_items(conn, &ids)?;

    Ok(rows
        .into_iter()
        .map(|deal| DealDetail {
            items: items.remove(&deal.id).unwrap_or_default(),
            deal,
            linked_contacts: None,
        })
        .collect())
}

fn create(conn: &mut PgConnection, user: &AuthenticatedUser, req: CreateDealRequest) -> Result<DealDetail, CrmError> {
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

    let mut numbers = TableNumbers::new(conn, NumberedTable::Deals);
    let created = insert_with_number(&mut numbers, NumberedTable::Deals.prefix(), |numbers, number| {
        numbers.conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let now = Utc::now();
            let deal = DbDeal {
                id: Uuid::new_v4(),
                company_id: user.company_id,
                deal_number: number.to_string(),
                title: req.title.clone(),
                deal_date: req.deal_date,
                valid_till: header.valid_till,
                currency: header.currency.clone().unwrap_or_else(|| "USD".to_string()),
                client_id: header.client_id,
                project_id: header.project_id,
                lead_id: header.lead_id,
                contact_id: req.contact_id,
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
                pipeline_id: req.pipeline_id,
                stage_id: req.stage_id,
                created_by: Some(user.id),
                is_deleted: false,
                created_at: now,
                updated_at: now,
            };

            diesel::insert_into(deals::table).values(&deal).execute(conn)?;
            let items = replace_deal_items(conn, deal.id, &header.items)?;
            Ok(DealDetail {
                deal,
                items,
                linked_contacts: None,
            })
        })
    })?;

    info!("Deal {} created as {}", created.deal.id, created.deal.deal_number);
    Ok(created)
}

#[derive(AsChangeset)]
#[diesel(table_name = deals)]
struct DealChanges {
    title: Option<String>,
    deal_date: Option<NaiveDate>,
    valid_till: Option<NaiveDate>,
    currency: Option<String>,
    client_id: Option<Uuid>,
    project_id: Option<Uuid>,
    lead_id: Option<Uuid>,
    contact_id: Option<Uuid>,
    calculate_tax: Option<String>,
    description: Option<String>,
    note: Option<String>,
    terms: Option<String>,
    discount: Option<bigdecimal::BigDecimal>,
    discount_type: Option<String>,
    sub_total: Option<bigdecimal::BigDecimal>,
    discount_amount: Option<bigdecimal::BigDecimal>,
    tax_amount: Option<bigdecimal::BigDecimal>,
    total: Option<bigdecimal::BigDecimal>,
    status: Option<String>,
    pipeline_id: Option<Uuid>,
    stage_id: Option<Uuid>,
    updated_at: DateTime<Utc>,
}

/// New header totals when the update changes items or discount.
pub(crate) fn recalculated_totals(
    update: &DocumentHeaderUpdate,
    stored_items: impl FnOnce() -> Result<Vec<LineItemInput>, CrmError>,
    stored_discount: f64,
    stored_discount_type: &str,
    stored_sub_total: f64,
) -> Result<Option<Totals>, CrmError> {
    if !update.touches_totals() {
        return Ok(None);
    }

    let discount = update.discount.unwrap_or(stored_discount);
    let discount_type = DiscountType::parse(
        update
            .discount_type
            .as_deref()
            .or(Some(stored_discount_type)),
    );

    let totals = match &update.items {
        Some(items) => calculate_totals(items, discount, discount_type),
        None => {
            let lines = stored_items()?;
            if lines.is_empty() {
                Totals::from_sub_total(stored_sub_total, discount, discount_type)
            } else {
                calculate_totals(&lines, discount, discount_type)
            }
        }
    };
    Ok(Some(totals))
}

fn update(conn: &mut PgConnection, tenant: Uuid, id: Uuid, req: UpdateDealRequest) -> Result<DealDetail, CrmError> {
    conn.transaction::<_, CrmError, _>(|conn| {
        let current = find_deal(conn, tenant, id)?;
        let header = req.header;

        let totals = recalculated_totals(
            &header,
            || {
                Ok(load_deal_items(conn, &[id])?
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

        let changes = DealChanges {
            title: req.title,
            deal_date: req.deal_date,
            valid_till: header.valid_till,
            currency: header.currency,
            client_id: header.client_id,
            project_id: header.project_id,
            lead_id: header.lead_id,
            contact_id: req.contact_id,
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
            pipeline_id: req.pipeline_id,
            stage_id: req.stage_id,
            updated_at: Utc::now(),
        };

        diesel::update(deals::table.filter(deals::id.eq(id)))
            .set(&changes)
            .execute(conn)?;

        if let Some(items) = &header.items {
            replace_deal_items(conn, id, items)?;
        }

        let deal = find_deal(conn, tenant, id)?;
        detail(conn, deal)
    })
}

pub async fn list_deals(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(query): Query<DocumentListQuery>,
) -> Result<Json<ApiResponse<Vec<DealDetail>>>, CrmError> {
    let rows = with_conn(&state.conn, move |conn| list(conn, user.company_id, &query)).await?;
    Ok(Json(ApiResponse::ok(rows)))
}

pub async fn get_deal(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<DealDetail>>, CrmError> {
    let deal = with_conn(&state.conn, move |conn| {
        let deal = find_deal(conn, user.company_id, id)?;
        detail(conn, deal)
    })
    .await?;
    Ok(Json(ApiResponse::ok(deal)))
}

pub async fn create_deal(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateDealRequest>,
) -> Result<(StatusCode, Json<ApiResponse<DealDetail>>), CrmError> {
    let deal = with_conn(&state.conn, move |conn| create(conn, &user, req)).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(deal))))
}

pub async fn update_deal(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateDealRequest>,
) -> Result<Json<ApiResponse<DealDetail>>, CrmError> {
    let deal = with_conn(&state.conn, move |conn| update(conn, user.company_id, id, req)).await?;
    Ok(Json(ApiResponse::ok(deal)))
}

pub async fn update_deal_status(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<DealStatusRequest>,
) -> Result<Json<ApiResponse<DealDetail>>, CrmError> {
    let status = req
        .status
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| CrmError::validation("status is required"))?;

    let update_req = UpdateDealRequest {
        header: DocumentHeaderUpdate {
            status: Some(status),
            ..Default::default()
        },
        ..Default::default()
    };
    let deal = with_conn(&state.conn, move |conn| {
        update(conn, user.company_id, id, update_req)
    })
    .await?;
    Ok(Json(ApiResponse::ok(deal).with_message("Deal status updated")))
}

pub async fn update_deal_stage(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<DealStageRequest>,
) -> Result<Json<ApiResponse<()>>, CrmError> {
    let stage_id = req
        .stage_id
        .ok_or_else(|| CrmError::validation("stage_id is required"))?;

    with_conn(&state.conn, move |conn| {
        let target = deals::table
            .filter(deals::id.eq(id))
            .filter(deals::company_id.eq(user.company_id))
            .filter(deals::is_deleted.eq(false));

        let updated = match req.pipeline_id {
            Some(pipeline_id) => diesel::update(target)
                .set((
                    deals::stage_id.eq(stage_id),
                    deals::pipeline_id.eq(pipeline_id),
                    deals::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?,
            None => diesel::update(target)
                .set((deals::stage_id.eq(stage_id), deals::updated_at.eq(Utc::now())))
                .execute(conn)?,
        };

        if updated == 0 {
            return Err(CrmError::not_found("Deal"));
        }
        Ok(())
    })
    .await?;

    Ok(Json(ApiResponse::message("Deal stage updated successfully")))
}

pub async fn delete_deal(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, CrmError> {
    with_conn(&state.conn, move |conn| {
        let deleted = diesel::update(
            deals::table
                .filter(deals::id.eq(id))
                .filter(deals::company_id.eq(user.company_id))
                .filter(deals::is_deleted.eq(false)),
        )
        .set((deals::is_deleted.eq(true), deals::updated_at.eq(Utc::now())))
        .execute(conn)?;

        if deleted == 0 {
            return Err(CrmError::not_found("Deal"));
        }
        info!("Deal {} deleted", id);
        Ok(())
    })
    .await?;

    Ok(Json(ApiResponse::message("Deal deleted successfully")))
}
