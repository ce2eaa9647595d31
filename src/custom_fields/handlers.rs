use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::types::{
    CustomFieldDetail, CustomFieldListQuery, CustomFieldRequest, DbCustomField, FieldDefinition,
    NewFieldEnabledIn, NewFieldOption, NewFieldVisibility,
};
use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::error::{ApiResponse, CrmError};
use crate::core::shared::schema::{
    custom_field_enabled_in, custom_field_options, custom_field_visibility, custom_fields,
};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::with_conn;

fn group<T>(rows: Vec<(Uuid, T)>) -> HashMap<Uuid, Vec<T>> {
    let mut grouped: HashMap<Uuid, Vec<T>> = HashMap::new();
    for (owner, value) in rows {
        grouped.entry(owner).or_default().push(value);
    }
    grouped
}

/// Attaches child lists to each field with three queries in total.
fn with_children(
    conn: &mut PgConnection,
    fields: Vec<DbCustomField>,
) -> QueryResult<Vec<CustomFieldDetail>> {
    let ids: Vec<Uuid> = fields.iter().map(|f| f.id).collect();

    let mut options = group(
        custom_field_options::table
            .filter(custom_field_options::custom_field_id.eq_any(&ids))
            .order(custom_field_options::display_order.asc())
            .select((
                custom_field_options::custom_field_id,
                custom_field_options::option_value,
            ))
            .load::<(Uuid, String)>(conn)?,
    );
    let mut visibility = group(
        custom_field_visibility::table
            .filter(custom_field_visibility::custom_field_id.eq_any(&ids))
            .select((
                custom_field_visibility::custom_field_id,
                custom_field_visibility::visibility,
            ))
            .load::<(Uuid, String)>(conn)?,
    );
    let mut enabled_in = group(
        custom_field_enabled_in::table
            .filter(custom_field_enabled_in::custom_field_id.eq_any(&ids))
            .select((
                custom_field_enabled_in::custom_field_id,
                custom_field_enabled_in::enabled_in,
            ))
            .load::<(Uuid, String)>(conn)?,
    );

    Ok(fields
        .into_iter()
        .map(|field| CustomFieldDetail {
            options: options.remove(&field.id).unwrap_or_default(),
            visibility: visibility.remove(&field.id).unwrap_or_default(),
            enabled_in: enabled_in.remove(&field.id).unwrap_or_default(),
            field,
        })
        .collect())
}

fn find_field(conn: &mut PgConnection, tenant: Uuid, id: Uuid) -> Result<DbCustomField, CrmError> {
    custom_fields::table
        .filter(custom_fields::id.eq(id))
        .filter(custom_fields::company_id.eq(tenant))
        .select(DbCustomField::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| CrmError::not_found("Custom field"))
}

fn detail(conn: &mut PgConnection, field: DbCustomField) -> Result<CustomFieldDetail, CrmError> {
    with_children(conn, vec![field])?
        .pop()
        .ok_or_else(|| CrmError::Internal("custom field vanished while loading".into()))
}

/// Position of an option in the submitted list; saturates past `i32::MAX`.
fn display_order(index: usize) -> i32 {
    i32::try_from(index).unwrap_or(i32::MAX)
}

/// Delete-all-then-insert-all for the three child lists.
fn replace_children(conn: &mut PgConnection, field_id: Uuid, def: &FieldDefinition) -> QueryResult<()> {
    diesel::delete(
        custom_field_options::table.filter(custom_field_options::custom_field_id.eq(field_id)),
    )
    .execute(conn)?;
    diesel::delete(
        custom_field_visibility::table.filter(custom_field_visibility::custom_field_id.eq(field_id)),
    )
    .execute(conn)?;
    diesel::delete(
        custom_field_enabled_in::table.filter(custom_field_enabled_in::custom_field_id.eq(field_id)),
    )
    .execute(conn)?;

    let options: Vec<NewFieldOption> = def
        .options
        .iter()
        .enumerate()
        .map(|(i, value)| NewFieldOption {
            id: Uuid::new_v4(),
            custom_field_id: field_id,
            option_value: value.clone(),
            display_order: display_order(i),
        })
        .collect();
    let visibility: Vec<NewFieldVisibility> = def
        .visibility
        .iter()
        .map(|v| NewFieldVisibility {
            id: Uuid::new_v4(),
            custom_field_id: field_id,
            visibility: v.clone(),
        })
        .collect();
    let enabled_in: Vec<NewFieldEnabledIn> = def
        .enabled_in
        .iter()
        .map(|e| NewFieldEnabledIn {
            id: Uuid::new_v4(),
            custom_field_id: field_id,
            enabled_in: e.clone(),
        })
        .collect();

    if !options.is_empty() {
        diesel::insert_into(custom_field_options::table)
            .values(&options)
            .execute(conn)?;
    }
    if !visibility.is_empty() {
        diesel::insert_into(custom_field_visibility::table)
            .values(&visibility)
            .execute(conn)?;
    }
    if !enabled_in.is_empty() {
        diesel::insert_into(custom_field_enabled_in::table)
            .values(&enabled_in)
            .execute(conn)?;
    }
    Ok(())
}

pub async fn list_custom_fields(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(query): Query<CustomFieldListQuery>,
) -> Result<Json<ApiResponse<Vec<CustomFieldDetail>>>, CrmError> {
    let tenant = user.company_id;
    let module = query.module.filter(|m| !m.trim().is_empty());

    let fields = with_conn(&state.conn, move |conn| {
        let mut q = custom_fields::table
            .filter(custom_fields::company_id.eq(tenant))
            .into_boxed();
        if let Some(module) = module {
            q = q.filter(custom_fields::module.eq(module));
        }
        let rows = q
            .order(custom_fields::created_at.asc())
            .select(DbCustomField::as_select())
            .load(conn)?;
        Ok(with_children(conn, rows)?)
    })
    .await?;

    Ok(Json(ApiResponse::ok(fields)))
}

pub async fn get_custom_field(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<CustomFieldDetail>>, CrmError> {
    let field = with_conn(&state.conn, move |conn| {
        let field = find_field(conn, user.company_id, id)?;
        detail(conn, field)
    })
    .await?;
    Ok(Json(ApiResponse::ok(field)))
}

pub async fn create_custom_field(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CustomFieldRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CustomFieldDetail>>), CrmError> {
    let def = req.validate()?;

    let field = with_conn(&state.conn, move |conn| {
        conn.transaction::<_, CrmError, _>(|conn| {
            let row = DbCustomField {
                id: Uuid::new_v4(),
                company_id: user.company_id,
                name: def.name.clone(),
                label: def.label.clone(),
                field_type: def.field_type.clone(),
                module: def.module.clone(),
                required: def.required,
                placeholder: def.placeholder.clone(),
                help_text: def.help_text.clone(),
                created_at: Utc::now(),
            };
            let field = diesel::insert_into(custom_fields::table)
                .values(&row)
                .returning(DbCustomField::as_returning())
                .get_result(conn)?;
            replace_children(conn, field.id, &def)?;
            detail(conn, field)
        })
    })
    .await?;

    info!("Created custom field {} ({}) on {}", field.field.name, field.field.id, field.field.module);
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(field))))
}

pub async fn update_custom_field(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<CustomFieldRequest>,
) -> Result<Json<ApiResponse<CustomFieldDetail>>, CrmError> {
    let def = req.validate()?;

    let field = with_conn(&state.conn, move |conn| {
        conn.transaction::<_, CrmError, _>(|conn| {
            find_field(conn, user.company_id, id)?;
            let field = diesel::update(custom_fields::table.filter(custom_fields::id.eq(id)))
                .set((
                    custom_fields::name.eq(&def.name),
                    custom_fields::label.eq(&def.label),
                    custom_fields::field_type.eq(&def.field_type),
                    custom_fields::module.eq(&def.module),
                    custom_fields::required.eq(def.required),
                    custom_fields::placeholder.eq(&def.placeholder),
                    custom_fields::help_text.eq(&def.help_text),
                ))
                .returning(DbCustomField::as_returning())
                .get_result(conn)?;
            replace_children(conn, id, &def)?;
            detail(conn, field)
        })
    })
    .await?;

    Ok(Json(ApiResponse::ok(field)))
}

pub async fn delete_custom_field(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, CrmError> {
    with_conn(&state.conn, move |conn| {
        let deleted = diesel::delete(
            custom_fields::table
                .filter(custom_fields::id.eq(id))
                .filter(custom_fields::company_id.eq(user.company_id)),
        )
        .execute(conn)?;
        if deleted == 0 {
            return Err(CrmError::not_found("Custom field"));
        }
        Ok(())
    })
    .await?;

    info!("Deleted custom field {}", id);
    Ok(Json(ApiResponse::message("Custom field deleted successfully")))
}
