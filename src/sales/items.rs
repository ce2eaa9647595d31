use bigdecimal::BigDecimal;
use diesel::prelude::*;
use std::collections::HashMap;
use uuid::Uuid;

use super::totals::{normalize_unit, LineItemInput};
use super::types::{DbDealItem, DbOfferItem};
use crate::core::shared::schema::{deal_items, offer_items};
use crate::core::shared::utils::{bd, bd_to_f64};

/// Line item with every column resolved, ready to attach to a header.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedItem {
    pub item_name: Option<String>,
    pub description: Option<String>,
    pub quantity: f64,
    pub unit: String,
    pub unit_price: f64,
    pub tax_rate: f64,
    pub amount: f64,
    pub sort_order: i32,
}

pub fn prepare_items(items: &[LineItemInput]) -> Vec<PreparedItem> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| PreparedItem {
            item_name: item.item_name.clone(),
            description: item.description.clone(),
            quantity: item.quantity(),
            unit: normalize_unit(item.unit.as_deref().unwrap_or_default())
                .as_str()
                .to_string(),
            unit_price: item.unit_price(),
            tax_rate: item.tax_rate(),
            amount: item.effective_amount(),
            sort_order: i32::try_from(i).unwrap_or(i32::MAX),
        })
        .collect()
}

impl PreparedItem {
    fn into_deal_item(self, deal_id: Uuid) -> DbDealItem {
        DbDealItem {
            id: Uuid::new_v4(),
            deal_id,
            item_name: self.item_name,
            description: self.description,
            quantity: bd(self.quantity),
            unit: self.unit,
            unit_price: bd(self.unit_price),
            tax_rate: bd(self.tax_rate),
            amount: bd(self.amount),
            sort_order: self.sort_order,
        }
    }

    fn into_offer_item(self, offer_id: Uuid) -> DbOfferItem {
        DbOfferItem {
            id: Uuid::new_v4(),
            offer_id,
            item_name: self.item_name,
            description: self.description,
            quantity: bd(self.quantity),
            unit: self.unit,
            unit_price: bd(self.unit_price),
            tax_rate: bd(self.tax_rate),
            amount: bd(self.amount),
            sort_order: self.sort_order,
        }
    }
}

/// Stored items as totals input; the stored amount is kept as an override.
pub fn stored_line(amount: &BigDecimal) -> LineItemInput {
    LineItemInput {
        amount: Some(bd_to_f64(amount)),
        ..Default::default()
    }
}

/// Deletes every item of the deal and inserts the new set. Run inside a
/// transaction so an interrupted replace never leaves the deal empty.
pub fn replace_deal_items(
    conn: &mut PgConnection,
    deal_id: Uuid,
    items: &[LineItemInput],
) -> QueryResult<Vec<DbDealItem>> {
    diesel::delete(deal_items::table.filter(deal_items::deal_id.eq(deal_id))).execute(conn)?;

    let rows: Vec<DbDealItem> = prepare_items(items)
        .into_iter()
        .map(|p| p.into_deal_item(deal_id))
        .collect();
    if !rows.is_empty() {
        diesel::insert_into(deal_items::table)
            .values(&rows)
            .execute(conn)?;
    }
    Ok(rows)
}

pub fn replace_offer_items(
    conn: &mut PgConnection,
    offer_id: Uuid,
    items: &[LineItemInput],
) -> QueryResult<Vec<DbOfferItem>> {
    diesel::delete(offer_items::table.filter(offer_items::offer_id.eq(offer_id))).execute(conn)?;

    let rows: Vec<DbOfferItem> = prepare_items(items)
        .into_iter()
        .map(|p| p.into_offer_item(offer_id))
        .collect();
    if !rows.is_empty() {
        diesel::insert_into(offer_items::table)
            .values(&rows)
            .execute(conn)?;
    }
    Ok(rows)
}

pub fn load_deal_items(
    conn: &mut PgConnection,
    deal_ids: &[Uuid],
) -> QueryResult<HashMap<Uuid, Vec<DbDealItem>>> {
    let rows: Vec<DbDealItem> = deal_items::table
        .filter(deal_items::deal_id.eq_any(deal_ids))
        .order((deal_items::deal_id, deal_items::sort_order))
        .select(DbDealItem::as_select())
        .load(conn)?;

    let mut grouped: HashMap<Uuid, Vec<DbDealItem>> = HashMap::new();
    for row in rows {
        grouped.entry(row.deal_id).or_default().push(row);
    }
    Ok(grouped)
}

pub fn load_offer_items(
    conn: &mut PgConnection,
    offer_ids: &[Uuid],
) -> QueryResult<HashMap<Uuid, Vec<DbOfferItem>>> {
    let rows: Vec<DbOfferItem> = offer_items::table
        .filter(offer_items::offer_id.eq_any(offer_ids))
        .order((offer_items::offer_id, offer_items::sort_order))
        .select(DbOfferItem::as_select())
        .load(conn)?;

    let mut grouped: HashMap<Uuid, Vec<DbOfferItem>> = HashMap::new();
    for row in rows {
        grouped.entry(row.offer_id).or_default().push(row);
    }
    Ok(grouped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_items_resolves_defaults() {
        let items = vec![
            LineItemInput {
                item_name: Some("Consulting".into()),
                unit: Some("hrs per hour".into()),
                quantity: Some(3.0),
                unit_price: Some(100.0),
                tax_rate: Some(10.0),
                ..Default::default()
            },
            LineItemInput {
                unit_price: Some(12.5),
                ..Default::default()
            },
        ];

        let prepared = prepare_items(&items);
        assert_eq!(prepared[0].unit, "Hours");
        assert_eq!(prepared[0].amount, 330.0);
        assert_eq!(prepared[0].sort_order, 0);
        assert_eq!(prepared[1].unit, "Pcs");
        assert_eq!(prepared[1].quantity, 1.0);
        assert_eq!(prepared[1].amount, 12.5);
        assert_eq!(prepared[1].sort_order, 1);
    }

    #[test]
    fn test_stored_line_keeps_amount() {
        let line = stored_line(&bd(110.0));
        assert_eq!(line.effective_amount(), 110.0);
    }
}
