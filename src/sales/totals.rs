use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::core::shared::utils::round_money;

/// Numbers arrive from forms as either JSON numbers or numeric strings.
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => Some(n),
        Some(Raw::Text(s)) => s.trim().parse::<f64>().ok(),
        None => None,
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineItemInput {
    pub item_name: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub unit_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub tax_rate: Option<f64>,
    /// Caller-supplied amount; replaces the computed line amount when set.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub amount: Option<f64>,
}

impl LineItemInput {
    pub fn quantity(&self) -> f64 {
        self.quantity.unwrap_or(1.0)
    }

    pub fn unit_price(&self) -> f64 {
        self.unit_price.unwrap_or(0.0)
    }

    pub fn tax_rate(&self) -> f64 {
        self.tax_rate.unwrap_or(0.0)
    }

    /// quantity × unit price, plus tax when the rate is positive.
    pub fn line_amount(&self) -> f64 {
        let mut amount = self.quantity() * self.unit_price();
        if self.tax_rate() > 0.0 {
            amount += amount * self.tax_rate() / 100.0;
        }
        amount
    }

    pub fn effective_amount(&self) -> f64 {
        self.amount.unwrap_or_else(|| self.line_amount())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscountType {
    #[default]
    #[serde(rename = "%")]
    Percent,
    #[serde(rename = "flat")]
    Flat,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Percent => "%",
            Self::Flat => "flat",
        }
    }

    /// Only `%` means a percentage; any other value is a flat amount.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("%") => Self::Percent,
            Some(_) => Self::Flat,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    pub sub_total: f64,
    pub discount_amount: f64,
    /// Header tax is not modelled; tax is folded into line amounts.
    pub tax_amount: f64,
    pub total: f64,
}

impl Totals {
    /// Rounds both inputs to cents and derives `total` from the rounded
    /// values, so the stored header always satisfies
    /// `total = sub_total - discount_amount`.
    fn rounded(sub_total: f64, discount_amount: f64) -> Self {
        let sub_total = round_money(sub_total);
        let discount_amount = round_money(discount_amount);
        Self {
            sub_total,
            discount_amount,
            tax_amount: 0.0,
            total: round_money(sub_total - discount_amount),
        }
    }

    pub fn from_sub_total(sub_total: f64, discount: f64, discount_type: DiscountType) -> Self {
        let sub_total = round_money(sub_total);
        let discount_amount = match discount_type {
            DiscountType::Percent => sub_total * discount / 100.0,
            DiscountType::Flat => discount,
        };

        Self::rounded(sub_total, discount_amount)
    }

    /// Header values supplied directly when a document has no items.
    /// A missing sub total mirrors the total; the gap between the two is
    /// booked as discount.
    pub fn from_supplied(sub_total: Option<f64>, total: Option<f64>) -> Self {
        let total = round_money(total.or(sub_total).unwrap_or(0.0));
        let sub_total = sub_total.map(round_money).unwrap_or(total);

        Self::rounded(sub_total, sub_total - total)
    }
}

pub fn calculate_totals(items: &[LineItemInput], discount: f64, discount_type: DiscountType) -> Totals {
    let sub_total: f64 = items.iter().map(LineItemInput::effective_amount).sum();
    Totals::from_sub_total(sub_total, discount, discount_type)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    #[default]
    Pcs,
    Kg,
    Hours,
    Days,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pcs => "Pcs",
            Self::Kg => "Kg",
            Self::Hours => "Hours",
            Self::Days => "Days",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn normalize_unit(unit: &str) -> Unit {
    let unit = unit.trim().to_lowercase();
    if unit.contains("pc") || unit.contains("piece") {
        Unit::Pcs
    } else if unit.contains("kg") || unit.contains("kilogram") {
        Unit::Kg
    } else if unit.contains("hour") {
        Unit::Hours
    } else if unit.contains("day") {
        Unit::Days
    } else {
        Unit::Pcs
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DealStatus {
    #[default]
    Draft,
    Sent,
    Accepted,
    Declined,
    Expired,
}

impl DealStatus {
    pub const ALL: [DealStatus; 5] = [
        Self::Draft,
        Self::Sent,
        Self::Accepted,
        Self::Declined,
        Self::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Sent => "Sent",
            Self::Accepted => "Accepted",
            Self::Declined => "Declined",
            Self::Expired => "Expired",
        }
    }
}

impl DealStatus {
    /// Case-insensitive match against the known statuses.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(name))
    }
}

pub fn normalize_deal_status(status: &str) -> DealStatus {
    DealStatus::from_name(status).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::utils::bd;

    fn item(quantity: f64, unit_price: f64, tax_rate: f64) -> LineItemInput {
        LineItemInput {
            quantity: Some(quantity),
            unit_price: Some(unit_price),
            tax_rate: Some(tax_rate),
            ..Default::default()
        }
    }

    #[test]
    fn test_percent_discount() {
        let totals = calculate_totals(&[item(2.0, 10.0, 0.0)], 10.0, DiscountType::Percent);
        assert_eq!(totals.sub_total, 20.0);
        assert_eq!(totals.discount_amount, 2.0);
        assert_eq!(totals.total, 18.0);
        assert_eq!(totals.tax_amount, 0.0);
    }

    #[test]
    fn test_flat_discount_with_line_tax() {
        let line = item(1.0, 100.0, 10.0);
        assert_eq!(line.line_amount(), 110.0);

        let totals = calculate_totals(&[line], 5.0, DiscountType::Flat);
        assert_eq!(totals.sub_total, 110.0);
        assert_eq!(totals.discount_amount, 5.0);
        assert_eq!(totals.total, 105.0);
        assert_eq!(totals.tax_amount, 0.0);
    }

    #[test]
    fn test_header_rounds_to_cents_and_stays_consistent() {
        let totals = calculate_totals(&[item(1.0, 1.15, 5.0)], 50.0, DiscountType::Percent);
        assert_eq!(totals.sub_total, 1.21);

        let (sub, disc, total) = (bd(totals.sub_total), bd(totals.discount_amount), bd(totals.total));
        assert_eq!(total, sub - disc);
    }

    #[test]
    fn test_supplied_header_rounds_to_cents() {
        let totals = Totals::from_supplied(Some(10.005), Some(3.333));
        assert_eq!(totals.sub_total, 10.01);
        assert_eq!(totals.discount_amount, 6.68);
        assert_eq!(totals.total, 3.33);
        assert_eq!(bd(totals.total), bd(totals.sub_total) - bd(totals.discount_amount));
    }

    #[test]
    fn test_explicit_amount_wins() {
        let mut overridden = item(3.0, 10.0, 0.0);
        overridden.amount = Some(25.0);
        let mut zeroed = item(1.0, 50.0, 0.0);
        zeroed.amount = Some(0.0);

        let totals = calculate_totals(&[overridden, zeroed, item(1.0, 5.0, 0.0)], 0.0, DiscountType::Flat);
        assert_eq!(totals.sub_total, 30.0);
        assert_eq!(totals.total, 30.0);
    }

    #[test]
    fn test_missing_quantity_counts_as_one() {
        let line = LineItemInput {
            unit_price: Some(40.0),
            ..Default::default()
        };
        assert_eq!(line.line_amount(), 40.0);
    }

    #[test]
    fn test_empty_items() {
        let totals = calculate_totals(&[], 10.0, DiscountType::Percent);
        assert_eq!(totals, Totals::default());
    }

    #[test]
    fn test_supplied_header_values() {
        let totals = Totals::from_supplied(None, Some(250.0));
        assert_eq!((totals.sub_total, totals.discount_amount, totals.total), (250.0, 0.0, 250.0));

        let totals = Totals::from_supplied(Some(300.0), Some(270.0));
        assert_eq!(totals.discount_amount, 30.0);
        assert_eq!(totals.total, totals.sub_total - totals.discount_amount);

        let totals = Totals::from_supplied(Some(80.0), None);
        assert_eq!(totals.total, 80.0);
    }

    #[test]
    fn test_lenient_numbers_in_json() {
        let line: LineItemInput =
            serde_json::from_str(r#"{"quantity": "2", "unit_price": 10, "tax_rate": "n/a"}"#).unwrap();
        assert_eq!(line.quantity, Some(2.0));
        assert_eq!(line.unit_price, Some(10.0));
        assert_eq!(line.tax_rate, None);
        assert_eq!(line.amount, None);
    }

    #[test]
    fn test_discount_type_parse() {
        assert_eq!(DiscountType::parse(Some("%")), DiscountType::Percent);
        assert_eq!(DiscountType::parse(None), DiscountType::Percent);
        assert_eq!(DiscountType::parse(Some("flat")), DiscountType::Flat);
        assert_eq!(DiscountType::parse(Some("fixed")), DiscountType::Flat);
    }

    #[test]
    fn test_normalize_unit() {
        assert_eq!(normalize_unit("Piece"), Unit::Pcs);
        assert_eq!(normalize_unit("KG"), Unit::Kg);
        assert_eq!(normalize_unit(""), Unit::Pcs);
        assert_eq!(normalize_unit("banana"), Unit::Pcs);
        assert_eq!(normalize_unit("Hours"), Unit::Hours);
        assert_eq!(normalize_unit(" working days "), Unit::Days);
        assert_eq!(normalize_unit("kilograms"), Unit::Kg);
    }

    #[test]
    fn test_normalize_deal_status() {
        assert_eq!(normalize_deal_status("accepted"), DealStatus::Accepted);
        assert_eq!(normalize_deal_status(" SENT "), DealStatus::Sent);
        assert_eq!(normalize_deal_status(""), DealStatus::Draft);
        assert_eq!(normalize_deal_status("won"), DealStatus::Draft);
    }
}
