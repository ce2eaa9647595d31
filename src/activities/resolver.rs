//! Ancestor fan-out for activity references.
//!
//! An activity is stored once. The resolver copies the ids of the entities
//! above its reference onto the same row so every related timeline can
//! filter on its own column.

use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use super::types::{Reference, ReferenceType};
use crate::core::shared::error::CrmError;
use crate::core::shared::schema::{contacts, deals, leads};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Ancestors {
    pub lead_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub deal_id: Option<Uuid>,
}

/// Link columns of a deal as stored at lookup time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DealLinks {
    pub company_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub lead_id: Option<Uuid>,
}

/// A looked-up row together with the tenant that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owned<T> {
    pub tenant_id: Uuid,
    pub row: T,
}

/// Read-only lookups the resolver needs. A missing row is `Ok(None)`.
pub trait AncestorSource {
    fn deal_links(&mut self, deal_id: Uuid) -> Result<Option<Owned<DealLinks>>, CrmError>;
    fn lead_company(&mut self, lead_id: Uuid) -> Result<Option<Owned<Option<Uuid>>>, CrmError>;
    fn contact_company(&mut self, contact_id: Uuid) -> Result<Option<Owned<Option<Uuid>>>, CrmError>;
}

impl AncestorSource for PgConnection {
    fn deal_links(&mut self, deal_id: Uuid) -> Result<Option<Owned<DealLinks>>, CrmError> {
        let row = deals::table
            .filter(deals::id.eq(deal_id))
            .select((deals::company_id, deals::contact_id, deals::lead_id))
            .first::<(Uuid, Option<Uuid>, Option<Uuid>)>(self)
            .optional()
            .map_err(|e| CrmError::Storage(e.to_string()))?;

        Ok(row.map(|(tenant_id, contact_id, lead_id)| Owned {
            tenant_id,
            row: DealLinks {
                company_id: Some(tenant_id),
                contact_id,
                lead_id,
            },
        }))
    }

    fn lead_company(&mut self, lead_id: Uuid) -> Result<Option<Owned<Option<Uuid>>>, CrmError> {
        leads::table
            .filter(leads::id.eq(lead_id))
            .select((leads::tenant_id, leads::company_id))
            .first::<(Uuid, Option<Uuid>)>(self)
            .optional()
            .map(|row| row.map(|(tenant_id, row)| Owned { tenant_id, row }))
            .map_err(|e| CrmError::Storage(e.to_string()))
    }

    fn contact_company(&mut self, contact_id: Uuid) -> Result<Option<Owned<Option<Uuid>>>, CrmError> {
        contacts::table
            .filter(contacts::id.eq(contact_id))
            .select((contacts::tenant_id, contacts::company_id))
            .first::<(Uuid, Option<Uuid>)>(self)
            .optional()
            .map(|row| row.map(|(tenant_id, row)| Owned { tenant_id, row }))
            .map_err(|e| CrmError::Storage(e.to_string()))
    }
}

/// A row owned by another tenant reads as not found; an absent row is
/// simply no ancestor.
fn owned_by<T>(found: Option<Owned<T>>, tenant: Uuid, what: &str) -> Result<Option<T>, CrmError> {
    match found {
        Some(owned) if owned.tenant_id != tenant => Err(CrmError::not_found(what)),
        Some(owned) => Ok(Some(owned.row)),
        None => Ok(None),
    }
}

pub fn resolve_ancestors<S>(
    source: &mut S,
    tenant: Uuid,
    reference: Reference,
) -> Result<Ancestors, CrmError>
where
    S: AncestorSource + ?Sized,
{
    let mut ancestors = Ancestors::default();

    match reference.kind {
        ReferenceType::Deal => {
            ancestors.deal_id = Some(reference.id);
            if let Some(links) = owned_by(source.deal_links(reference.id)?, tenant, "Deal")? {
                ancestors.company_id = links.company_id;
                ancestors.contact_id = links.contact_id;
                ancestors.lead_id = links.lead_id;
            }
        }
        ReferenceType::Lead => {
            ancestors.lead_id = Some(reference.id);
            ancestors.company_id =
                owned_by(source.lead_company(reference.id)?, tenant, "Lead")?.flatten();
        }
        ReferenceType::Contact => {
            ancestors.contact_id = Some(reference.id);
            ancestors.company_id =
                owned_by(source.contact_company(reference.id)?, tenant, "Contact")?.flatten();
        }
        ReferenceType::Company => {
            ancestors.company_id = Some(reference.id);
        }
    }

    Ok(ancestors)
}
