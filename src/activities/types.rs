use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::core::shared::error::CrmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Call,
    Meeting,
    Note,
    Email,
    Task,
    Comment,
}

impl ActivityType {
    pub const ALL: [ActivityType; 6] = [
        Self::Call,
        Self::Meeting,
        Self::Note,
        Self::Email,
        Self::Task,
        Self::Comment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Meeting => "meeting",
            Self::Note => "note",
            Self::Email => "email",
            Self::Task => "task",
            Self::Comment => "comment",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = CrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                CrmError::validation(format!(
                    "Invalid activity type: {s}. Allowed: {}",
                    join(Self::ALL.iter().map(|t| t.as_str()))
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceType {
    Lead,
    Contact,
    Company,
    Deal,
}

impl ReferenceType {
    pub const ALL: [ReferenceType; 4] = [Self::Lead, Self::Contact, Self::Company, Self::Deal];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lead => "lead",
            Self::Contact => "contact",
            Self::Company => "company",
            Self::Deal => "deal",
        }
    }
}

impl fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferenceType {
    type Err = CrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                CrmError::validation(format!(
                    "Invalid reference type: {s}. Allowed: {}",
                    join(Self::ALL.iter().map(|t| t.as_str()))
                ))
            })
    }
}

fn join<'a>(values: impl Iterator<Item = &'a str>) -> String {
    values.collect::<Vec<_>>().join(", ")
}

/// Polymorphic pointer to the entity an activity is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub kind: ReferenceType,
    pub id: Uuid,
}

impl Reference {
    pub fn new(kind: ReferenceType, id: Uuid) -> Self {
        Self { kind, id }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateActivityRequest {
    #[serde(rename = "type")]
    pub activity_type: Option<String>,
    pub description: Option<String>,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub deal_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub lead_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub is_pinned: Option<bool>,
    pub follow_up_at: Option<DateTime<Utc>>,
    pub meeting_link: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateActivityRequest {
    pub description: Option<String>,
    pub follow_up_at: Option<DateTime<Utc>>,
    pub meeting_link: Option<String>,
}

/// How `POST /activities` treats incomplete or unknown input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreationPolicy {
    /// Every field must be present and exact.
    Strict,
    /// Lowercases the type, infers the reference from entity ids and
    /// falls back to `note` for unknown types that carry a description.
    #[default]
    Permissive,
}

/// Validated input for a single activity insert.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityDraft {
    pub activity_type: ActivityType,
    pub description: Option<String>,
    pub reference: Reference,
    pub is_pinned: bool,
    pub follow_up_at: Option<DateTime<Utc>>,
    pub meeting_link: Option<String>,
}

impl CreationPolicy {
    pub fn prepare(self, req: CreateActivityRequest) -> Result<ActivityDraft, CrmError> {
        match self {
            Self::Strict => prepare_strict(req),
            Self::Permissive => prepare_permissive(req),
        }
    }
}

fn prepare_strict(req: CreateActivityRequest) -> Result<ActivityDraft, CrmError> {
    let (Some(kind), Some(reference_type), Some(reference_id)) =
        (req.activity_type.as_deref(), req.reference_type.as_deref(), req.reference_id)
    else {
        return Err(CrmError::validation("Missing required fields"));
    };

    let activity_type = kind.parse::<ActivityType>()?;
    let reference = Reference::new(reference_type.parse()?, reference_id);

    Ok(ActivityDraft {
        activity_type,
        description: req.description,
        reference,
        is_pinned: req.is_pinned.unwrap_or(false),
        follow_up_at: req.follow_up_at,
        meeting_link: req.meeting_link,
    })
}

fn prepare_permissive(req: CreateActivityRequest) -> Result<ActivityDraft, CrmError> {
    let kind = req.activity_type.as_deref().map(str::to_lowercase);

    let (reference_type, reference_id) = match (req.reference_type.clone(), req.reference_id) {
        (Some(t), Some(id)) => (Some(t), Some(id)),
        _ => match infer_reference(&req) {
            Some(r) => (Some(r.kind.as_str().to_string()), Some(r.id)),
            None => (req.reference_type.clone(), req.reference_id),
        },
    };

    let (Some(kind), Some(reference_type), Some(reference_id)) = (kind, reference_type, reference_id)
    else {
        return Err(CrmError::validation(
            "Missing required fields (type, reference_type, reference_id)",
        ));
    };

    let has_description = req.description.as_deref().is_some_and(|d| !d.is_empty());
    let activity_type = match kind.parse::<ActivityType>() {
        Ok(t) => t,
        Err(_) if has_description => ActivityType::Note,
        Err(e) => return Err(e),
    };
    let reference = Reference::new(reference_type.parse()?, reference_id);

    Ok(ActivityDraft {
        activity_type,
        description: req.description,
        reference,
        is_pinned: req.is_pinned.unwrap_or(false),
        follow_up_at: req.follow_up_at,
        meeting_link: req.meeting_link,
    })
}

/// First entity id present, in order deal, contact, lead, company.
fn infer_reference(req: &CreateActivityRequest) -> Option<Reference> {
    [
        (ReferenceType::Deal, req.deal_id),
        (ReferenceType::Contact, req.contact_id),
        (ReferenceType::Lead, req.lead_id),
        (ReferenceType::Company, req.company_id),
    ]
    .into_iter()
    .find_map(|(kind, id)| id.map(|id| Reference::new(kind, id)))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityListQuery {
    pub company_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub deal_id: Option<Uuid>,
    pub lead_id: Option<Uuid>,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
}

/// The single dimension an activity listing is narrowed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityFilter {
    Company(Uuid),
    Contact(Uuid),
    Deal(Uuid),
    Lead(Uuid),
    Reference(Reference),
    All,
}

impl TryFrom<ActivityListQuery> for ActivityFilter {
    type Error = CrmError;

    fn try_from(q: ActivityListQuery) -> Result<Self, Self::Error> {
        if let Some(id) = q.company_id {
            return Ok(Self::Company(id));
        }
        if let Some(id) = q.contact_id {
            return Ok(Self::Contact(id));
        }
        if let Some(id) = q.deal_id {
            return Ok(Self::Deal(id));
        }
        if let Some(id) = q.lead_id {
            return Ok(Self::Lead(id));
        }
        match (q.reference_type.as_deref(), q.reference_id) {
            (Some(kind), Some(id)) => Ok(Self::Reference(Reference::new(kind.parse()?, id))),
            _ => Ok(Self::All),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: &str, description: Option<&str>) -> CreateActivityRequest {
        CreateActivityRequest {
            activity_type: Some(kind.to_string()),
            description: description.map(String::from),
            reference_type: Some("deal".to_string()),
            reference_id: Some(Uuid::new_v4()),
            ..Default::default()
        }
    }

    #[test]
    fn test_type_taxonomy() {
        assert_eq!("comment".parse::<ActivityType>().unwrap(), ActivityType::Comment);
        assert!("sms".parse::<ActivityType>().is_err());
        assert!("Call".parse::<ActivityType>().is_err());
        assert!("account".parse::<ReferenceType>().is_err());
    }

    #[test]
    fn test_unknown_type_without_description_is_rejected() {
        for policy in [CreationPolicy::Strict, CreationPolicy::Permissive] {
            let err = policy.prepare(request("sms", None)).unwrap_err();
            assert!(matches!(err, CrmError::Validation(_)));
        }
        let err = CreationPolicy::Permissive
            .prepare(request("sms", Some("")))
            .unwrap_err();
        assert!(matches!(err, CrmError::Validation(_)));
    }

    #[test]
    fn test_permissive_whitespace_description_still_counts() {
        let draft = CreationPolicy::Permissive
            .prepare(request("sms", Some("   ")))
            .unwrap();
        assert_eq!(draft.activity_type, ActivityType::Note);
        assert_eq!(draft.description.as_deref(), Some("   "));
    }

    #[test]
    fn test_permissive_coerces_unknown_type_to_note() {
        let draft = CreationPolicy::Permissive
            .prepare(request("sms", Some("Called back")))
            .unwrap();
        assert_eq!(draft.activity_type, ActivityType::Note);
        assert_eq!(draft.description.as_deref(), Some("Called back"));
    }

    #[test]
    fn test_strict_rejects_unknown_type_even_with_description() {
        let err = CreationPolicy::Strict
            .prepare(request("sms", Some("Called back")))
            .unwrap_err();
        assert!(matches!(err, CrmError::Validation(_)));
    }

    #[test]
    fn test_permissive_lowercases_type() {
        let draft = CreationPolicy::Permissive.prepare(request("EMAIL", None)).unwrap();
        assert_eq!(draft.activity_type, ActivityType::Email);
        assert!(CreationPolicy::Strict.prepare(request("EMAIL", None)).is_err());
    }

    #[test]
    fn test_permissive_infers_reference_in_order() {
        let deal = Uuid::new_v4();
        let contact = Uuid::new_v4();
        let company = Uuid::new_v4();
        let req = CreateActivityRequest {
            activity_type: Some("call".into()),
            contact_id: Some(contact),
            deal_id: Some(deal),
            company_id: Some(company),
            ..Default::default()
        };
        let draft = CreationPolicy::Permissive.prepare(req.clone()).unwrap();
        assert_eq!(draft.reference, Reference::new(ReferenceType::Deal, deal));

        let req = CreateActivityRequest {
            deal_id: None,
            ..req
        };
        let draft = CreationPolicy::Permissive.prepare(req.clone()).unwrap();
        assert_eq!(draft.reference, Reference::new(ReferenceType::Contact, contact));

        assert!(CreationPolicy::Strict.prepare(req).is_err());
    }

    #[test]
    fn test_missing_reference_is_rejected() {
        let req = CreateActivityRequest {
            activity_type: Some("call".into()),
            ..Default::default()
        };
        assert!(CreationPolicy::Permissive.prepare(req).is_err());
    }

    #[test]
    fn test_filter_precedence() {
        let company = Uuid::new_v4();
        let deal = Uuid::new_v4();
        let lead = Uuid::new_v4();

        let q = ActivityListQuery {
            company_id: Some(company),
            deal_id: Some(deal),
            lead_id: Some(lead),
            ..Default::default()
        };
        assert_eq!(ActivityFilter::try_from(q).unwrap(), ActivityFilter::Company(company));

        let q = ActivityListQuery {
            deal_id: Some(deal),
            lead_id: Some(lead),
            reference_type: Some("lead".into()),
            reference_id: Some(lead),
            ..Default::default()
        };
        assert_eq!(ActivityFilter::try_from(q).unwrap(), ActivityFilter::Deal(deal));

        let q = ActivityListQuery {
            reference_type: Some("lead".into()),
            reference_id: Some(lead),
            ..Default::default()
        };
        assert_eq!(
            ActivityFilter::try_from(q).unwrap(),
            ActivityFilter::Reference(Reference::new(ReferenceType::Lead, lead))
        );
    }

    #[test]
    fn test_half_reference_filter_lists_everything() {
        let q = ActivityListQuery {
            reference_type: Some("lead".into()),
            ..Default::default()
        };
        assert_eq!(ActivityFilter::try_from(q).unwrap(), ActivityFilter::All);
    }
}
