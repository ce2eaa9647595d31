diesel::table! {
    companies (id) {
        id -> Uuid,
        name -> Text,
        is_deleted -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    leads (id) {
        id -> Uuid,
        tenant_id -> Uuid,
        company_id -> Nullable<Uuid>,
        person_name -> Nullable<Text>,
        is_deleted -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    contacts (id) {
        id -> Uuid,
        tenant_id -> Uuid,
        company_id -> Nullable<Uuid>,
        name -> Text,
        email -> Nullable<Text>,
        phone -> Nullable<Text>,
        job_title -> Nullable<Text>,
        company -> Nullable<Text>,
        is_deleted -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    activities (id) {
        id -> Uuid,
        tenant_id -> Uuid,
        activity_type -> Varchar,
        description -> Nullable<Text>,
        reference_type -> Varchar,
        reference_id -> Uuid,
        lead_id -> Nullable<Uuid>,
        company_id -> Nullable<Uuid>,
        contact_id -> Nullable<Uuid>,
        deal_id -> Nullable<Uuid>,
        created_by -> Nullable<Uuid>,
        created_at -> Timestamptz,
        is_deleted -> Bool,
        is_pinned -> Bool,
        follow_up_at -> Nullable<Timestamptz>,
        meeting_link -> Nullable<Text>,
    }
}
