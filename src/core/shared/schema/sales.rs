diesel::table! {
    deals (id) {
        id -> Uuid,
        company_id -> Uuid,
        deal_number -> Varchar,
        title -> Nullable<Text>,
        deal_date -> Nullable<Date>,
        valid_till -> Nullable<Date>,
        currency -> Varchar,
        client_id -> Nullable<Uuid>,
        project_id -> Nullable<Uuid>,
        lead_id -> Nullable<Uuid>,
        contact_id -> Nullable<Uuid>,
        calculate_tax -> Varchar,
        description -> Nullable<Text>,
        note -> Nullable<Text>,
        terms -> Nullable<Text>,
        discount -> Numeric,
        discount_type -> Varchar,
        sub_total -> Numeric,
        discount_amount -> Numeric,
        tax_amount -> Numeric,
        total -> Numeric,
        status -> Varchar,
        pipeline_id -> Nullable<Uuid>,
        stage_id -> Nullable<Uuid>,
        created_by -> Nullable<Uuid>,
        is_deleted -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    deal_items (id) {
        id -> Uuid,
        deal_id -> Uuid,
        item_name -> Nullable<Text>,
        description -> Nullable<Text>,
        quantity -> Numeric,
        unit -> Varchar,
        unit_price -> Numeric,
        tax_rate -> Numeric,
        amount -> Numeric,
        sort_order -> Int4,
    }
}

diesel::table! {
    deal_contacts (id) {
        id -> Uuid,
        deal_id -> Uuid,
        contact_id -> Uuid,
        is_primary -> Bool,
        role -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    offers (id) {
        id -> Uuid,
        company_id -> Uuid,
        offer_number -> Varchar,
        offer_date -> Nullable<Date>,
        valid_till -> Nullable<Date>,
        currency -> Varchar,
        client_id -> Nullable<Uuid>,
        project_id -> Nullable<Uuid>,
        lead_id -> Nullable<Uuid>,
        calculate_tax -> Varchar,
        description -> Nullable<Text>,
        note -> Nullable<Text>,
        terms -> Nullable<Text>,
        discount -> Numeric,
        discount_type -> Varchar,
        sub_total -> Numeric,
        discount_amount -> Numeric,
        tax_amount -> Numeric,
        total -> Numeric,
        status -> Varchar,
        created_by -> Nullable<Uuid>,
        is_deleted -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    offer_items (id) {
        id -> Uuid,
        offer_id -> Uuid,
        item_name -> Nullable<Text>,
        description -> Nullable<Text>,
        quantity -> Numeric,
        unit -> Varchar,
        unit_price -> Numeric,
        tax_rate -> Numeric,
        amount -> Numeric,
        sort_order -> Int4,
    }
}
