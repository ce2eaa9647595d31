diesel::table! {
    custom_fields (id) {
        id -> Uuid,
        company_id -> Uuid,
        name -> Text,
        label -> Text,
        field_type -> Varchar,
        module -> Varchar,
        required -> Bool,
        placeholder -> Nullable<Text>,
        help_text -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    custom_field_options (id) {
        id -> Uuid,
        custom_field_id -> Uuid,
        option_value -> Text,
        display_order -> Int4,
    }
}

diesel::table! {
    custom_field_visibility (id) {
        id -> Uuid,
        custom_field_id -> Uuid,
        visibility -> Text,
    }
}

diesel::table! {
    custom_field_enabled_in (id) {
        id -> Uuid,
        custom_field_id -> Uuid,
        enabled_in -> Text,
    }
}
