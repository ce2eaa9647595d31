diesel::table! {
    tasks (id) {
        id -> Uuid,
        company_id -> Uuid,
        title -> Text,
        description -> Nullable<Text>,
        due_date -> Timestamptz,
        priority -> Varchar,
        status -> Varchar,
        assigned_to -> Uuid,
        created_by -> Uuid,
        related_to_type -> Nullable<Varchar>,
        related_to_id -> Nullable<Uuid>,
        reminder_datetime -> Nullable<Timestamptz>,
        is_deleted -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    meetings (id) {
        id -> Uuid,
        company_id -> Uuid,
        title -> Text,
        description -> Nullable<Text>,
        meeting_date -> Date,
        start_time -> Time,
        end_time -> Time,
        location -> Nullable<Text>,
        assigned_to -> Uuid,
        created_by -> Uuid,
        related_to_type -> Nullable<Varchar>,
        related_to_id -> Nullable<Uuid>,
        reminder_datetime -> Nullable<Timestamptz>,
        is_deleted -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}
