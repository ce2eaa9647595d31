pub mod crm;
pub use self::crm::*;

pub mod sales;
pub use self::sales::*;

pub mod task_tables;
pub use self::task_tables::*;

pub mod custom_field_tables;
pub use self::custom_field_tables::*;

diesel::joinable!(deal_contacts -> contacts (contact_id));
diesel::joinable!(deal_contacts -> deals (deal_id));
diesel::joinable!(deal_items -> deals (deal_id));
diesel::joinable!(offer_items -> offers (offer_id));

diesel::allow_tables_to_appear_in_same_query!(
    companies,
    leads,
    contacts,
    activities,
    deals,
    deal_items,
    deal_contacts,
    offers,
    offer_items,
    tasks,
    meetings,
    custom_fields,
    custom_field_options,
    custom_field_visibility,
    custom_field_enabled_in,
);
