pub mod error;
pub mod schema;
pub mod state;
pub mod utils;

pub use error::{ApiResponse, CrmError, Pagination};
pub use utils::{bd, bd_to_f64, create_conn, with_conn, DbPool};
