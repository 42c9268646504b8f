// Database row types. Each maps one table; JSON columns stay as `Value` and are
// decoded by the store that owns the table.

pub mod activity;
pub mod resume;
pub mod session;
