use crate::db_types::Order;

/// The result of an insert-if-absent on the orders table. `AlreadyExists` carries the row that was already there, so
/// callers can inspect the current owner without a second query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOrderResult {
    Inserted(Order),
    AlreadyExists(Order),
}
