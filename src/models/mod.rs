pub mod bill;
pub mod response;

pub use bill::{Bill, BillItem, BillStatus, NewBillItem};
pub use response::{BillItemResponse, BillResponse, ParseFailureResponse};
