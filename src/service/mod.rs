pub mod bills;
pub mod normalize;

pub use bills::{BillService, UploadResult, UploadedImage};
pub use normalize::{normalize_reply, strip_code_fence, ExtractionOutcome, ParsedReceipt};
