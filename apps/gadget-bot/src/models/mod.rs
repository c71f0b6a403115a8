pub mod payment;
pub mod platform;

pub use payment::InvoicePayload;
pub use platform::Platform;
