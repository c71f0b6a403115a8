/// What an invoice is for. Travels through Telegram as the invoice payload
/// and comes back on pre-checkout and on successful payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoicePayload {
    pub user_id: i64,
    pub months: u32,
}

impl InvoicePayload {
    pub fn new(user_id: i64, months: u32) -> Self {
        Self { user_id, months }
    }

    pub fn to_payload_string(&self) -> String {
        format!("sub:{}:{}", self.user_id, self.months)
    }

    pub fn parse(payload: &str) -> Option<Self> {
        let mut parts = payload.split(':');
        if parts.next()? != "sub" {
            return None;
        }
        let user_id = parts.next()?.parse().ok()?;
        let months = parts.next()?.parse().ok()?;
        if parts.next().is_some() || months == 0 {
            return None;
        }
        Some(Self { user_id, months })
    }
}
