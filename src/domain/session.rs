use uuid::Uuid;

/// A freshly minted access/refresh pair, handed to the transport adapter.
/// The two tokens are independent credentials; neither is derived from the
/// other.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: Uuid,
    pub token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}
