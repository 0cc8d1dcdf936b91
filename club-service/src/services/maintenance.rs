use crate::models::Account;
use crate::services::{error::ServiceError, store::AccountStore};
use crate::utils::is_valid_hash;

/// Outcome of a password sweep.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub scanned: usize,
    pub invalid: Vec<Account>,
    pub deleted: usize,
}

/// Accounts whose stored password is set but is not a usable hash, e.g.
/// plaintext left behind by an old import.
pub async fn sweep_invalid_passwords(
    accounts: &dyn AccountStore,
    apply: bool,
) -> Result<SweepReport, ServiceError> {
    let all = accounts.list_accounts().await?;
    let scanned = all.len();

    let invalid: Vec<Account> = all
        .into_iter()
        .filter(|a| matches!(a.password_hash.as_deref(), Some(p) if !is_valid_hash(p)))
        .collect();

    let mut deleted = 0;
    if apply {
        for account in &invalid {
            if accounts.delete_account(&account.id).await? {
                tracing::info!(user_id = %account.id, "Deleted account with unusable password");
                deleted += 1;
            }
        }
    }

    Ok(SweepReport {
        scanned,
        invalid,
        deleted,
    })
}
