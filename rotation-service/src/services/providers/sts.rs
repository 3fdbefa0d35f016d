use aws_sdk_sts::Client as StsClient;
use service_core::error::AppError;

use super::aws_error;
use crate::models::AccountInfo;

/// Account the running credentials belong to, labelled with the configured
/// display name.
pub async fn resolve_account(
    client: &StsClient,
    account_name: Option<String>,
) -> Result<AccountInfo, AppError> {
    let output = client
        .get_caller_identity()
        .send()
        .await
        .map_err(|e| aws_error("GetCallerIdentity", e))?;

    let id = output
        .account()
        .ok_or_else(|| AppError::Aws(anyhow::anyhow!("GetCallerIdentity returned no account")))?;

    Ok(AccountInfo::new(id, account_name))
}
