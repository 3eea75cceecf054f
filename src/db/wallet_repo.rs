use sqlx::PgPool;

use crate::models::WalletProfile;

/// Fetch the rolling profile for an address.
pub async fn get_profile(pool: &PgPool, address: &str) -> anyhow::Result<Option<WalletProfile>> {
    let profile = sqlx::query_as::<_, WalletProfile>(
        r#"
        SELECT address, avg_amount_30d, tx_count, first_seen, prior_flags
        FROM wallet_profiles
        WHERE address = $1
        "#,
    )
    .bind(address)
    .fetch_optional(pool)
    .await?;

    Ok(profile)
}
