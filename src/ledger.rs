// Per-user ledger: top-ups, spend, and the balance-refresh cooldown.

use chrono::Utc;
use sqlx::{Sqlite, Transaction};
use tracing::info;

use crate::database::DbPool;
use crate::error::ShopError;
use crate::models::UserAccount;
use crate::rates::{UsdPrices, WalletBalances};

pub const REFRESH_COOLDOWN_SECS: i64 = 30;

/// Trading-fee convention: ETH is credited at 90% of spot.
pub const ETH_FEE_MULTIPLIER: f64 = 0.90;

pub struct LedgerService;

impl LedgerService {
    pub async fn get_or_create_user(pool: &DbPool, user_id: i64) -> Result<UserAccount, ShopError> {
        sqlx::query("INSERT OR IGNORE INTO users (id) VALUES (?1)")
            .bind(user_id)
            .execute(pool)
            .await?;

        let user = sqlx::query_as(
            "SELECT id, top_up_cents, spent_cents, btc_balance, ltc_balance, eth_balance, \
             last_refresh FROM users WHERE id = ?1",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;
        Ok(user)
    }

    pub async fn spendable_cents(pool: &DbPool, user_id: i64) -> Result<i64, ShopError> {
        let spendable: Option<i64> =
            sqlx::query_scalar("SELECT top_up_cents - spent_cents FROM users WHERE id = ?1")
                .bind(user_id)
                .fetch_optional(pool)
                .await?;
        Ok(spendable.unwrap_or(0))
    }

    pub async fn can_afford(
        pool: &DbPool,
        user_id: i64,
        amount_cents: i64,
    ) -> Result<bool, ShopError> {
        Ok(Self::spendable_cents(pool, user_id).await? >= amount_cents)
    }

    /// Debit inside the purchase transaction. The balance condition is part
    /// of the update itself, so a pre-check gone stale cannot drive the
    /// ledger negative; a shortfall rolls the whole purchase back.
    pub async fn debit_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        user_id: i64,
        amount_cents: i64,
    ) -> Result<(), ShopError> {
        let result = sqlx::query(
            "UPDATE users SET spent_cents = spent_cents + ?1 \
             WHERE id = ?2 AND top_up_cents - spent_cents >= ?1",
        )
        .bind(amount_cents)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            let available: Option<i64> =
                sqlx::query_scalar("SELECT top_up_cents - spent_cents FROM users WHERE id = ?1")
                    .bind(user_id)
                    .fetch_optional(&mut **tx)
                    .await?;
            return Err(ShopError::InsufficientFunds {
                needed_cents: amount_cents,
                available_cents: available.unwrap_or(0),
            });
        }
        Ok(())
    }

    /// Stamp `last_refresh = now` and return true only when the window has
    /// passed (or was never stamped). A rejected refresh has no side effect.
    pub async fn refresh_cooldown(pool: &DbPool, user_id: i64) -> Result<bool, ShopError> {
        Self::refresh_cooldown_at(pool, user_id, Utc::now().timestamp()).await
    }

    pub async fn refresh_cooldown_at(
        pool: &DbPool,
        user_id: i64,
        now_secs: i64,
    ) -> Result<bool, ShopError> {
        sqlx::query("INSERT OR IGNORE INTO users (id) VALUES (?1)")
            .bind(user_id)
            .execute(pool)
            .await?;

        let result = sqlx::query(
            "UPDATE users SET last_refresh = ?1 \
             WHERE id = ?2 AND (last_refresh IS NULL OR ?1 - last_refresh > ?3)",
        )
        .bind(now_secs)
        .bind(user_id)
        .bind(REFRESH_COOLDOWN_SECS)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Convert fetched on-chain balances to USD cents and credit the user's
    /// top-up total. A currency whose source failed contributes zero. The
    /// snapshot columns record the balances as last observed.
    pub async fn apply_external_balances(
        pool: &DbPool,
        user_id: i64,
        balances: &WalletBalances,
        prices: &UsdPrices,
    ) -> Result<i64, ShopError> {
        let credited = credit_cents(balances, prices);

        sqlx::query(
            "UPDATE users SET top_up_cents = top_up_cents + ?1, \
             btc_balance = ?2, ltc_balance = ?3, eth_balance = ?4 \
             WHERE id = ?5",
        )
        .bind(credited)
        .bind(balances.btc.unwrap_or(0.0))
        .bind(balances.ltc.unwrap_or(0.0))
        .bind(balances.eth.unwrap_or(0.0))
        .bind(user_id)
        .execute(pool)
        .await?;

        info!("Credited {} cents to user {}", credited, user_id);
        Ok(credited)
    }
}

/// USD cents for a set of per-currency balances, rounding once at the end.
pub fn credit_cents(balances: &WalletBalances, prices: &UsdPrices) -> i64 {
    let mut usd = 0.0;
    usd += balances.btc.unwrap_or(0.0) * prices.btc;
    usd += balances.ltc.unwrap_or(0.0) * prices.ltc;
    usd += balances.eth.unwrap_or(0.0) * prices.eth * ETH_FEE_MULTIPLIER;
    (usd * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credit_applies_eth_haircut() {
        let balances = WalletBalances {
            btc: Some(0.5),
            ltc: None,
            eth: Some(2.0),
        };
        let prices = UsdPrices {
            btc: 100.0,
            ltc: 80.0,
            eth: 50.0,
        };
        // 0.5*100 + 0 + 2.0*50*0.9 = 50 + 90 = 140 USD
        assert_eq!(credit_cents(&balances, &prices), 14_000);
    }

    #[test]
    fn failed_source_contributes_zero() {
        let balances = WalletBalances::default();
        let prices = UsdPrices {
            btc: 60_000.0,
            ltc: 80.0,
            eth: 3_000.0,
        };
        assert_eq!(credit_cents(&balances, &prices), 0);
    }
}
