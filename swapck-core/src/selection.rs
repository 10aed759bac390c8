//! Token selection and split reconciler.
//!
//! The buyer picks up to two tokens to pay with. One token pays the whole
//! total; with two, a slider sets the first token's contribution and the
//! second pays the rest, so the contributions always add up to the total.

use rust_decimal::Decimal;
use smallvec::{SmallVec, smallvec};
use std::time::Duration;
use swapck_sdk::objects::{Balance, Felt, QuoteId, U256};
use swapck_sdk::units::mul_div_ceil;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use crate::config::ConfirmPolicy;
use crate::quotes::QuoteSnapshot;

/// Most tokens a payment can be split across.
pub const MAX_TOKENS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("you can pay with at most two tokens")]
    TooManyTokens,

    /// No quote (for a swapped token) or nothing held
    #[error("token {0} cannot be used to pay")]
    NotSelectable(Felt),

    #[error("select a token to pay with")]
    NothingSelected,

    #[error("splitting needs two selected tokens")]
    NotSplit,

    #[error("contributions add up to {sum}, expected {total}")]
    SumMismatch { sum: Decimal, total: Decimal },

    #[error("token {0} contributes nothing to the payment")]
    ZeroContribution(Felt),

    #[error("insufficient balance of {token}: {required} required, {available} held")]
    InsufficientBalance {
        token: Felt,
        required: U256,
        available: U256,
    },

    #[error("cannot compute the amount required from token {0}")]
    Arithmetic(Felt),
}

/// A confirmed token and the part of the total it pays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenToPayWith {
    pub token: Felt,
    /// Refreshed quote to swap with; `None` for the settlement token.
    pub quote_id: Option<QuoteId>,
    /// Contribution in the session's price currency.
    pub amount: Decimal,
}

/// Market data a selection is checked against.
#[derive(Debug, Clone, Copy)]
pub struct SelectionContext<'a> {
    pub settlement_token: Felt,
    /// Session total in settlement base units.
    pub settlement_amount: U256,
    pub quotes: &'a QuoteSnapshot,
    pub balances: &'a [Balance],
}

impl SelectionContext<'_> {
    pub fn balance_of(&self, token: Felt) -> U256 {
        self.balances
            .iter()
            .find(|b| b.address == token)
            .map(|b| b.balance)
            .unwrap_or_default()
    }

    /// Base units of `token` needed to pay the whole total.
    pub fn full_requirement(&self, token: Felt) -> Option<U256> {
        if token == self.settlement_token {
            Some(self.settlement_amount)
        } else {
            self.quotes.get(&token).map(|q| q.sell_amount)
        }
    }

    pub fn is_selectable(&self, token: Felt) -> bool {
        self.full_requirement(token).is_some() && !self.balance_of(token).is_zero()
    }

    /// Base units of `token` needed to pay `contribution` out of `total`,
    /// rounded up.
    pub fn required_units(
        &self,
        token: Felt,
        contribution: Decimal,
        total: Decimal,
    ) -> Result<U256, SelectionError> {
        let full = self
            .full_requirement(token)
            .ok_or(SelectionError::NotSelectable(token))?;
        proportional_ceil(full, contribution, total).ok_or(SelectionError::Arithmetic(token))
    }

    /// Whether the wallet can afford `contribution` in `token`.
    pub fn can_afford(&self, token: Felt, contribution: Decimal, total: Decimal) -> bool {
        self.required_units(token, contribution, total)
            .is_ok_and(|required| self.balance_of(token) >= required)
    }
}

/// `ceil(full * part / total)` with `part` and `total` brought to a common
/// scale first.
pub(crate) fn proportional_ceil(full: U256, part: Decimal, total: Decimal) -> Option<U256> {
    if total <= Decimal::ZERO || part.is_sign_negative() {
        return None;
    }
    let scale = part.scale().max(total.scale());
    let (mut part, mut total) = (part, total);
    part.rescale(scale);
    total.rescale(scale);
    let part = U256::from(u128::try_from(part.mantissa()).ok()?);
    let total = U256::from(u128::try_from(total.mantissa()).ok()?);
    mul_div_ceil(full, part, total)
}

/// Selection state of one checkout.
#[derive(Debug, Clone)]
pub struct Selection {
    total: Decimal,
    step: Decimal,
    tokens: SmallVec<[Felt; MAX_TOKENS]>,
    /// Contribution of `tokens[0]` when two tokens are selected.
    first_share: Decimal,
    error: Option<(SelectionError, Instant)>,
    error_ttl: Duration,
}

impl Selection {
    pub fn new(total: Decimal, step: Decimal, error_ttl: Duration) -> Self {
        Self {
            total,
            step,
            tokens: SmallVec::new(),
            first_share: total,
            error: None,
            error_ttl,
        }
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    pub fn selected(&self) -> &[Felt] {
        &self.tokens
    }

    pub fn is_selected(&self, token: Felt) -> bool {
        self.tokens.contains(&token)
    }

    /// Select `token`, or deselect it if already selected.
    ///
    /// Selecting a third token leaves the selection unchanged and raises a
    /// transient [`SelectionError::TooManyTokens`]. A token whose balance
    /// cannot cover the contribution it would start with is refused.
    pub fn toggle(&mut self, token: Felt, ctx: &SelectionContext<'_>) -> Result<(), SelectionError> {
        if let Some(pos) = self.tokens.iter().position(|t| *t == token) {
            self.tokens.remove(pos);
            self.first_share = self.total;
            debug!(%token, "Token deselected");
            return Ok(());
        }

        if self.tokens.len() >= MAX_TOKENS {
            let err = SelectionError::TooManyTokens;
            self.error = Some((err.clone(), Instant::now() + self.error_ttl));
            return Err(err);
        }

        if !ctx.is_selectable(token) {
            return Err(SelectionError::NotSelectable(token));
        }

        // A first token pays the whole total, a second one the even half.
        let contribution = if self.tokens.is_empty() {
            self.total
        } else {
            self.total - self.snap(self.total / Decimal::TWO)
        };
        let required = ctx.required_units(token, contribution, self.total)?;
        let available = ctx.balance_of(token);
        if available < required {
            return Err(SelectionError::InsufficientBalance {
                token,
                required,
                available,
            });
        }

        self.tokens.push(token);
        self.first_share = if self.tokens.len() == MAX_TOKENS {
            self.snap(self.total / Decimal::TWO)
        } else {
            self.total
        };
        debug!(%token, selected = self.tokens.len(), "Token selected");
        Ok(())
    }

    pub fn clear(&mut self) {
        self.tokens.clear();
        self.first_share = self.total;
    }

    /// Move the slider: set the first token's contribution.
    ///
    /// The value is clamped to `[0, total]` and rounded to the slider step.
    /// Returns the value applied.
    pub fn set_split(&mut self, first: Decimal) -> Result<Decimal, SelectionError> {
        if self.tokens.len() != MAX_TOKENS {
            return Err(SelectionError::NotSplit);
        }
        self.first_share = self.snap(first);
        Ok(self.first_share)
    }

    /// Contributions of both tokens when split.
    pub fn split(&self) -> Option<(Decimal, Decimal)> {
        (self.tokens.len() == MAX_TOKENS).then(|| (self.first_share, self.total - self.first_share))
    }

    /// Each selected token with its contribution, in selection order.
    pub fn contributions(&self) -> SmallVec<[(Felt, Decimal); MAX_TOKENS]> {
        match self.tokens.as_slice() {
            [] => SmallVec::new(),
            [only] => smallvec![(*only, self.total)],
            [first, second, ..] => smallvec![
                (*first, self.first_share),
                (*second, self.total - self.first_share),
            ],
        }
    }

    /// The transient error, while it has not expired.
    pub fn transient_error(&self) -> Option<&SelectionError> {
        match &self.error {
            Some((err, until)) if Instant::now() < *until => Some(err),
            _ => None,
        }
    }

    pub fn can_confirm(&self, ctx: &SelectionContext<'_>, policy: ConfirmPolicy) -> bool {
        self.confirm(ctx, policy).is_ok()
    }

    /// Validate the selection against balances and quotes.
    pub fn confirm(
        &self,
        ctx: &SelectionContext<'_>,
        policy: ConfirmPolicy,
    ) -> Result<SmallVec<[TokenToPayWith; MAX_TOKENS]>, SelectionError> {
        let contributions = self.contributions();
        if contributions.is_empty() {
            return Err(SelectionError::NothingSelected);
        }

        let sum: Decimal = contributions.iter().map(|(_, amount)| *amount).sum();
        if !policy.accepts(sum, self.total) {
            return Err(SelectionError::SumMismatch {
                sum,
                total: self.total,
            });
        }

        let mut confirmed = SmallVec::new();
        for (token, amount) in contributions {
            if amount.is_zero() {
                return Err(SelectionError::ZeroContribution(token));
            }
            let required = ctx.required_units(token, amount, self.total)?;
            let available = ctx.balance_of(token);
            if available < required {
                return Err(SelectionError::InsufficientBalance {
                    token,
                    required,
                    available,
                });
            }
            let quote_id = if token == ctx.settlement_token {
                None
            } else {
                ctx.quotes.get(&token).map(|q| q.quote_id.clone())
            };
            confirmed.push(TokenToPayWith {
                token,
                quote_id,
                amount,
            });
        }
        Ok(confirmed)
    }

    fn snap(&self, value: Decimal) -> Decimal {
        let clamped = value.clamp(Decimal::ZERO, self.total);
        if self.step.is_zero() {
            return clamped;
        }
        ((clamped / self.step).round() * self.step).clamp(Decimal::ZERO, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{eth, strk, usdc};
    use compact_str::CompactString;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use swapck_sdk::objects::Quote;

    fn quote(token: Felt, id: &str, sell_amount: u64) -> Quote {
        Quote {
            quote_id: QuoteId(CompactString::new(id)),
            sell_token_address: token,
            sell_amount: U256::from(sell_amount),
            sell_amount_in_usd: None,
            buy_token_address: usdc().address,
            buy_amount: U256::from(101_000_000u64),
            buy_amount_in_usd: None,
            chain_id: None,
            expiry: None,
        }
    }

    struct Market {
        quotes: QuoteSnapshot,
        balances: Vec<Balance>,
    }

    impl Market {
        // Total: 100 USDC. ETH covers it with 0.0505 ETH; the wallet holds
        // 120 USDC, 0.03 ETH and some STRK, which has no quote.
        fn new() -> Self {
            let quotes = QuoteSnapshot::new(
                1,
                HashMap::from([(
                    eth().address,
                    quote(eth().address, "q-eth", 50_500_000_000_000_000),
                )]),
            );
            let balances = vec![
                Balance {
                    address: usdc().address,
                    balance: U256::from(120_000_000u64),
                },
                Balance {
                    address: eth().address,
                    balance: U256::from(30_000_000_000_000_000u64),
                },
                Balance {
                    address: strk().address,
                    balance: U256::from(1_000u64),
                },
            ];
            Self { quotes, balances }
        }

        fn ctx(&self) -> SelectionContext<'_> {
            SelectionContext {
                settlement_token: usdc().address,
                settlement_amount: U256::from(100_000_000u64),
                quotes: &self.quotes,
                balances: &self.balances,
            }
        }
    }

    fn selection() -> Selection {
        Selection::new(dec!(100), dec!(0.01), Duration::from_secs(3))
    }

    #[test]
    fn slider_scenario_seventy_thirty() {
        let market = Market::new();
        let mut sel = selection();
        sel.toggle(usdc().address, &market.ctx()).unwrap();
        sel.toggle(eth().address, &market.ctx()).unwrap();

        assert_eq!(sel.split(), Some((dec!(50), dec!(50))));
        sel.set_split(dec!(70)).unwrap();
        assert_eq!(sel.split(), Some((dec!(70), dec!(30))));
    }

    #[test]
    fn split_contributions_always_sum_to_total() {
        let market = Market::new();
        let mut sel = selection();
        sel.toggle(usdc().address, &market.ctx()).unwrap();
        sel.toggle(eth().address, &market.ctx()).unwrap();

        for raw in [dec!(-5), dec!(0), dec!(0.004), dec!(33.333), dec!(66.675), dec!(99.999), dec!(250)] {
            let applied = sel.set_split(raw).unwrap();
            assert!(applied >= Decimal::ZERO && applied <= dec!(100));
            let sum: Decimal = sel.contributions().iter().map(|(_, a)| *a).sum();
            assert_eq!(sum, dec!(100));
        }
    }

    #[test]
    fn slider_is_clamped_and_stepped() {
        let market = Market::new();
        let mut sel = selection();
        assert_eq!(sel.set_split(dec!(10)), Err(SelectionError::NotSplit));

        sel.toggle(usdc().address, &market.ctx()).unwrap();
        sel.toggle(eth().address, &market.ctx()).unwrap();
        assert_eq!(sel.set_split(dec!(150)).unwrap(), dec!(100));
        assert_eq!(sel.set_split(dec!(-1)).unwrap(), dec!(0));
        assert_eq!(sel.set_split(dec!(12.3456)).unwrap(), dec!(12.35));
    }

    #[tokio::test(start_paused = true)]
    async fn third_token_is_rejected_with_transient_error() {
        let mut market = Market::new();
        market.quotes = QuoteSnapshot::new(
            2,
            HashMap::from([
                (eth().address, quote(eth().address, "q-eth", 1)),
                (strk().address, quote(strk().address, "q-strk", 1)),
            ]),
        );
        let mut sel = selection();
        sel.toggle(usdc().address, &market.ctx()).unwrap();
        sel.toggle(eth().address, &market.ctx()).unwrap();
        sel.set_split(dec!(20)).unwrap();

        assert_eq!(
            sel.toggle(strk().address, &market.ctx()),
            Err(SelectionError::TooManyTokens)
        );
        assert_eq!(sel.selected(), &[usdc().address, eth().address]);
        assert_eq!(sel.split(), Some((dec!(20), dec!(80))));
        assert_eq!(sel.transient_error(), Some(&SelectionError::TooManyTokens));

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(sel.transient_error(), None);
    }

    #[test]
    fn toggling_selected_token_deselects_it() {
        let market = Market::new();
        let mut sel = selection();
        sel.toggle(usdc().address, &market.ctx()).unwrap();
        sel.toggle(eth().address, &market.ctx()).unwrap();
        sel.toggle(usdc().address, &market.ctx()).unwrap();

        assert_eq!(sel.selected(), &[eth().address]);
        assert_eq!(sel.split(), None);
        assert_eq!(
            sel.contributions().as_slice(),
            &[(eth().address, dec!(100))]
        );
    }

    #[test]
    fn unquoted_or_empty_tokens_are_not_selectable() {
        let mut market = Market::new();
        market.balances[0].balance = U256::ZERO;
        let mut sel = selection();

        assert_eq!(
            sel.toggle(strk().address, &market.ctx()),
            Err(SelectionError::NotSelectable(strk().address))
        );
        assert_eq!(
            sel.toggle(usdc().address, &market.ctx()),
            Err(SelectionError::NotSelectable(usdc().address))
        );
        assert!(sel.selected().is_empty());
    }

    #[test]
    fn toggle_rejects_unaffordable_tokens() {
        let mut market = Market::new();
        market.balances[0].balance = U256::from(60_000_000u64);
        let mut sel = selection();

        // Alone, a token has to cover the whole 100.
        assert_eq!(
            sel.toggle(usdc().address, &market.ctx()),
            Err(SelectionError::InsufficientBalance {
                token: usdc().address,
                required: U256::from(100_000_000u64),
                available: U256::from(60_000_000u64),
            })
        );
        assert!(matches!(
            sel.toggle(eth().address, &market.ctx()),
            Err(SelectionError::InsufficientBalance { token, .. }) if token == eth().address
        ));
        assert!(sel.selected().is_empty());

        // As a second token it only has to cover half: 0.02525 ETH.
        market.balances[0].balance = U256::from(120_000_000u64);
        sel.toggle(usdc().address, &market.ctx()).unwrap();
        sel.toggle(eth().address, &market.ctx()).unwrap();
        assert_eq!(sel.split(), Some((dec!(50), dec!(50))));

        market.balances[1].balance = U256::from(20_000_000_000_000_000u64);
        let mut sel = selection();
        sel.toggle(usdc().address, &market.ctx()).unwrap();
        assert_eq!(
            sel.toggle(eth().address, &market.ctx()),
            Err(SelectionError::InsufficientBalance {
                token: eth().address,
                required: U256::from(25_250_000_000_000_000u64),
                available: U256::from(20_000_000_000_000_000u64),
            })
        );
        assert_eq!(sel.selected(), &[usdc().address]);
        assert_eq!(sel.transient_error(), None);
    }

    #[test]
    fn insufficient_balance_is_never_confirmable() {
        let mut market = Market::new();
        let policy = ConfirmPolicy::default();
        let mut sel = selection();
        assert_eq!(
            sel.confirm(&market.ctx(), policy),
            Err(SelectionError::NothingSelected)
        );

        sel.toggle(usdc().address, &market.ctx()).unwrap();
        assert!(sel.can_confirm(&market.ctx(), policy));

        // The balance drops to 60 USDC after selection.
        market.balances[0].balance = U256::from(60_000_000u64);
        assert!(matches!(
            sel.confirm(&market.ctx(), policy),
            Err(SelectionError::InsufficientBalance { required, .. })
                if required == U256::from(100_000_000u64)
        ));

        sel.toggle(eth().address, &market.ctx()).unwrap();
        assert!(sel.can_confirm(&market.ctx(), policy));

        // ETH would need 70 % of 0.0505 ETH, more than the 0.03 held.
        sel.set_split(dec!(30)).unwrap();
        assert!(matches!(
            sel.confirm(&market.ctx(), policy),
            Err(SelectionError::InsufficientBalance { token, .. }) if token == eth().address
        ));

        // USDC would need 70 of 60.
        sel.set_split(dec!(70)).unwrap();
        assert!(!sel.can_confirm(&market.ctx(), policy));
    }

    #[test]
    fn confirmed_selection_carries_quote_ids() {
        let market = Market::new();
        let mut sel = selection();
        sel.toggle(usdc().address, &market.ctx()).unwrap();
        sel.toggle(eth().address, &market.ctx()).unwrap();
        sel.set_split(dec!(55)).unwrap();

        let confirmed = sel.confirm(&market.ctx(), ConfirmPolicy::ExactSum).unwrap();
        assert_eq!(
            confirmed.as_slice(),
            &[
                TokenToPayWith {
                    token: usdc().address,
                    quote_id: None,
                    amount: dec!(55),
                },
                TokenToPayWith {
                    token: eth().address,
                    quote_id: Some(QuoteId::from("q-eth")),
                    amount: dec!(45),
                },
            ]
        );
    }

    #[test]
    fn zero_contribution_blocks_confirm() {
        let market = Market::new();
        let mut sel = selection();
        sel.toggle(usdc().address, &market.ctx()).unwrap();
        sel.toggle(eth().address, &market.ctx()).unwrap();
        sel.set_split(dec!(0)).unwrap();
        assert_eq!(
            sel.confirm(&market.ctx(), ConfirmPolicy::default()),
            Err(SelectionError::ZeroContribution(usdc().address))
        );
    }

    #[test]
    fn proportional_requirement_rounds_up() {
        let full = U256::from(10u8);
        assert_eq!(proportional_ceil(full, dec!(1), dec!(3)), Some(U256::from(4u8)));
        assert_eq!(proportional_ceil(full, dec!(100), dec!(100.00)), Some(full));
        assert_eq!(proportional_ceil(full, dec!(0.5), dec!(1)), Some(U256::from(5u8)));
        assert_eq!(proportional_ceil(full, dec!(1), Decimal::ZERO), None);
    }
}
