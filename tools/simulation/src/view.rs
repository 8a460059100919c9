//! Derived market and provider queries
//!
//! A [`MarketView`] borrows the history arena and a step index. Every figure
//! (valuation, target stake, fee rate, returns) is computed from the snapshot
//! at that step and its trailing window, so queries are pure and repeatable.

use crate::book::OrderSetForSide;
use crate::export::{MarketField, ProviderField};
use crate::market::MarketSnapshot;
use crate::provider::{LiquidityProvider, LiquiditySummary};
use std::fmt;
use types::errors::{BookError, MechanismError, ProviderError};
use types::numeric::{Rate, Volume, DAYS_PER_YEAR};

/// Queries on the snapshot at step `n` of a history.
#[derive(Debug, Clone, Copy)]
pub struct MarketView<'a> {
    history: &'a [MarketSnapshot],
    n: usize,
}

impl<'a> MarketView<'a> {
    pub(crate) fn new(history: &'a [MarketSnapshot], n: usize) -> Self {
        debug_assert!(n < history.len());
        Self { history, n }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn snapshot(&self) -> &'a MarketSnapshot {
        &self.history[self.n]
    }

    /// Up to `period` trailing snapshots ending at this step, clipped at step 0.
    pub fn window_snapshots(&self, period: usize) -> &'a [MarketSnapshot] {
        let start = (self.n + 1).saturating_sub(period);
        &self.history[start..=self.n]
    }

    /// `field` over the trailing window of `period` steps.
    pub fn window<F>(&self, period: usize, field: F) -> Vec<f64>
    where
        F: Fn(&MarketSnapshot) -> f64,
    {
        self.window_snapshots(period).iter().map(field).collect()
    }

    /// Traded volume summed over the valuation window, floored at total stake.
    ///
    /// While history is shorter than the window the sum is scaled up by
    /// `period / window_len` so a young market does not show artificial growth.
    pub fn valuation(&self) -> f64 {
        let period = self.snapshot().liquidity.valuation_period;
        let volumes = self.window(period, |s| s.traded_volume);
        let factor = period as f64 / volumes.len() as f64;
        let valuation = factor * volumes.iter().sum::<f64>();
        valuation.max(self.total_stake())
    }

    /// Peak open interest over the stake target window × c2 × v × short risk factor.
    pub fn target_stake(&self) -> f64 {
        let snapshot = self.snapshot();
        let liquidity = &snapshot.liquidity;
        let max_oi = self
            .window(liquidity.stake_target_period, |s| s.open_interest)
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max);
        max_oi * liquidity.c2 * liquidity.v * snapshot.risk_model.risk_factor_short()
    }

    /// Fee rate from the stake-weighted auction over provider fee bids.
    pub fn fee_rate(&self) -> Rate {
        fee_rate_auction(self.snapshot().providers(), self.target_stake())
    }

    pub fn fees_collected(&self) -> f64 {
        self.snapshot().traded_volume * self.fee_rate()
    }

    pub fn total_stake(&self) -> f64 {
        self.snapshot().providers().iter().map(|lp| lp.stake()).sum()
    }

    pub fn total_margin(&self) -> Result<f64, BookError> {
        self.providers().map(|lp| lp.margin()).sum()
    }

    pub fn total_equity(&self) -> f64 {
        let valuation = self.valuation();
        self.snapshot()
            .providers()
            .iter()
            .map(|lp| equity_at(lp, valuation))
            .sum()
    }

    /// Fees over a year at the current rate and volume, on total stake.
    pub fn annualised_return(&self) -> f64 {
        let total_stake = self.total_stake();
        if total_stake > 0.0 {
            DAYS_PER_YEAR * self.fees_collected() / total_stake
        } else {
            0.0
        }
    }

    /// As [`annualised_return`](Self::annualised_return) on stake plus margin.
    pub fn annualised_return_on_capital(&self) -> Result<f64, BookError> {
        let cost_base = self.total_stake() + self.total_margin()?;
        if cost_base > 0.0 {
            Ok(DAYS_PER_YEAR * self.fees_collected() / cost_base)
        } else {
            Ok(0.0)
        }
    }

    /// Providers in registration order.
    pub fn providers(&self) -> impl Iterator<Item = ProviderView<'a>> {
        let market = *self;
        self.snapshot()
            .providers()
            .iter()
            .map(move |lp| ProviderView { market, lp })
    }

    pub fn provider(&self, name: &str) -> Option<ProviderView<'a>> {
        self.snapshot()
            .provider(name)
            .map(|lp| ProviderView { market: *self, lp })
    }

    /// Like [`provider`](Self::provider), but absent is an error.
    pub fn require_provider(&self, name: &str) -> Result<ProviderView<'a>, ProviderError> {
        self.provider(name).ok_or_else(|| ProviderError::NotFound {
            name: name.to_string(),
        })
    }

    pub fn field(&self, field: MarketField) -> Result<f64, MechanismError> {
        let snapshot = self.snapshot();
        let value = match field {
            MarketField::N => self.n as f64,
            MarketField::MarkPrice => snapshot.mark_price,
            MarketField::TradedVolume => snapshot.traded_volume,
            MarketField::OpenInterest => snapshot.open_interest,
            MarketField::Valuation => self.valuation(),
            MarketField::TargetStake => self.target_stake(),
            MarketField::TotalStake => self.total_stake(),
            MarketField::TotalMargin => self.total_margin()?,
            MarketField::FeeRate => self.fee_rate(),
            MarketField::FeesCollected => self.fees_collected(),
            MarketField::AnnualisedReturn => self.annualised_return(),
            MarketField::AnnualisedReturnOnCapital => self.annualised_return_on_capital()?,
            MarketField::TotalEquity => self.total_equity(),
        };
        Ok(value)
    }

    /// Field of the named provider; `None` when it is not committed here.
    pub fn provider_field(
        &self,
        name: &str,
        field: ProviderField,
    ) -> Option<Result<f64, MechanismError>> {
        self.provider(name).map(|lp| lp.field(field))
    }
}

/// Sort bids ascending (stable) and accumulate stake; the first bid at which
/// cumulative stake reaches `target_stake` sets the rate. If stake never
/// reaches the target the highest bid is used. No bids gives zero.
pub fn fee_rate_auction<'p>(
    providers: impl IntoIterator<Item = &'p LiquidityProvider>,
    target_stake: f64,
) -> Rate {
    let mut bids: Vec<&LiquidityProvider> = providers.into_iter().collect();
    bids.sort_by(|a, b| a.fee_bid().total_cmp(&b.fee_bid()));

    let mut stake_covered = 0.0;
    for bid in &bids {
        stake_covered += bid.stake();
        if stake_covered >= target_stake {
            return bid.fee_bid();
        }
    }
    bids.last().map(|bid| bid.fee_bid()).unwrap_or(0.0)
}

fn equity_at(lp: &LiquidityProvider, valuation: f64) -> f64 {
    if lp.entry_valuation() == 0.0 {
        lp.stake()
    } else {
        valuation / lp.entry_valuation() * lp.stake()
    }
}

/// A committed provider read against the snapshot it belongs to.
#[derive(Debug, Clone, Copy)]
pub struct ProviderView<'a> {
    market: MarketView<'a>,
    lp: &'a LiquidityProvider,
}

impl<'a> ProviderView<'a> {
    pub fn provider(&self) -> &'a LiquidityProvider {
        self.lp
    }

    pub fn market(&self) -> MarketView<'a> {
        self.market
    }

    pub fn name(&self) -> &'a str {
        self.lp.name().as_str()
    }

    pub fn stake(&self) -> f64 {
        self.lp.stake()
    }

    pub fn fee_bid(&self) -> Rate {
        self.lp.fee_bid()
    }

    pub fn entry_valuation(&self) -> f64 {
        self.lp.entry_valuation()
    }

    /// Liquidity the provider must supply: `stake * k`.
    pub fn obligation(&self) -> f64 {
        self.lp.stake() * self.market.snapshot().liquidity.k
    }

    /// Stake grown by the valuation since entry.
    pub fn equity(&self) -> f64 {
        equity_at(self.lp, self.market.valuation())
    }

    pub fn equity_share(&self) -> f64 {
        let total_equity = self.market.total_equity();
        if total_equity > 0.0 {
            self.equity() / total_equity
        } else {
            0.0
        }
    }

    pub fn stake_share(&self) -> f64 {
        let total_stake = self.market.total_stake();
        if total_stake > 0.0 {
            self.lp.stake() / total_stake
        } else {
            0.0
        }
    }

    pub fn fee_revenue(&self) -> f64 {
        self.market.fees_collected() * self.equity_share()
    }

    /// Fee revenue over a year on stake. Undefined for a zero stake.
    pub fn annualised_return(&self) -> Result<f64, ProviderError> {
        if self.lp.stake() == 0.0 {
            return Err(ProviderError::UndefinedReturn {
                name: self.name().to_string(),
            });
        }
        Ok(DAYS_PER_YEAR * self.fee_revenue() / self.lp.stake())
    }

    /// Margin of the obligation-meeting book at this snapshot's mark price.
    pub fn margin(&self) -> Result<f64, BookError> {
        if self.lp.sell_side_shape().is_none() && self.lp.buy_side_shape().is_none() {
            return Ok(0.0);
        }
        let ctx = self.market.snapshot().pricing_context()?;
        self.lp.margin(&ctx, self.obligation())
    }

    pub fn volume_meeting_obligation(
        &self,
        shape: &OrderSetForSide,
    ) -> Result<Vec<Volume>, BookError> {
        let ctx = self.market.snapshot().pricing_context()?;
        self.lp
            .volume_meeting_obligation(shape, &ctx, self.obligation())
    }

    pub fn check_if_volume_meets_obligation(
        &self,
        vol_array: &[Volume],
        shape: &OrderSetForSide,
    ) -> Result<bool, BookError> {
        let ctx = self.market.snapshot().pricing_context()?;
        self.lp
            .check_if_volume_meets_obligation(vol_array, shape, &ctx, self.obligation())
    }

    pub fn liquidity_summary(&self) -> Result<LiquiditySummary, BookError> {
        let ctx = self.market.snapshot().pricing_context()?;
        self.lp.liquidity_summary(&ctx, self.obligation())
    }

    pub fn field(&self, field: ProviderField) -> Result<f64, MechanismError> {
        let value = match field {
            ProviderField::Stake => self.stake(),
            ProviderField::FeeBid => self.fee_bid(),
            ProviderField::Equity => self.equity(),
            ProviderField::EquityShare => self.equity_share(),
            ProviderField::StakeShare => self.stake_share(),
            ProviderField::FeeRevenue => self.fee_revenue(),
            ProviderField::AnnualisedReturn => self.annualised_return()?,
            ProviderField::Margin => self.margin()?,
            ProviderField::EntryValuation => self.entry_valuation(),
            ProviderField::Obligation => self.obligation(),
        };
        Ok(value)
    }
}

impl fmt::Display for ProviderView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(stake={}, equity={:.1}%, fee_bid={})",
            self.name(),
            self.stake(),
            self.equity_share() * 100.0,
            self.fee_bid()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MarketHistory;
    use crate::market::{MarketConfig, StepUpdate};
    use crate::risk::RiskModel;
    use types::liquidity::Liquidity;

    fn lp(name: &str, stake: f64, fee_bid: f64) -> LiquidityProvider {
        LiquidityProvider::new(name, stake, fee_bid).unwrap()
    }

    fn history_with(liquidity: Liquidity, traded_volume: f64) -> MarketHistory {
        MarketHistory::new(MarketConfig {
            name: "BTC-PERP".to_string(),
            liquidity,
            mark_price: 1000.0,
            traded_volume,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_fee_rate_auction() {
        let bids = [lp("a", 100.0, 0.01), lp("b", 200.0, 0.02), lp("c", 50.0, 0.005)];
        assert_eq!(fee_rate_auction(&bids, 250.0), 0.02);
        assert_eq!(fee_rate_auction(&bids, 150.0), 0.01);
        assert_eq!(fee_rate_auction(&bids, 0.0), 0.005);
        // Target out of reach: highest bid
        assert_eq!(fee_rate_auction(&bids, 1_000.0), 0.02);
        assert_eq!(fee_rate_auction(std::iter::empty::<&LiquidityProvider>(), 10.0), 0.0);
    }

    #[test]
    fn test_fee_rate_auction_stable_on_ties() {
        let bids = [lp("a", 10.0, 0.01), lp("b", 10.0, 0.01), lp("c", 10.0, 0.03)];
        assert_eq!(fee_rate_auction(&bids, 20.0), 0.01);
    }

    #[test]
    fn test_valuation_warm_up() {
        let liquidity = Liquidity {
            valuation_period: 7,
            ..Default::default()
        };
        let mut history = history_with(liquidity, 10.0);
        history.next(StepUpdate::new().traded_volume(20.0)).unwrap();
        let view = history.next(StepUpdate::new().traded_volume(30.0)).unwrap();
        assert!((view.valuation() - 7.0 / 3.0 * 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_valuation_full_window() {
        let liquidity = Liquidity {
            valuation_period: 2,
            ..Default::default()
        };
        let mut history = history_with(liquidity, 10.0);
        history.next(StepUpdate::new().traded_volume(20.0)).unwrap();
        let view = history.next(StepUpdate::new().traded_volume(30.0)).unwrap();
        assert_eq!(view.valuation(), 50.0);
    }

    #[test]
    fn test_valuation_floored_at_total_stake() {
        let mut history = history_with(Liquidity::default(), 10.0);
        history.attach(lp("whale", 500.0, 0.01));
        assert_eq!(history.current().valuation(), 500.0);
    }

    #[test]
    fn test_target_stake_uses_window_peak() {
        let liquidity = Liquidity {
            stake_target_period: 2,
            ..Default::default()
        };
        let mut history = history_with(liquidity, 0.0);
        history.next(StepUpdate::new().open_interest(300.0)).unwrap();
        history.next(StepUpdate::new().open_interest(100.0)).unwrap();
        history.next(StepUpdate::new().open_interest(200.0)).unwrap();

        let rf = RiskModel::default().risk_factor_short();
        let expected = |oi: f64| oi * 1.0 * 5.0 * rf;
        assert!((history.view(2).unwrap().target_stake() - expected(300.0)).abs() < 1e-9);
        assert!((history.view(3).unwrap().target_stake() - expected(200.0)).abs() < 1e-9);
    }

    #[test]
    fn test_window_clipped_at_start() {
        let mut history = history_with(Liquidity::default(), 1.0);
        history.next(StepUpdate::new().traded_volume(2.0)).unwrap();
        let view = history.current();
        assert_eq!(view.window(10, |s| s.traded_volume), vec![1.0, 2.0]);
        assert_eq!(view.window(1, |s| s.traded_volume), vec![2.0]);
    }

    #[test]
    fn test_zero_stake_shares_are_zero() {
        let mut history = history_with(Liquidity::default(), 0.0);
        history.attach(lp("a", 0.0, 0.01));
        history.attach(lp("b", 0.0, 0.02));

        let view = history.current();
        for provider in view.providers() {
            assert_eq!(provider.equity_share(), 0.0);
            assert_eq!(provider.stake_share(), 0.0);
            assert_eq!(provider.fee_revenue(), 0.0);
        }
        assert_eq!(view.annualised_return(), 0.0);
        assert_eq!(view.annualised_return_on_capital().unwrap(), 0.0);
    }

    #[test]
    fn test_equity_grows_with_valuation() {
        let mut history = history_with(Liquidity::default(), 100.0);
        history.attach(lp("alice", 50.0, 0.01));
        history.next(StepUpdate::new().traded_volume(200.0)).unwrap();

        let view = history.current();
        let alice = view.provider("alice").unwrap();
        assert_eq!(alice.entry_valuation(), 100.0);
        assert_eq!(alice.equity(), 100.0);
        assert_eq!(view.total_equity(), 100.0);
        assert_eq!(alice.equity_share(), 1.0);
    }

    #[test]
    fn test_equity_with_zero_entry_valuation_is_stake() {
        let mut history = history_with(Liquidity::default(), 0.0);
        history.attach(lp("early", 0.0, 0.01));
        history.attach(lp("late", 10.0, 0.01));
        history.next(StepUpdate::new().traded_volume(40.0)).unwrap();

        let view = history.current();
        assert_eq!(view.provider("early").unwrap().equity(), 0.0);
        // Entry valuation 0 for "late" too: total stake was 0 at attach time
        assert_eq!(view.provider("late").unwrap().equity(), 10.0);
    }

    #[test]
    fn test_fees_and_returns() {
        let mut history = history_with(Liquidity::default(), 0.0);
        history.attach(lp("a", 100.0, 0.01));
        history.attach(lp("b", 100.0, 0.03));
        let view = history.next(StepUpdate::new().traded_volume(1000.0)).unwrap();

        // Zero open interest: target is met by the lowest bid
        assert_eq!(view.fee_rate(), 0.01);
        assert!((view.fees_collected() - 10.0).abs() < 1e-12);
        assert!((view.annualised_return() - 365.0 * 10.0 / 200.0).abs() < 1e-9);

        let shares: f64 = view.providers().map(|p| p.equity_share()).sum();
        assert!((shares - 1.0).abs() < 1e-12);
        let revenue: f64 = view.providers().map(|p| p.fee_revenue()).sum();
        assert!((revenue - view.fees_collected()).abs() < 1e-12);
    }

    #[test]
    fn test_annualised_return_undefined_for_zero_stake() {
        let mut history = history_with(Liquidity::default(), 10.0);
        history.attach(lp("idle", 0.0, 0.01));
        let view = history.current();
        let idle = view.provider("idle").unwrap();
        assert!(matches!(
            idle.annualised_return(),
            Err(ProviderError::UndefinedReturn { .. })
        ));
        assert!(matches!(
            view.provider_field("idle", ProviderField::AnnualisedReturn),
            Some(Err(MechanismError::Provider(_)))
        ));
    }

    #[test]
    fn test_provider_lookup() {
        let mut history = history_with(Liquidity::default(), 10.0);
        history.attach(lp("alice", 10.0, 0.01));
        let view = history.current();

        assert!(view.provider("bob").is_none());
        assert!(view.provider_field("bob", ProviderField::Stake).is_none());
        assert_eq!(
            view.provider_field("alice", ProviderField::Stake),
            Some(Ok(10.0))
        );
        assert!(matches!(
            view.require_provider("bob"),
            Err(ProviderError::NotFound { .. })
        ));
    }

    #[test]
    fn test_margin_follows_mark_price() {
        let mut history = history_with(Liquidity::default(), 10.0);
        let ctx = history.latest().pricing_context().unwrap();
        let offers = OrderSetForSide::new(true, vec![1.0; 10], vec![1.0; 10], &ctx).unwrap();
        let bids = OrderSetForSide::new(false, vec![1.0; 10], vec![1.0; 10], &ctx).unwrap();
        let provider = lp("mm", 1000.0, 0.01)
            .with_shapes(Some(offers), Some(bids))
            .unwrap();
        history.attach(provider);

        let before = history.current().total_margin().unwrap();
        history.next(StepUpdate::new().mark_price(2000.0)).unwrap();
        let after = history.current().total_margin().unwrap();
        assert!(before > 0.0);
        assert!(after != before);
        assert!(history.current().annualised_return_on_capital().unwrap() >= 0.0);
    }

    #[test]
    fn test_display() {
        let mut history = history_with(Liquidity::default(), 100.0);
        history.attach(lp("alice", 30.0, 0.01));
        history.attach(lp("bob", 10.0, 0.02));
        let view = history.current();
        assert_eq!(
            view.provider("alice").unwrap().to_string(),
            "alice(stake=30, equity=75.0%, fee_bid=0.01)"
        );
    }

    #[test]
    fn test_queries_are_idempotent() {
        let mut history = history_with(Liquidity::default(), 10.0);
        history.attach(lp("alice", 30.0, 0.01));
        let view = history.current();
        assert_eq!(view.valuation(), view.valuation());
        assert_eq!(view.fee_rate(), view.fee_rate());
        assert_eq!(view.total_equity(), view.total_equity());
    }
}
