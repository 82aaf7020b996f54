//! Profitability dashboard: daily metrics and range summaries.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ProfitdashError, Result},
    subscription::UserId,
};

/// Longest range a summary may cover, in days.
pub const MAX_SUMMARY_DAYS: i64 = 366;

/// Metrics of one user for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyMetric {
    /// Owner.
    pub user_id: UserId,
    /// Day.
    pub date: NaiveDate,
    /// Revenue.
    pub revenue: Decimal,
    /// Cost of goods sold.
    pub cost_of_goods: Decimal,
    /// Ad spend.
    pub ad_spend: Decimal,
    /// Order count.
    pub orders: u32,
    /// When the entry was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Input for recording a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetricRequest {
    /// Day.
    pub date: NaiveDate,
    /// Revenue.
    pub revenue: Decimal,
    /// Cost of goods sold.
    #[serde(default)]
    pub cost_of_goods: Decimal,
    /// Ad spend.
    #[serde(default)]
    pub ad_spend: Decimal,
    /// Order count.
    #[serde(default)]
    pub orders: u32,
}

impl RecordMetricRequest {
    /// Validates the input and builds the metric.
    ///
    /// # Errors
    ///
    /// Returns [`ProfitdashError::Validation`] if a money value is negative.
    pub fn into_metric(self, user_id: UserId, now: DateTime<Utc>) -> Result<DailyMetric> {
        for (field, value) in [
            ("revenue", self.revenue),
            ("cost_of_goods", self.cost_of_goods),
            ("ad_spend", self.ad_spend),
        ] {
            if value.is_sign_negative() && !value.is_zero() {
                return Err(ProfitdashError::Validation(format!("{field} cannot be negative")));
            }
        }
        Ok(DailyMetric {
            user_id,
            date: self.date,
            revenue: self.revenue,
            cost_of_goods: self.cost_of_goods,
            ad_spend: self.ad_spend,
            orders: self.orders,
            recorded_at: now,
        })
    }
}

/// One day of the summary series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyProfit {
    /// Day.
    pub date: NaiveDate,
    /// Revenue.
    pub revenue: Decimal,
    /// Ad spend.
    pub ad_spend: Decimal,
    /// Revenue minus cost of goods minus ad spend.
    pub net_profit: Decimal,
    /// Orders.
    pub orders: u32,
}

/// Profitability over an inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitSummary {
    /// First day.
    pub from: NaiveDate,
    /// Last day.
    pub to: NaiveDate,
    /// Total revenue.
    pub revenue: Decimal,
    /// Total cost of goods.
    pub cost_of_goods: Decimal,
    /// Total ad spend.
    pub ad_spend: Decimal,
    /// Total orders.
    pub orders: u64,
    /// Revenue minus cost of goods.
    pub gross_profit: Decimal,
    /// Gross profit minus ad spend.
    pub net_profit: Decimal,
    /// Net profit as a percentage of revenue, 2 dp. `None` without revenue.
    pub margin_percent: Option<Decimal>,
    /// Revenue per unit of ad spend, 2 dp. `None` without ad spend.
    pub roas: Option<Decimal>,
    /// Revenue per order, 2 dp. `None` without orders.
    pub average_order_value: Option<Decimal>,
    /// Days with recorded metrics, oldest first.
    pub series: Vec<DailyProfit>,
}

/// Checks a summary range.
///
/// # Errors
///
/// Returns [`ProfitdashError::Validation`] if `from` is after `to` or the range
/// spans more than [`MAX_SUMMARY_DAYS`] days.
pub fn validate_range(from: NaiveDate, to: NaiveDate) -> Result<()> {
    if from > to {
        return Err(ProfitdashError::Validation("from must not be after to".into()));
    }
    if (to - from).num_days() >= MAX_SUMMARY_DAYS {
        return Err(ProfitdashError::Validation(format!(
            "range cannot exceed {MAX_SUMMARY_DAYS} days"
        )));
    }
    Ok(())
}

fn overflow() -> ProfitdashError {
    ProfitdashError::Validation("metric totals overflow".into())
}

fn sum(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_add(b).ok_or_else(overflow)
}

fn ratio(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    if denominator.is_zero() {
        return None;
    }
    numerator.checked_div(denominator).map(|r| {
        let mut rounded = r.round_dp(2);
        // Always two places, so `5` is reported as `5.00`.
        rounded.rescale(2);
        rounded
    })
}

/// Summarizes the metrics falling inside `from..=to`.
///
/// # Errors
///
/// Returns [`ProfitdashError::Validation`] on an invalid range or arithmetic overflow.
///
/// # Examples
///
/// ```
/// use chrono::{NaiveDate, Utc};
/// use profitdash::{
///     dashboard::{RecordMetricRequest, summarize},
///     subscription::UserId,
/// };
/// use rust_decimal::Decimal;
///
/// let day = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
/// let metric = RecordMetricRequest {
///     date: day,
///     revenue: Decimal::new(1000, 0),
///     cost_of_goods: Decimal::new(400, 0),
///     ad_spend: Decimal::new(250, 0),
///     orders: 20,
/// }
/// .into_metric(UserId::new("user-1").unwrap(), Utc::now())
/// .unwrap();
///
/// let summary = summarize(&[metric], day, day).unwrap();
/// assert_eq!(summary.net_profit, Decimal::new(350, 0));
/// assert_eq!(summary.roas, Some(Decimal::new(400, 2)));
/// ```
pub fn summarize(metrics: &[DailyMetric], from: NaiveDate, to: NaiveDate) -> Result<ProfitSummary> {
    validate_range(from, to)?;

    let mut in_range: Vec<&DailyMetric> =
        metrics.iter().filter(|m| m.date >= from && m.date <= to).collect();
    in_range.sort_by_key(|m| m.date);

    let mut revenue = Decimal::ZERO;
    let mut cost_of_goods = Decimal::ZERO;
    let mut ad_spend = Decimal::ZERO;
    let mut orders = 0_u64;
    let mut series = Vec::with_capacity(in_range.len());

    for metric in in_range {
        revenue = sum(revenue, metric.revenue)?;
        cost_of_goods = sum(cost_of_goods, metric.cost_of_goods)?;
        ad_spend = sum(ad_spend, metric.ad_spend)?;
        orders += u64::from(metric.orders);
        let net_profit = metric
            .revenue
            .checked_sub(metric.cost_of_goods)
            .and_then(|gross| gross.checked_sub(metric.ad_spend))
            .ok_or_else(overflow)?;
        series.push(DailyProfit {
            date: metric.date,
            revenue: metric.revenue,
            ad_spend: metric.ad_spend,
            net_profit,
            orders: metric.orders,
        });
    }

    let gross_profit = revenue.checked_sub(cost_of_goods).ok_or_else(overflow)?;
    let net_profit = gross_profit.checked_sub(ad_spend).ok_or_else(overflow)?;
    let margin_percent =
        net_profit.checked_mul(Decimal::ONE_HUNDRED).and_then(|scaled| ratio(scaled, revenue));

    Ok(ProfitSummary {
        from,
        to,
        revenue,
        cost_of_goods,
        ad_spend,
        orders,
        gross_profit,
        net_profit,
        margin_percent,
        roas: ratio(revenue, ad_spend),
        average_order_value: ratio(revenue, Decimal::from(orders)),
        series,
    })
}
