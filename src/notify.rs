//! Opportunity alerts.
//!
//! Alerts are built from scored opportunities, filtered by the configured
//! alert criteria, and sent once per MLS number per channel. Delivery
//! failures are logged and counted; they never abort a run.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{AlertConfig, NotificationConfig};
use crate::db::Database;
use crate::error::{AnalyzerError, Result};
use crate::models::{MarketStatus, OpportunityDetail, UrgencyLevel, ZoneBreakdown, ZoneColor};
use crate::price::format_currency;
use crate::retry::RetryPolicy;

/// Everything a subscriber needs to judge a parcel at a glance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpportunityAlert {
    /// MLS identifier, the dedup key
    pub mls_number: String,
    /// Street address
    pub address: String,
    /// City name
    pub city: String,
    /// Asking price
    pub price: Option<f64>,
    /// Lot size in acres
    pub lot_acres: Option<f64>,
    /// Lot size in sqft
    pub lot_sqft: Option<f64>,
    /// Asking price per acre
    pub price_per_acre: Option<f64>,
    /// Score 0 to 100
    pub urgency_score: u8,
    /// Tier of the score
    pub urgency_level: UrgencyLevel,
    /// Street samples per color around the parcel
    pub zone_breakdown: ZoneBreakdown,
    /// Heat status of the parcel's market zone
    pub market_status: Option<MarketStatus>,
    /// Verdict text
    pub recommendation: String,
    /// Listing page
    pub url: Option<String>,
}

impl OpportunityAlert {
    /// Alert for a scored parcel and its listing
    #[must_use]
    pub fn from_detail(detail: &OpportunityDetail) -> Self {
        let OpportunityDetail {
            opportunity,
            property,
        } = detail;
        Self {
            mls_number: property.mls_number.clone(),
            address: property.address.clone(),
            city: property.city.clone(),
            price: property.effective_price(),
            lot_acres: property.lot_acres(),
            lot_sqft: property.lot_size,
            price_per_acre: opportunity.price_per_acre,
            urgency_score: opportunity.urgency_score,
            urgency_level: opportunity.urgency_level,
            zone_breakdown: opportunity.zone_breakdown,
            market_status: opportunity.market_status,
            recommendation: opportunity.recommendation.clone(),
            url: property.url.clone(),
        }
    }

    /// Telegram-flavored Markdown message
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut text = format!(
            "*{} LAND OPPORTUNITY*\n\n",
            self.urgency_level.as_str().to_uppercase()
        );
        let _ = writeln!(
            text,
            "*Location:* {}, {}",
            escape_markdown(&self.address),
            escape_markdown(&self.city)
        );
        if let Some(price) = self.price {
            let _ = writeln!(text, "*Price:* {}", format_currency(price));
        }
        if let (Some(acres), Some(sqft)) = (self.lot_acres, self.lot_sqft) {
            let _ = writeln!(
                text,
                "*Size:* {acres:.2} acres ({})",
                format_currency(sqft).trim_start_matches('$')
            );
        }
        if let Some(per_acre) = self.price_per_acre {
            let _ = writeln!(text, "*Price/Acre:* {}", format_currency(per_acre));
        }

        let _ = writeln!(
            text,
            "\n*Score:* {}/100 ({})",
            self.urgency_score, self.urgency_level
        );
        let zones = ZoneColor::ALL
            .iter()
            .map(|c| format!("{} {:.0}%", c.as_str(), self.zone_breakdown.percent(*c)))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(text, "*Nearby streets:* {}", escape_markdown(&zones));
        if let Some(status) = self.market_status {
            let _ = writeln!(text, "*Market:* {status}");
        }
        let _ = writeln!(text, "*Verdict:* {}", escape_markdown(&self.recommendation));

        let _ = write!(text, "\n*MLS:* {}", escape_markdown(&self.mls_number));
        if let Some(url) = &self.url {
            let _ = write!(text, "\n[View listing]({})", link_target(url));
        }
        text
    }
}

/// Escape characters that legacy Telegram Markdown treats as markup
fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Percent-encode the URL characters that would end the link or start markup
fn link_target(url: &str) -> String {
    let mut encoded = String::with_capacity(url.len());
    for c in url.chars() {
        match c {
            '(' | ')' | '[' | ']' | '_' | '*' | '`' | '\\' | ' ' => {
                let _ = write!(encoded, "%{:02X}", u32::from(c));
            }
            _ => encoded.push(c),
        }
    }
    encoded
}

/// A destination for opportunity alerts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Channel name used for de-duplication
    fn channel(&self) -> &'static str;

    async fn send(&self, alert: &OpportunityAlert) -> Result<()>;
}

/// Telegram Bot API delivery
pub struct TelegramNotifier {
    client: reqwest::Client,
    send_url: String,
    chat_id: String,
    retry: RetryPolicy,
}

impl TelegramNotifier {
    pub fn new(config: &NotificationConfig, bot_token: &str, chat_id: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            send_url: format!(
                "{}/bot{}/sendMessage",
                config.telegram_api_base.trim_end_matches('/'),
                bot_token
            ),
            chat_id: chat_id.to_string(),
            retry: RetryPolicy::new(config.max_attempts, Duration::from_secs(config.backoff_secs)),
        })
    }

    async fn post_once(&self, text: &str) -> Result<()> {
        let resp = self
            .client
            .post(&self.send_url)
            .json(&serde_json::json!({
                "chat_id": self.chat_id,
                "text": text,
                "parse_mode": "Markdown",
                "disable_web_page_preview": true,
            }))
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(AnalyzerError::external(
            "telegram",
            format!("HTTP {}: {}", status.as_u16(), body.chars().take(200).collect::<String>()),
        ))
    }
}

#[async_trait]
impl NotificationSink for TelegramNotifier {
    fn channel(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, alert: &OpportunityAlert) -> Result<()> {
        let text = alert.to_markdown();
        self.retry
            .run_if("telegram sendMessage", |_| self.post_once(&text), is_transient)
            .await
    }
}

/// Network failures, rate limits and server errors are worth another attempt
fn is_transient(error: &AnalyzerError) -> bool {
    match error {
        AnalyzerError::Http(_) => true,
        AnalyzerError::ExternalService { message, .. } => {
            message.starts_with("HTTP 429") || message.starts_with("HTTP 5")
        }
        _ => false,
    }
}

/// Writes alerts to the log; used when no channel is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    fn channel(&self) -> &'static str {
        "log"
    }

    async fn send(&self, alert: &OpportunityAlert) -> Result<()> {
        info!(
            mls = alert.mls_number,
            address = alert.address,
            score = alert.urgency_score,
            level = %alert.urgency_level,
            "Land opportunity alert"
        );
        Ok(())
    }
}

/// Telegram when credentials are configured, otherwise the log
pub fn sink_from_config(config: &NotificationConfig) -> Result<Arc<dyn NotificationSink>> {
    match (&config.telegram_bot_token, &config.telegram_chat_id) {
        (Some(token), Some(chat_id)) => Ok(Arc::new(TelegramNotifier::new(config, token, chat_id)?)),
        _ => {
            info!("Telegram not configured, alerts will be logged only");
            Ok(Arc::new(LogNotifier))
        }
    }
}

/// Which opportunities deserve an alert
#[derive(Debug, Clone)]
pub struct AlertFilter {
    pub min_level: UrgencyLevel,
    pub max_price: Option<f64>,
    pub min_lot_acres: Option<f64>,
    pub max_per_run: usize,
}

impl AlertFilter {
    #[must_use]
    pub fn from_config(config: &AlertConfig) -> Self {
        Self {
            min_level: config.min_level,
            max_price: config.max_price,
            min_lot_acres: config.min_lot_acres,
            max_per_run: config.max_per_run,
        }
    }

    /// Level, price and lot-size criteria; unknown price or size fails a set bound
    #[must_use]
    pub fn accepts(&self, detail: &OpportunityDetail) -> bool {
        if detail.opportunity.urgency_level < self.min_level {
            return false;
        }
        if let Some(max) = self.max_price {
            if detail.property.effective_price().is_none_or(|p| p > max) {
                return false;
            }
        }
        if let Some(min) = self.min_lot_acres {
            if detail.property.lot_acres().is_none_or(|a| a < min) {
                return false;
            }
        }
        true
    }
}

/// Outcome of one alert dispatch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Opportunities passing the filter
    pub matched: usize,
    /// Skipped because an alert already went out
    pub already_sent: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Send alerts for new opportunities that pass `filter`, best first.
///
/// Successful deliveries are recorded so the same parcel is not alerted twice
/// on the same channel. Only store errors are returned.
pub async fn dispatch_alerts(
    db: &Database,
    sink: &dyn NotificationSink,
    opportunities: &[OpportunityDetail],
    filter: &AlertFilter,
    now: DateTime<Utc>,
) -> Result<DispatchReport> {
    let channel = sink.channel();
    let mut report = DispatchReport::default();

    for detail in opportunities.iter().filter(|d| filter.accepts(d)) {
        report.matched += 1;
        let mls = &detail.property.mls_number;

        if db.was_alerted(mls, channel)? {
            report.already_sent += 1;
            continue;
        }
        if report.sent + report.failed >= filter.max_per_run {
            continue;
        }

        let alert = OpportunityAlert::from_detail(detail);
        match sink.send(&alert).await {
            Ok(()) => {
                db.record_alert(mls, channel, alert.urgency_score, now)?;
                report.sent += 1;
            }
            Err(e) => {
                warn!(mls, channel, error = %e, "Alert delivery failed");
                report.failed += 1;
            }
        }
    }

    info!(
        channel,
        matched = report.matched,
        sent = report.sent,
        failed = report.failed,
        already_sent = report.already_sent,
        "Alert dispatch complete"
    );
    Ok(report)
}
