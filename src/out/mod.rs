use crate::model::{Classification, Summary};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

pub mod ses;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub report_date: NaiveDate,
    pub report_key: String,
    pub url: String,
    pub link_ttl_hours: u64,
    pub summary: Summary,
    pub generated_at: DateTime<Utc>,
}

impl Notification {
    pub fn subject(&self) -> String {
        format!("AWS Resource Report - {}", self.report_date)
    }

    pub fn body(&self) -> String {
        let legend = Classification::ALL
            .iter()
            .map(|c| format!("{}: {} resources", c.color_name(), c))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "AWS Resource Daily Report - {date}\n\n\
             Summary of Changes:\n{summary}\n\n\
             Total Resources Tracked: {total}\n\n\
             Color Coding:\n{legend}\n\n\
             Download your detailed Excel report here:\n{url}\n\n\
             This link expires in {ttl} hours.\n\n\
             Report generated at: {at} UTC",
            date = self.report_date,
            summary = self.summary.to_text(),
            total = self.summary.total(),
            url = self.url,
            ttl = self.link_ttl_hours,
            at = self.generated_at.format("%Y-%m-%d %H:%M:%S"),
        )
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;
    async fn notify(&self, n: &Notification) -> Result<()>;
}

pub struct StdoutNotifier;

#[async_trait]
impl Notifier for StdoutNotifier {
    fn name(&self) -> &'static str {
        "stdout"
    }

    async fn notify(&self, n: &Notification) -> Result<()> {
        println!("{}\n\n{}", n.subject(), n.body());
        Ok(())
    }
}
