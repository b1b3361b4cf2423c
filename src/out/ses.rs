use super::{Notification, Notifier};
use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_ses as ses;
use ses::types::{Body, Content, Destination, Message};

pub struct SesNotifier {
    client: ses::Client,
    from: String,
    to: String,
}

impl SesNotifier {
    pub fn new(conf: &aws_config::SdkConfig, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            client: ses::Client::new(conf),
            from: from.into(),
            to: to.into(),
        }
    }
}

fn message(n: &Notification) -> Result<Message> {
    Ok(Message::builder()
        .subject(Content::builder().data(n.subject()).charset("UTF-8").build()?)
        .body(
            Body::builder()
                .text(Content::builder().data(n.body()).charset("UTF-8").build()?)
                .build(),
        )
        .build())
}

#[async_trait]
impl Notifier for SesNotifier {
    fn name(&self) -> &'static str {
        "ses"
    }

    async fn notify(&self, n: &Notification) -> Result<()> {
        let message = message(n)?;
        self.client
            .send_email()
            .source(&self.from)
            .destination(Destination::builder().to_addresses(&self.to).build())
            .message(message)
            .send()
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Summary;
    use chrono::{NaiveDate, TimeZone, Utc};

    #[test]
    fn plain_text_message_carries_subject_and_link() {
        let n = Notification {
            report_date: NaiveDate::from_ymd_opt(2025, 9, 29).unwrap(),
            report_key: "reports/2025-09-29-aws-resource-report.xlsx".into(),
            url: "https://example.invalid/r".into(),
            link_ttl_hours: 24,
            summary: Summary::default(),
            generated_at: Utc.with_ymd_and_hms(2025, 9, 29, 0, 10, 0).unwrap(),
        };
        let m = message(&n).unwrap();
        let subject = m.subject().unwrap();
        assert_eq!(subject.data(), "AWS Resource Report - 2025-09-29");
        assert_eq!(subject.charset(), Some("UTF-8"));
        let text = m.body().unwrap().text().unwrap();
        assert!(text.data().contains("https://example.invalid/r"));
        assert!(m.body().unwrap().html().is_none());
    }
}
