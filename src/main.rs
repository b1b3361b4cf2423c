use aws_config::BehaviorVersion;
use aws_types::region::Region;
use resource_delta_report::config::{Config, LogFormat, NotifyMode, StorageMode};
use resource_delta_report::out::{ses::SesNotifier, Notifier, StdoutNotifier};
use resource_delta_report::publish::ReportPublisher;
use resource_delta_report::sources::cloudtrail::CloudTrailAudit;
use resource_delta_report::sources::config_query::ConfigQueryInventory;
use resource_delta_report::sources::mock::{MockAudit, MockInventory};
use resource_delta_report::sources::{AuditSource, InventorySource};
use resource_delta_report::store::fs::FsBlobStore;
use resource_delta_report::store::s3::S3BlobStore;
use resource_delta_report::store::{BlobStore, SnapshotStore};
use resource_delta_report::{Pipeline, ReportError};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::from_env()?;
    init_tracing(cfg.log_format);

    let conf = aws_config::defaults(BehaviorVersion::latest()).load().await;
    let pipeline = build_pipeline(&cfg, &conf).await?;

    match pipeline.run(chrono::Utc::now()).await {
        Ok(outcome) => {
            info!(report = %outcome.report_key, notified = outcome.notified, "run complete");
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "run failed, no snapshot or report was published");
            Err(e.into())
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn build_pipeline(cfg: &Config, conf: &aws_config::SdkConfig) -> Result<Pipeline, ReportError> {
    let (inventory, audit): (Arc<dyn InventorySource>, Arc<dyn AuditSource>) = if cfg.mock {
        info!(dir = %cfg.mock_dir.display(), "mock mode: reading fixtures");
        (
            Arc::new(MockInventory::new(&cfg.mock_dir)),
            Arc::new(MockAudit::new(&cfg.mock_dir)),
        )
    } else {
        (
            Arc::new(ConfigQueryInventory::new(conf)),
            Arc::new(CloudTrailAudit::new(conf)),
        )
    };

    let blobs: Arc<dyn BlobStore> = match cfg.storage_mode {
        StorageMode::Fs => Arc::new(FsBlobStore::new(&cfg.storage_dir)),
        StorageMode::S3 => {
            let bucket = cfg
                .bucket
                .clone()
                .ok_or_else(|| ReportError::Config("REPORT_S3_BUCKET is not set".into()))?;
            Arc::new(S3BlobStore::new(conf, bucket))
        }
    };

    let notifier: Arc<dyn Notifier> = match cfg.notify_mode {
        NotifyMode::Stdout => Arc::new(StdoutNotifier),
        NotifyMode::Ses => match (&cfg.email_from, &cfg.email_to) {
            (Some(from), Some(to)) => {
                let ses_conf = match &cfg.ses_region {
                    Some(region) => {
                        aws_config::defaults(BehaviorVersion::latest())
                            .region(Region::new(region.clone()))
                            .load()
                            .await
                    }
                    None => conf.clone(),
                };
                Arc::new(SesNotifier::new(&ses_conf, from, to))
            }
            _ => return Err(ReportError::Config("EMAIL_FROM and EMAIL_TO must be set".into())),
        },
    };

    Ok(Pipeline {
        inventory,
        audit,
        snapshots: SnapshotStore::new(blobs.clone()),
        publisher: ReportPublisher::new(blobs, notifier, cfg.link_ttl),
        retry: cfg.retry,
        resolve_concurrency: cfg.resolve_concurrency,
        retention_days: cfg.retention_days,
    })
}
