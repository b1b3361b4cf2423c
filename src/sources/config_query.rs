use super::{InventoryPage, InventorySource};
use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_config as cfgsvc;

/// Current (non-deleted) configuration items, one JSON document each.
pub const CURRENT_RESOURCES_QUERY: &str = "SELECT resourceId, resourceType, tags, awsRegion, arn, \
     configurationItemCaptureTime, configurationItemStatus, \
     resourceCreationTime, configuration \
     WHERE configurationItemStatus IN ('ResourceDiscovered', 'OK')";

pub struct ConfigQueryInventory {
    client: cfgsvc::Client,
    expression: String,
}

impl ConfigQueryInventory {
    pub fn new(conf: &aws_config::SdkConfig) -> Self {
        Self {
            client: cfgsvc::Client::new(conf),
            expression: CURRENT_RESOURCES_QUERY.to_string(),
        }
    }
}

#[async_trait]
impl InventorySource for ConfigQueryInventory {
    fn name(&self) -> &'static str {
        "aws-config"
    }

    async fn fetch_page(&self, next_token: Option<String>) -> Result<InventoryPage> {
        let resp = self
            .client
            .select_resource_config()
            .expression(&self.expression)
            .set_next_token(next_token)
            .send()
            .await?;

        Ok(InventoryPage {
            results: resp.results().to_vec(),
            next_token: resp.next_token().map(|s| s.to_string()),
        })
    }
}
