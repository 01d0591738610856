//! DynamoDB-backed user directory.
//!
//! Each role collection maps to its own table (`patients`, `doctors`,
//! `government`, optionally prefixed). Records are stored as a JSON document
//! under the `record` attribute with `user_id` as the partition key, and
//! creation is a conditional put so the duplicate-id check and the write are
//! one atomic operation.

use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::Region;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as AwsDynamoDbClient;
use tracing::info;

use super::{CreateOutcome, Error, Role, UserDirectory, UserRecord};

/// Configuration for DynamoDB connection and table naming
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// AWS region (e.g., "ap-south-1")
    pub region: String,
    /// Endpoint override, for local development
    pub endpoint: Option<String>,
    /// Prefix applied to the role collection table names
    pub table_prefix: Option<String>,
}

/// Client for the role-partitioned registration tables.
pub struct DynamoDbDirectory {
    client: AwsDynamoDbClient,
    config: DirectoryConfig,
}

impl DynamoDbDirectory {
    /// Creates a new directory backed by DynamoDB.
    pub async fn new(config: DirectoryConfig) -> Result<Self, Error> {
        let region_provider = RegionProviderChain::first_try(Region::new(config.region.clone()));
        let mut loader =
            aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region_provider);
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared_config = loader.load().await;
        let client = AwsDynamoDbClient::new(&shared_config);

        Ok(Self { client, config })
    }

    fn table_name(&self, role: Role) -> String {
        match &self.config.table_prefix {
            Some(prefix) => format!("{}{}", prefix, role.collection()),
            None => role.collection().to_string(),
        }
    }
}

#[async_trait]
impl UserDirectory for DynamoDbDirectory {
    async fn exists(&self, role: Role, user_id: &str) -> Result<bool, Error> {
        let output = self
            .client
            .get_item()
            .table_name(self.table_name(role))
            .key("user_id", AttributeValue::S(user_id.to_string()))
            .projection_expression("user_id")
            .send()
            .await
            .map_err(Error::GetItem)?;

        Ok(output.item.is_some())
    }

    async fn create(&self, record: &UserRecord) -> Result<CreateOutcome, Error> {
        let document = serde_json::to_string(record)?;

        let result = self
            .client
            .put_item()
            .table_name(self.table_name(record.role))
            .item("user_id", AttributeValue::S(record.user_id.clone()))
            .item("subject_id", AttributeValue::S(record.subject_id.clone()))
            .item("record", AttributeValue::S(document))
            .condition_expression("attribute_not_exists(user_id)")
            .send()
            .await;

        match result {
            Ok(_) => {
                info!(
                    "Created {} record with id {}",
                    record.role, record.user_id
                );
                Ok(CreateOutcome::Created)
            }
            Err(err)
                if err
                    .as_service_error()
                    .map(|e| e.is_conditional_check_failed_exception())
                    .unwrap_or(false) =>
            {
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(err) => Err(Error::PutItem(err)),
        }
    }

    async fn get(&self, role: Role, user_id: &str) -> Result<Option<UserRecord>, Error> {
        let output = self
            .client
            .get_item()
            .table_name(self.table_name(role))
            .key("user_id", AttributeValue::S(user_id.to_string()))
            .send()
            .await
            .map_err(Error::GetItem)?;

        let Some(item) = output.item else {
            return Ok(None);
        };

        let document = item
            .get("record")
            .and_then(|av| av.as_s().ok())
            .cloned()
            .unwrap_or_default();

        let record: UserRecord = serde_json::from_str(&document)?;
        Ok(Some(record))
    }
}
