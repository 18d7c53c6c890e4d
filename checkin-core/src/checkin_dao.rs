/*
 * This file is part of the IVMS Online.
 *
 * @copyright 2023 © by Rafał Wrzeszcz - Wrzasq.pl.
 */

use crate::checkin::CheckinStore;
use crate::model::{Checkin, Profile, Vehicle};
use crate::runtime_error::RuntimeError;
use crate::suppression::SuppressionKey;
use async_trait::async_trait;
use aws_config::{load_defaults, BehaviorVersion};
use aws_sdk_dynamodb::config::Builder;
use aws_sdk_dynamodb::types::AttributeValue::{self, N, S};
use aws_sdk_dynamodb::types::Select;
use aws_sdk_dynamodb::Client;
use chrono::{NaiveDate, NaiveTime};
use serde::de::DeserializeOwned;
use serde_dynamo::{from_item, to_item};
use std::collections::HashMap;
use std::env::var;
use tracing::{info_span, warn, Instrument, Span};

const HASH_KEY: &str = "suppressionKey";
const RANGE_KEY: &str = "windowBucket";
const QUERY_PAGE_SIZE: i32 = 100;

pub struct CheckinDao {
    client: Box<Client>,
    checkins_table: String,
    vehicles_table: String,
    profiles_table: String,
}

/**
Required environment variables:
<dl>
    <dt><code>CHECKINS_TABLE</code></dt>
    <dd>Name of DynamoDB check-ins table.</dd>
    <dt><code>VEHICLES_TABLE</code></dt>
    <dd>Name of DynamoDB vehicles table.</dd>
    <dt><code>PROFILES_TABLE</code></dt>
    <dd>Name of DynamoDB profiles table.</dd>
</dl>

Optional environment variables:
<dl>
    <dt><code>DYNAMODB_ENDPOINT_URL</code></dt>
    <dd>Custom DynamoDB endpoint, for example DynamoDB Local.</dd>
</dl>
 */
impl CheckinDao {
    pub async fn load_from_env() -> Result<Self, RuntimeError> {
        let config = &load_defaults(BehaviorVersion::latest()).await;
        let checkins_table = var("CHECKINS_TABLE")?;
        let vehicles_table = var("VEHICLES_TABLE")?;
        let profiles_table = var("PROFILES_TABLE")?;

        let client = match var("DYNAMODB_ENDPOINT_URL") {
            Ok(endpoint_url) => Client::from_conf(Builder::from(config).endpoint_url(endpoint_url).build()),
            Err(_) => Client::new(config),
        };

        Ok(Self::new(client, checkins_table, vehicles_table, profiles_table))
    }

    pub fn new(client: Client, checkins_table: String, vehicles_table: String, profiles_table: String) -> Self {
        Self {
            client: Box::new(client),
            checkins_table,
            vehicles_table,
            profiles_table,
        }
    }

    async fn get_by_id<T: DeserializeOwned>(
        &self,
        table_name: &str,
        key_name: &str,
        id: &str,
    ) -> Result<Option<T>, RuntimeError> {
        self.client
            .get_item()
            .table_name(table_name)
            .key(key_name, S(id.into()))
            .send()
            .instrument(self.instrumentation(table_name))
            .await?
            .item
            .map(from_item::<_, T>)
            .map_or(Ok(None), |item| item.map(Some))
            .map_err(RuntimeError::from)
    }

    fn instrumentation(&self, table_name: &str) -> Span {
        info_span!(
            "dynamodb",
            region = self.client.config().region().map(|value| value.to_string()).as_deref(),
            table = table_name,
        )
    }
}

#[async_trait]
impl CheckinStore for CheckinDao {
    async fn get_vehicle(&self, vehicle_id: &str) -> Result<Option<Vehicle>, RuntimeError> {
        self.get_by_id(self.vehicles_table.as_str(), "vehicleId", vehicle_id).await
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, RuntimeError> {
        self.get_by_id(self.profiles_table.as_str(), "userId", user_id).await
    }

    async fn find_duplicate(
        &self,
        key: &SuppressionKey,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<bool, RuntimeError> {
        let mut pages = self
            .client
            .query()
            .table_name(self.checkins_table.as_str())
            .key_condition_expression("suppressionKey = :suppressionKey")
            .filter_expression("#date = :date AND #time = :time")
            .expression_attribute_names("#date", "date")
            .expression_attribute_names("#time", "time")
            .expression_attribute_values(":suppressionKey", S(key.to_string()))
            .expression_attribute_values(":date", S(date.to_string()))
            .expression_attribute_values(":time", S(time.to_string()))
            .select(Select::Count)
            .scan_index_forward(false)
            .limit(QUERY_PAGE_SIZE)
            .into_paginator()
            .send();

        // newest buckets first, stops at the first page with a match
        async move {
            while let Some(page) = pages.next().await {
                if page?.count > 0 {
                    return Ok(true);
                }
            }

            Ok::<_, RuntimeError>(false)
        }
        .instrument(self.instrumentation(self.checkins_table.as_str()))
        .await
    }

    async fn latest_checkin(&self, key: &SuppressionKey) -> Result<Option<Checkin>, RuntimeError> {
        let results = self
            .client
            .query()
            .table_name(self.checkins_table.as_str())
            .key_condition_expression("suppressionKey = :suppressionKey")
            .expression_attribute_values(":suppressionKey", S(key.to_string()))
            .scan_index_forward(false)
            .limit(1)
            .send()
            .instrument(self.instrumentation(self.checkins_table.as_str()))
            .await?;

        results
            .items
            .and_then(|items| items.into_iter().next())
            .map(from_item::<_, Checkin>)
            .map_or(Ok(None), |checkin| checkin.map(Some))
            .map_err(RuntimeError::from)
    }

    async fn create_checkin(&self, key: &SuppressionKey, bucket: i64, checkin: Checkin) -> Result<bool, RuntimeError> {
        let item: HashMap<String, AttributeValue> = to_item(checkin)?;

        let result = self
            .client
            .put_item()
            .table_name(self.checkins_table.as_str())
            .set_item(Some(item))
            .item(HASH_KEY, S(key.to_string()))
            .item(RANGE_KEY, N(bucket.to_string()))
            .condition_expression("attribute_not_exists(suppressionKey)")
            .send()
            .instrument(self.instrumentation(self.checkins_table.as_str()))
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(error)
                if error
                    .as_service_error()
                    .map_or(false, |error| error.is_conditional_check_failed_exception()) =>
            {
                warn!(key = %key, bucket, "Suppression bucket already taken.");
                Ok(false)
            }
            Err(error) => Err(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::checkin_dao::{HASH_KEY, QUERY_PAGE_SIZE, RANGE_KEY};
    use crate::{Checkin, CheckinDao, CheckinStore, RuntimeError, SuppressionKey};
    use async_trait::async_trait;
    use aws_config::{load_defaults, BehaviorVersion};
    use aws_sdk_dynamodb::config::Builder;
    use aws_sdk_dynamodb::types::{
        AttributeDefinition, AttributeValue::N, AttributeValue::S, KeySchemaElement, KeyType, ProvisionedThroughput,
        ScalarAttributeType,
    };
    use aws_sdk_dynamodb::Client;
    use chrono::{FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use test_context::{test_context, AsyncTestContext};
    use tokio::test as tokio_test;

    struct DynamoDbTestContext {
        client: Box<Client>,
        dao: Box<CheckinDao>,
        tables: Vec<String>,
    }

    static NUMBER: AtomicUsize = AtomicUsize::new(0);

    static VEHICLE_ID: &str = "v1";
    static OWNER_ID: &str = "u1";
    static DEVICE_ID: &str = "d1";

    fn key() -> SuppressionKey {
        SuppressionKey::of(VEHICLE_ID, Some(DEVICE_ID), "10.0.0.1")
    }

    fn checkin(hour: u32) -> Checkin {
        Checkin {
            vehicle_id: VEHICLE_ID.into(),
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            amount: 2.5,
            device_id: Some(DEVICE_ID.into()),
            client_ip: "10.0.0.1".into(),
            valid_month: Some("2024-05".into()),
            passenger_count: 1,
            created_at: Utc
                .with_ymd_and_hms(2024, 5, 1, hour - 2, 0, 0)
                .unwrap()
                .with_timezone(&FixedOffset::east_opt(7200).unwrap()),
        }
    }

    async fn create_table(client: &Client, table_name: &str, hash_key: &str, range_key: Option<&str>) {
        let mut request = client
            .create_table()
            .table_name(table_name)
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name(hash_key)
                    .attribute_type(ScalarAttributeType::S)
                    .build()
                    .unwrap(),
            )
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name(hash_key)
                    .key_type(KeyType::Hash)
                    .build()
                    .unwrap(),
            )
            .provisioned_throughput(
                ProvisionedThroughput::builder()
                    .read_capacity_units(1000)
                    .write_capacity_units(1000)
                    .build()
                    .unwrap(),
            );

        if let Some(range_key) = range_key {
            request = request
                .attribute_definitions(
                    AttributeDefinition::builder()
                        .attribute_name(range_key)
                        .attribute_type(ScalarAttributeType::N)
                        .build()
                        .unwrap(),
                )
                .key_schema(
                    KeySchemaElement::builder()
                        .attribute_name(range_key)
                        .key_type(KeyType::Range)
                        .build()
                        .unwrap(),
                );
        }

        request.send().await.unwrap();
    }

    #[async_trait]
    impl AsyncTestContext for DynamoDbTestContext {
        async fn setup() -> DynamoDbTestContext {
            let number = NUMBER.fetch_add(1, Ordering::SeqCst);
            let tables = vec![
                format!("Checkins{number}"),
                format!("Vehicles{number}"),
                format!("Profiles{number}"),
            ];
            let config = load_defaults(BehaviorVersion::latest()).await;
            let local_config = Builder::from(&config).endpoint_url("http://localhost:8000").build();
            let client = Client::from_conf(local_config);

            create_table(&client, &tables[0], HASH_KEY, Some(RANGE_KEY)).await;
            create_table(&client, &tables[1], "vehicleId", None).await;
            create_table(&client, &tables[2], "userId", None).await;

            client
                .put_item()
                .table_name(tables[1].as_str())
                .item("vehicleId", S(VEHICLE_ID.into()))
                .item("registrationPlate", S("AB-123-CD".into()))
                .item("ownerUserId", S(OWNER_ID.into()))
                .send()
                .await
                .unwrap();
            client
                .put_item()
                .table_name(tables[2].as_str())
                .item("userId", S(OWNER_ID.into()))
                .item("firstName", S("Marie".into()))
                .item("lastName", S("Curie".into()))
                .send()
                .await
                .unwrap();

            DynamoDbTestContext {
                client: Box::new(client.clone()),
                dao: Box::new(CheckinDao::new(
                    client,
                    tables[0].clone(),
                    tables[1].clone(),
                    tables[2].clone(),
                )),
                tables,
            }
        }

        async fn teardown(self) {
            for table_name in self.tables {
                self.client.delete_table().table_name(table_name).send().await.unwrap();
            }
        }
    }

    #[test_context(DynamoDbTestContext)]
    #[tokio_test]
    async fn get_vehicle(ctx: &DynamoDbTestContext) -> Result<(), RuntimeError> {
        let vehicle = ctx.dao.get_vehicle(VEHICLE_ID).await?.unwrap();
        assert_eq!("AB-123-CD", vehicle.registration_plate);
        assert_eq!(Some(OWNER_ID.to_string()), vehicle.owner_user_id);
        assert!(vehicle.display_driver_name.is_none());

        Ok(())
    }

    #[test_context(DynamoDbTestContext)]
    #[tokio_test]
    async fn get_vehicle_unexisting(ctx: &DynamoDbTestContext) -> Result<(), RuntimeError> {
        assert!(ctx.dao.get_vehicle("v2").await?.is_none());

        Ok(())
    }

    #[test_context(DynamoDbTestContext)]
    #[tokio_test]
    async fn get_profile(ctx: &DynamoDbTestContext) -> Result<(), RuntimeError> {
        let profile = ctx.dao.get_profile(OWNER_ID).await?.unwrap();
        assert_eq!(Some("Marie".to_string()), profile.first_name);

        Ok(())
    }

    #[test_context(DynamoDbTestContext)]
    #[tokio_test]
    async fn create_checkin(ctx: &DynamoDbTestContext) -> Result<(), RuntimeError> {
        assert!(ctx.dao.create_checkin(&key(), 100, checkin(8)).await?);

        let item = ctx
            .client
            .get_item()
            .table_name(ctx.tables[0].as_str())
            .key(HASH_KEY, S(key().to_string()))
            .key(RANGE_KEY, N("100".into()))
            .send()
            .await?
            .item
            .unwrap();
        assert_eq!("2024-05-01T08:00:00+02:00", item["createdAt"].as_s().unwrap());
        assert_eq!("1", item["passengerCount"].as_n().unwrap());
        assert_eq!("08:00:00", item["time"].as_s().unwrap());

        Ok(())
    }

    #[test_context(DynamoDbTestContext)]
    #[tokio_test]
    async fn create_checkin_taken_bucket(ctx: &DynamoDbTestContext) -> Result<(), RuntimeError> {
        assert!(ctx.dao.create_checkin(&key(), 100, checkin(8)).await?);
        assert!(!ctx.dao.create_checkin(&key(), 100, checkin(9)).await?);

        Ok(())
    }

    #[test_context(DynamoDbTestContext)]
    #[tokio_test]
    async fn latest_checkin(ctx: &DynamoDbTestContext) -> Result<(), RuntimeError> {
        assert!(ctx.dao.latest_checkin(&key()).await?.is_none());

        ctx.dao.create_checkin(&key(), 100, checkin(8)).await?;
        ctx.dao.create_checkin(&key(), 104, checkin(9)).await?;

        let latest = ctx.dao.latest_checkin(&key()).await?.unwrap();
        assert_eq!(NaiveTime::from_hms_opt(9, 0, 0).unwrap(), latest.time);

        Ok(())
    }

    #[test_context(DynamoDbTestContext)]
    #[tokio_test]
    async fn find_duplicate(ctx: &DynamoDbTestContext) -> Result<(), RuntimeError> {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        ctx.dao.create_checkin(&key(), 100, checkin(8)).await?;

        assert!(
            ctx.dao
                .find_duplicate(&key(), date, NaiveTime::from_hms_opt(8, 0, 0).unwrap())
                .await?
        );
        assert!(
            !ctx.dao
                .find_duplicate(&key(), date, NaiveTime::from_hms_opt(9, 0, 0).unwrap())
                .await?
        );

        Ok(())
    }

    #[test_context(DynamoDbTestContext)]
    #[tokio_test]
    async fn find_duplicate_beyond_first_page(ctx: &DynamoDbTestContext) -> Result<(), RuntimeError> {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        ctx.dao.create_checkin(&key(), 1, checkin(8)).await?;
        for bucket in 2..(QUERY_PAGE_SIZE as i64 + 20) {
            ctx.dao.create_checkin(&key(), bucket, checkin(9)).await?;
        }

        assert!(
            ctx.dao
                .find_duplicate(&key(), date, NaiveTime::from_hms_opt(8, 0, 0).unwrap())
                .await?
        );
        assert!(
            !ctx.dao
                .find_duplicate(&key(), date, NaiveTime::from_hms_opt(10, 0, 0).unwrap())
                .await?
        );

        Ok(())
    }
}
