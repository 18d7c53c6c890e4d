/*
 * This file is part of the IVMS Online.
 *
 * @copyright 2023 © by Rafał Wrzeszcz - Wrzasq.pl.
 */

use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::Error as DynamoDbError;
use std::env::VarError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Failed to load client configuration: {0}.")]
    ClientConfigLoadingError(#[from] VarError),
    #[error("Invalid value of {0}: {1}.")]
    InvalidConfiguration(&'static str, String),
    #[error("DynamoDB request failed: {0}.")]
    DynamoDbError(DynamoDbError),
    #[error("Failed to map DynamoDB item: {0}.")]
    SerializationError(#[from] serde_dynamo::Error),
}

impl<E, R> From<SdkError<E, R>> for RuntimeError
where
    DynamoDbError: From<SdkError<E, R>>,
{
    fn from(error: SdkError<E, R>) -> Self {
        Self::DynamoDbError(DynamoDbError::from(error))
    }
}
