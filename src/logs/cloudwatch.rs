//! AWS CloudWatch Logs implementation of [`LogsApi`]
//!
//! Wraps `aws_sdk_cloudwatchlogs::Client` and maps SDK types and errors onto
//! the crate's own request/response types.
//!
//! Reading a stream uses `GetLogEvents`. When no stream is configured the
//! whole group is read with `FilterLogEvents`. Its `nextToken` only pages
//! through one read and disappears once the results are exhausted, so
//! progress across reads is tracked by the fetcher from event timestamps
//! and ids instead.

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_cloudwatchlogs::error::{DisplayErrorContext, SdkError};
use aws_sdk_cloudwatchlogs::operation::describe_log_streams::DescribeLogStreamsError;
use aws_sdk_cloudwatchlogs::operation::filter_log_events::FilterLogEventsError;
use aws_sdk_cloudwatchlogs::operation::get_log_events::GetLogEventsError;
use aws_sdk_cloudwatchlogs::Client;
use tracing::{debug, info};

use super::{
    DescribeStreamsRequest, EventsPage, GetEventsRequest, LogEvent, LogsApi, LogsApiError,
    StreamsPage,
};
use crate::config::AwsConfig;

/// CloudWatch Logs client backed by the AWS SDK.
#[derive(Debug, Clone)]
pub struct CloudWatchLogsClient {
    client: Client,
}

impl CloudWatchLogsClient {
    /// Wrap an already configured SDK client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the `aws` configuration section.
    ///
    /// Region and endpoint fall back to the SDK's default provider chain when
    /// unset. Static credentials are used only when both the key id and the
    /// secret are configured; otherwise the default credential chain applies.
    ///
    /// # Arguments
    ///
    /// * `config` - AWS connection settings
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use cwlogs_tail::config::AwsConfig;
    /// use cwlogs_tail::logs::CloudWatchLogsClient;
    ///
    /// # async fn example() {
    /// let client = CloudWatchLogsClient::from_config(&AwsConfig::default()).await;
    /// # }
    /// ```
    pub async fn from_config(config: &AwsConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }

        if let Some(endpoint) = &config.endpoint {
            debug!(endpoint = %endpoint, "Using custom CloudWatch Logs endpoint");
            loader = loader.endpoint_url(endpoint);
        }

        if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            debug!("Using explicit AWS credentials");
            let credentials =
                Credentials::new(access_key, secret_key, None, None, "cwlogs-tail-static");
            loader = loader.credentials_provider(credentials);
        }

        let sdk_config = loader.load().await;

        info!(
            region = ?sdk_config.region().map(|r| r.as_ref().to_string()),
            "CloudWatch Logs client initialized"
        );

        Self::new(Client::new(&sdk_config))
    }

    async fn filter_group_events(
        &self,
        request: GetEventsRequest,
    ) -> Result<EventsPage, LogsApiError> {
        let output = self
            .client
            .filter_log_events()
            .log_group_name(request.log_group_name)
            .set_start_time(request.start_time)
            .set_end_time(request.end_time)
            .set_next_token(request.next_token)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, FilterLogEventsError::is_resource_not_found_exception))?;

        let events = output
            .events()
            .iter()
            .map(|e| LogEvent {
                timestamp_millis: e.timestamp().unwrap_or_default(),
                message: e.message().unwrap_or_default().to_string(),
                ingestion_time: e.ingestion_time(),
                event_id: e.event_id().map(str::to_string),
            })
            .collect();

        Ok(EventsPage {
            events,
            next_forward_token: output.next_token().map(str::to_string),
        })
    }
}

#[async_trait]
impl LogsApi for CloudWatchLogsClient {
    async fn describe_log_streams(
        &self,
        request: DescribeStreamsRequest,
    ) -> Result<StreamsPage, LogsApiError> {
        let output = self
            .client
            .describe_log_streams()
            .log_group_name(request.log_group_name)
            .set_log_stream_name_prefix(request.log_stream_name_prefix)
            .set_next_token(request.next_token)
            .send()
            .await
            .map_err(|e| {
                map_sdk_error(e, DescribeLogStreamsError::is_resource_not_found_exception)
            })?;

        let stream_names = output
            .log_streams()
            .iter()
            .filter_map(|s| s.log_stream_name().map(str::to_string))
            .collect();

        Ok(StreamsPage {
            stream_names,
            next_token: output.next_token().map(str::to_string),
        })
    }

    async fn get_log_events(&self, request: GetEventsRequest) -> Result<EventsPage, LogsApiError> {
        let Some(stream) = request.log_stream_name.clone() else {
            return self.filter_group_events(request).await;
        };

        let output = self
            .client
            .get_log_events()
            .log_group_name(request.log_group_name)
            .log_stream_name(stream)
            .set_start_time(request.start_time)
            .set_end_time(request.end_time)
            .set_next_token(request.next_token)
            .start_from_head(request.start_from_head)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, GetLogEventsError::is_resource_not_found_exception))?;

        let events = output
            .events()
            .iter()
            .map(|e| LogEvent {
                timestamp_millis: e.timestamp().unwrap_or_default(),
                message: e.message().unwrap_or_default().to_string(),
                ingestion_time: e.ingestion_time(),
                event_id: None,
            })
            .collect();

        Ok(EventsPage {
            events,
            next_forward_token: output.next_forward_token().map(str::to_string),
        })
    }
}

/// Classify an SDK error as not-found, service or transport failure.
fn map_sdk_error<E, R>(err: SdkError<E, R>, is_not_found: fn(&E) -> bool) -> LogsApiError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let not_found = err.as_service_error().map(is_not_found);
    let detail = DisplayErrorContext(&err).to_string();

    match not_found {
        Some(true) => LogsApiError::ResourceNotFound(detail),
        Some(false) => LogsApiError::Service(detail),
        None => LogsApiError::Transport(detail),
    }
}
