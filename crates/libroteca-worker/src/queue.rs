use std::sync::{Arc, Weak};
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    ConfirmSelectOptions, QueueDeclareOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use libroteca_core::models::Job;
use libroteca_core::{Config, JobError};

use crate::context::JobHandlerContext;

/// Header carrying how many times a job has already been retried.
pub const RETRY_COUNT_HEADER: &str = "x-retry-count";
const DEATH_REASON_HEADER: &str = "x-death-reason";
const CONSUMER_TAG: &str = "libroteca-worker";

/// Queue parameters the worker needs, detached from the full app config.
#[derive(Debug, Clone)]
pub struct JobQueueConfig {
    pub queue_name: String,
    pub max_retries: u32,
    pub job_timeout: Duration,
}

impl JobQueueConfig {
    pub fn dead_letter_queue(&self) -> String {
        format!("{}.dead", self.queue_name)
    }
}

impl From<&Config> for JobQueueConfig {
    fn from(config: &Config) -> Self {
        Self {
            queue_name: config.queue_name.clone(),
            max_retries: config.max_job_retries,
            job_timeout: config.job_timeout(),
        }
    }
}

/// AMQP client for the enrichment queue.
///
/// Publishes jobs as persistent JSON messages with publisher confirms, and
/// runs the single consumer that drains the queue with `prefetch = 1` so
/// jobs are processed strictly one at a time. Failed jobs are either
/// republished with an incremented [`RETRY_COUNT_HEADER`] or parked on the
/// `<queue>.dead` side queue once the retry budget is spent.
#[derive(Clone)]
pub struct JobQueue {
    connection: Arc<Connection>,
    channel: Channel,
    config: JobQueueConfig,
}

impl JobQueue {
    /// Connect to the broker and declare the work queue and its dead-letter
    /// companion. Both are durable so jobs survive broker restarts.
    pub async fn connect(amqp_url: &str, config: JobQueueConfig) -> Result<Self> {
        let connection = Connection::connect(amqp_url, ConnectionProperties::default())
            .await
            .context("Failed to connect to AMQP broker")?;
        let channel = connection
            .create_channel()
            .await
            .context("Failed to open AMQP channel")?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .context("Failed to enable publisher confirms")?;

        let declare_options = QueueDeclareOptions {
            durable: true,
            ..Default::default()
        };
        channel
            .queue_declare(&config.queue_name, declare_options, FieldTable::default())
            .await
            .with_context(|| format!("Failed to declare queue '{}'", config.queue_name))?;
        channel
            .queue_declare(
                &config.dead_letter_queue(),
                declare_options,
                FieldTable::default(),
            )
            .await
            .with_context(|| {
                format!(
                    "Failed to declare dead-letter queue '{}'",
                    config.dead_letter_queue()
                )
            })?;

        tracing::info!(
            queue = %config.queue_name,
            dead_letter_queue = %config.dead_letter_queue(),
            "Connected to AMQP broker"
        );

        Ok(Self {
            connection: Arc::new(connection),
            channel,
            config,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connection.status().connected()
    }

    pub fn queue_name(&self) -> &str {
        &self.config.queue_name
    }

    /// Publish a single job with a fresh retry budget.
    pub async fn publish(&self, job: &Job) -> Result<()> {
        self.publish_with_retry_count(job, 0).await
    }

    /// Publish a batch of jobs, returning how many were enqueued.
    pub async fn publish_jobs(&self, jobs: &[Job]) -> Result<usize> {
        for job in jobs {
            self.publish(job).await?;
        }
        Ok(jobs.len())
    }

    /// Publish the broker liveness probe job. It is dispatched like any
    /// other job and acked by the no-op health handler.
    pub async fn publish_health_probe(&self) -> Result<()> {
        self.publish(&Job::health()).await
    }

    async fn publish_with_retry_count(&self, job: &Job, retry_count: u32) -> Result<()> {
        let payload = serde_json::to_vec(job).context("Failed to encode job")?;
        self.publish_raw(&self.config.queue_name, &payload, retry_headers(retry_count))
            .await
            .with_context(|| format!("Failed to publish {job}"))
    }

    async fn dead_letter(&self, payload: &[u8], retry_count: u32, reason: &str) -> Result<()> {
        let mut headers = retry_headers(retry_count);
        headers.insert(
            DEATH_REASON_HEADER.into(),
            AMQPValue::LongString(reason.to_string().into()),
        );
        self.publish_raw(&self.config.dead_letter_queue(), payload, headers)
            .await
            .context("Failed to publish to dead-letter queue")
    }

    async fn publish_raw(&self, queue: &str, payload: &[u8], headers: FieldTable) -> Result<()> {
        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(2)
            .with_headers(headers);
        let confirmation = self
            .channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                payload,
                properties,
            )
            .await
            .context("Failed to publish message")?
            .await
            .context("Broker did not confirm publish")?;
        if let Confirmation::Nack(_) = confirmation {
            anyhow::bail!("Broker rejected publish to '{}'", queue);
        }
        Ok(())
    }

    /// Register the queue consumer and spawn the processing loop.
    ///
    /// The loop holds only a [`Weak`] handle to the dispatch context, so it
    /// winds down once the application state is dropped.
    pub async fn start_consumer(&self, context: Weak<dyn JobHandlerContext>) -> Result<()> {
        self.channel
            .basic_qos(1, BasicQosOptions::default())
            .await
            .context("Failed to set channel prefetch")?;
        let consumer = self
            .channel
            .basic_consume(
                &self.config.queue_name,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .with_context(|| {
                format!("Failed to start consumer on '{}'", self.config.queue_name)
            })?;

        let queue = self.clone();
        tokio::spawn(async move { queue.consume_loop(consumer, context).await });
        Ok(())
    }

    async fn consume_loop(self, mut consumer: Consumer, context: Weak<dyn JobHandlerContext>) {
        tracing::info!(queue = %self.config.queue_name, prefetch = 1, "Job consumer started");
        while let Some(delivery) = consumer.next().await {
            let delivery = match delivery {
                Ok(delivery) => delivery,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to receive delivery");
                    continue;
                }
            };

            let Some(context) = context.upgrade() else {
                tracing::warn!("Job handler context dropped, stopping consumer");
                if let Err(e) = delivery
                    .nack(BasicNackOptions {
                        requeue: true,
                        ..Default::default()
                    })
                    .await
                {
                    tracing::warn!(error = %e, "Failed to requeue delivery during shutdown");
                }
                break;
            };

            if let Err(e) = self.handle_delivery(delivery, context).await {
                tracing::error!(error = %e, "Delivery handling failed");
            }
        }
        tracing::info!(queue = %self.config.queue_name, "Job consumer stopped");
    }

    async fn handle_delivery(
        &self,
        delivery: Delivery,
        context: Arc<dyn JobHandlerContext>,
    ) -> Result<()> {
        let retry_count = retry_count_from_headers(delivery.properties.headers().as_ref());

        let job: Job = match serde_json::from_slice(&delivery.data) {
            Ok(job) => job,
            Err(e) => {
                // A payload we cannot decode will never decode on redelivery.
                tracing::warn!(error = %e, "Undecodable job payload, dead-lettering");
                self.dead_letter(
                    &delivery.data,
                    retry_count,
                    &format!("undecodable payload: {e}"),
                )
                .await?;
                return self.ack(delivery).await;
            }
        };

        match tokio::time::timeout(self.config.job_timeout, context.dispatch_job(&job)).await {
            Ok(Ok(outcome)) => {
                tracing::info!(
                    job_id = job.id,
                    job_type = %job.job_type,
                    outcome = %outcome,
                    "Job finished"
                );
                self.ack(delivery).await
            }
            Ok(Err(e)) => {
                let unrecoverable = e
                    .downcast_ref::<JobError>()
                    .map(|job_error| !job_error.is_recoverable())
                    .unwrap_or(false);
                tracing::error!(
                    job_id = job.id,
                    job_type = %job.job_type,
                    retry_count,
                    unrecoverable,
                    error = %e,
                    "Job failed"
                );
                self.retry_or_dead_letter(&job, retry_count, unrecoverable, &format!("{e:#}"))
                    .await?;
                self.ack(delivery).await
            }
            Err(_) => {
                // Timeouts count as transient and consume a retry.
                tracing::error!(
                    job_id = job.id,
                    job_type = %job.job_type,
                    timeout_secs = self.config.job_timeout.as_secs(),
                    retry_count,
                    "Job timed out"
                );
                self.retry_or_dead_letter(&job, retry_count, false, "job timed out")
                    .await?;
                self.ack(delivery).await
            }
        }
    }

    async fn retry_or_dead_letter(
        &self,
        job: &Job,
        retry_count: u32,
        unrecoverable: bool,
        reason: &str,
    ) -> Result<()> {
        match decide_retry(retry_count, self.config.max_retries, unrecoverable) {
            RetryDecision::Retry(next_count) => {
                tracing::info!(
                    job_id = job.id,
                    job_type = %job.job_type,
                    retry_count = next_count,
                    max_retries = self.config.max_retries,
                    "Republishing job for retry"
                );
                self.publish_with_retry_count(job, next_count).await
            }
            RetryDecision::DeadLetter => {
                tracing::error!(
                    job_id = job.id,
                    job_type = %job.job_type,
                    retry_count,
                    reason,
                    "Dead-lettering job"
                );
                let payload = serde_json::to_vec(job).context("Failed to encode job")?;
                self.dead_letter(&payload, retry_count, reason).await
            }
        }
    }

    // The original delivery is always acked once its job has been routed
    // somewhere (handled, republished or dead-lettered). With prefetch = 1
    // the ack is also what releases the next delivery.
    async fn ack(&self, delivery: Delivery) -> Result<()> {
        delivery
            .ack(BasicAckOptions::default())
            .await
            .context("Failed to ack delivery")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RetryDecision {
    Retry(u32),
    DeadLetter,
}

pub(crate) fn decide_retry(
    retry_count: u32,
    max_retries: u32,
    unrecoverable: bool,
) -> RetryDecision {
    if unrecoverable || retry_count >= max_retries {
        RetryDecision::DeadLetter
    } else {
        RetryDecision::Retry(retry_count + 1)
    }
}

pub(crate) fn retry_count_from_headers(headers: Option<&FieldTable>) -> u32 {
    headers
        .and_then(|table| table.inner().get(RETRY_COUNT_HEADER))
        .map(|value| match value {
            AMQPValue::LongUInt(n) => *n,
            AMQPValue::LongInt(n) => u32::try_from(*n).unwrap_or(0),
            AMQPValue::LongLongInt(n) => u32::try_from(*n).unwrap_or(0),
            AMQPValue::ShortUInt(n) => u32::from(*n),
            AMQPValue::ShortShortUInt(n) => u32::from(*n),
            _ => 0,
        })
        .unwrap_or(0)
}

fn retry_headers(retry_count: u32) -> FieldTable {
    let mut headers = FieldTable::default();
    headers.insert(RETRY_COUNT_HEADER.into(), AMQPValue::LongUInt(retry_count));
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decide_retry_increments_under_cap() {
        assert_eq!(decide_retry(0, 5, false), RetryDecision::Retry(1));
        assert_eq!(decide_retry(4, 5, false), RetryDecision::Retry(5));
    }

    #[test]
    fn test_decide_retry_dead_letters_at_cap() {
        assert_eq!(decide_retry(5, 5, false), RetryDecision::DeadLetter);
        assert_eq!(decide_retry(7, 5, false), RetryDecision::DeadLetter);
    }

    #[test]
    fn test_decide_retry_dead_letters_unrecoverable_immediately() {
        assert_eq!(decide_retry(0, 5, true), RetryDecision::DeadLetter);
    }

    #[test]
    fn test_retry_count_missing_defaults_to_zero() {
        assert_eq!(retry_count_from_headers(None), 0);
        assert_eq!(retry_count_from_headers(Some(&FieldTable::default())), 0);
    }

    #[test]
    fn test_retry_count_roundtrips_through_headers() {
        let headers = retry_headers(4);
        assert_eq!(retry_count_from_headers(Some(&headers)), 4);
    }

    #[test]
    fn test_retry_count_tolerates_signed_and_bogus_values() {
        let mut headers = FieldTable::default();
        headers.insert(RETRY_COUNT_HEADER.into(), AMQPValue::LongInt(3));
        assert_eq!(retry_count_from_headers(Some(&headers)), 3);

        let mut headers = FieldTable::default();
        headers.insert(RETRY_COUNT_HEADER.into(), AMQPValue::LongInt(-2));
        assert_eq!(retry_count_from_headers(Some(&headers)), 0);

        let mut headers = FieldTable::default();
        headers.insert(
            RETRY_COUNT_HEADER.into(),
            AMQPValue::LongString("three".to_string().into()),
        );
        assert_eq!(retry_count_from_headers(Some(&headers)), 0);
    }

    #[test]
    fn test_dead_letter_queue_name() {
        let config = JobQueueConfig {
            queue_name: "books".to_string(),
            max_retries: 5,
            job_timeout: Duration::from_secs(300),
        };
        assert_eq!(config.dead_letter_queue(), "books.dead");
    }
}
