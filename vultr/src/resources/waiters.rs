//! State-change waits shared by the storage resources
//!
//! Each wait is a [`StateChangeConf`] over one API getter. The refresh closure
//! derives a state string from the fetched object and the classifier sorts the
//! API errors into transient, not-found and fatal.

use crate::api::block_storage::BlockStorage;
use crate::api::vfs::{Attachment, VirtualFileSystemStorage};
use crate::api::{ApiError, Client};
use std::time::Duration;
use tfplug::context::Context;
use tfplug::retry::{Converged, ErrorClass, NotFoundPolicy, StateChangeConf, WaitError};
use tfplug::types::Diagnostic;

/// Poll timings used by the resources
///
/// Carried in the provider data so tests can shrink every wait.
#[derive(Debug, Clone, PartialEq)]
pub struct PollSettings {
    /// Wait before the first status check after create
    pub ready_delay: Duration,
    pub ready_interval: Duration,
    /// Consecutive not-found answers tolerated while a new object shows up
    pub ready_not_found_checks: u32,
    pub attach_interval: Duration,
    pub attach_timeout: Duration,
    /// Pause before re-fetching after a "Nothing to change" answer
    pub transient_retry_delay: Duration,
    /// Same pause used by the pre-detach lookup on update
    pub prefetch_retry_delay: Duration,
    pub vfs_attach_interval: Duration,
    pub vfs_attach_timeout: Duration,
    pub vfs_delete_retry_interval: Duration,
    /// Slack kept between the delete retry loop and the delete timeout
    pub vfs_delete_margin: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            ready_delay: Duration::from_secs(10),
            ready_interval: Duration::from_secs(3),
            ready_not_found_checks: 3,
            attach_interval: Duration::from_secs(1),
            attach_timeout: Duration::from_secs(30),
            transient_retry_delay: Duration::from_secs(2),
            prefetch_retry_delay: Duration::from_secs(1),
            vfs_attach_interval: Duration::from_secs(2),
            vfs_attach_timeout: Duration::from_secs(30),
            vfs_delete_retry_interval: Duration::from_secs(5),
            vfs_delete_margin: Duration::from_secs(60),
        }
    }
}

impl PollSettings {
    /// Millisecond timings for tests against a mock API
    pub fn immediate() -> Self {
        Self {
            ready_delay: Duration::ZERO,
            ready_interval: Duration::from_millis(5),
            ready_not_found_checks: 3,
            attach_interval: Duration::from_millis(5),
            attach_timeout: Duration::from_millis(300),
            transient_retry_delay: Duration::from_millis(5),
            prefetch_retry_delay: Duration::from_millis(5),
            vfs_attach_interval: Duration::from_millis(5),
            vfs_attach_timeout: Duration::from_millis(300),
            vfs_delete_retry_interval: Duration::from_millis(5),
            vfs_delete_margin: Duration::ZERO,
        }
    }
}

/// The smaller of `limit` and what is left of the request deadline
pub(crate) fn budget(ctx: &Context, limit: Duration) -> Duration {
    match ctx.remaining() {
        Some(remaining) => remaining.min(limit),
        None => limit,
    }
}

pub(crate) fn wait_failed(summary: &str, err: WaitError<ApiError>) -> Diagnostic {
    Diagnostic::error(summary, err.to_string())
}

/// Block storage lookups answer "Invalid block storage ID" once the volume is gone
pub(crate) fn block_is_gone(err: &ApiError) -> bool {
    err.is_not_found() || err.contains("Invalid block storage ID")
}

fn classify_block(err: &ApiError) -> ErrorClass {
    if err.is_nothing_to_change() {
        ErrorClass::Transient
    } else if block_is_gone(err) {
        ErrorClass::NotFound
    } else {
        ErrorClass::Fatal
    }
}

fn classify_vfs(err: &ApiError) -> ErrorClass {
    if err.is_nothing_to_change() {
        ErrorClass::Transient
    } else if err.is_not_found() {
        ErrorClass::NotFound
    } else {
        ErrorClass::Fatal
    }
}

/// Waits for a new volume to leave `pending` and become `active`
pub(crate) async fn wait_for_block_available(
    ctx: &Context,
    client: &Client,
    id: &str,
    poll: &PollSettings,
    timeout: Duration,
) -> Result<Converged<BlockStorage>, WaitError<ApiError>> {
    tracing::info!("Waiting for block storage {} to become active", id);
    let api = client.block_storage();

    StateChangeConf::new(format!("block storage {}", id), &["active"])
        .pending(&["pending"])
        .delay(poll.ready_delay)
        .poll_interval(poll.ready_interval)
        .timeout(budget(ctx, timeout))
        .transient_retry_delay(poll.transient_retry_delay)
        .not_found(NotFoundPolicy::Tolerate(poll.ready_not_found_checks))
        .classify(classify_block)
        .wait_for_state(ctx, move || async move {
            let block = api.get(id).await?;
            tracing::debug!("Block storage {} status is {}", id, block.status);
            let status = block.status.clone();
            Ok::<_, ApiError>((block, status))
        })
        .await
}

/// Waits until the volume reports `instance_id` together with a mount id
pub(crate) async fn wait_for_block_attached(
    ctx: &Context,
    client: &Client,
    id: &str,
    instance_id: &str,
    poll: &PollSettings,
) -> Result<Converged<BlockStorage>, WaitError<ApiError>> {
    tracing::info!(
        "Waiting for block storage {} to attach to instance {}",
        id,
        instance_id
    );
    let api = client.block_storage();

    StateChangeConf::new(
        format!("attachment of block storage {} to {}", id, instance_id),
        &["attached"],
    )
    .delay(poll.attach_interval)
    .poll_interval(poll.attach_interval)
    .timeout(budget(ctx, poll.attach_timeout))
    .transient_retry_delay(poll.transient_retry_delay)
    .classify(classify_block)
    .wait_for_state(ctx, move || async move {
        let block = api.get(id).await?;
        let state = if block.is_mounted_on(instance_id) {
            "attached"
        } else {
            "attaching"
        };
        Ok::<_, ApiError>((block, state.to_string()))
    })
    .await
}

/// Waits until the volume is attached to nothing. A vanished volume counts
/// as detached.
pub(crate) async fn wait_for_block_detached(
    ctx: &Context,
    client: &Client,
    id: &str,
    poll: &PollSettings,
) -> Result<Converged<BlockStorage>, WaitError<ApiError>> {
    tracing::info!("Waiting for block storage {} to detach", id);
    let api = client.block_storage();

    StateChangeConf::new(format!("detachment of block storage {}", id), &["detached"])
        .delay(poll.attach_interval)
        .poll_interval(poll.attach_interval)
        .timeout(budget(ctx, poll.attach_timeout))
        .transient_retry_delay(poll.transient_retry_delay)
        .not_found(NotFoundPolicy::Success)
        .classify(classify_block)
        .wait_for_state(ctx, move || async move {
            let block = api.get(id).await?;
            let state = if block.is_attached() {
                "attached"
            } else {
                "detached"
            };
            Ok::<_, ApiError>((block, state.to_string()))
        })
        .await
}

/// Fetches the volume once, retrying a single "Nothing to change" answer.
///
/// `Ok(None)` means the API kept answering with the transient error and the
/// current state could not be observed.
pub(crate) async fn fetch_block_settled(
    ctx: &Context,
    client: &Client,
    id: &str,
    poll: &PollSettings,
) -> Result<Option<BlockStorage>, WaitError<ApiError>> {
    let api = client.block_storage();

    let converged = StateChangeConf::new(format!("block storage {}", id), &["observed"])
        .timeout(budget(ctx, poll.attach_timeout))
        .transient_retry_delay(poll.prefetch_retry_delay)
        .classify(classify_block)
        .wait_for_state(ctx, move || async move {
            let block = api.get(id).await?;
            Ok::<_, ApiError>((block, "observed".to_string()))
        })
        .await?;

    Ok(converged.into_snapshot())
}

/// Waits for a new file system subscription to become `active`
pub(crate) async fn wait_for_vfs_available(
    ctx: &Context,
    client: &Client,
    id: &str,
    poll: &PollSettings,
    timeout: Duration,
) -> Result<Converged<VirtualFileSystemStorage>, WaitError<ApiError>> {
    tracing::info!("Waiting for virtual file system storage {} to become active", id);
    let api = client.vfs();

    StateChangeConf::new(format!("virtual file system storage {}", id), &["active"])
        .pending(&["pending"])
        .delay(poll.ready_delay)
        .poll_interval(poll.ready_interval)
        .timeout(budget(ctx, timeout))
        .transient_retry_delay(poll.transient_retry_delay)
        .not_found(NotFoundPolicy::Tolerate(poll.ready_not_found_checks))
        .classify(classify_vfs)
        .wait_for_state(ctx, move || async move {
            let vfs = api.get(id).await?;
            let status = vfs.status.clone();
            Ok::<_, ApiError>((vfs, status))
        })
        .await
}

/// Waits for an attachment to reach `ATTACHED`. The attachment may take a
/// few polls to show up at all.
pub(crate) async fn wait_for_vfs_attachment(
    ctx: &Context,
    client: &Client,
    id: &str,
    instance_id: &str,
    poll: &PollSettings,
) -> Result<Converged<Attachment>, WaitError<ApiError>> {
    let api = client.vfs();
    let checks = poll.vfs_attach_timeout.as_millis() / poll.vfs_attach_interval.as_millis().max(1);

    StateChangeConf::new(
        format!("attachment of {} to virtual file system storage {}", instance_id, id),
        &[crate::api::vfs::ATTACHMENT_ATTACHED],
    )
    .delay(poll.vfs_attach_interval)
    .poll_interval(poll.vfs_attach_interval)
    .timeout(budget(ctx, poll.vfs_attach_timeout))
    .transient_retry_delay(poll.transient_retry_delay)
    .not_found(NotFoundPolicy::Tolerate(
        u32::try_from(checks).unwrap_or(u32::MAX),
    ))
    .classify(classify_vfs)
    .wait_for_state(ctx, move || async move {
        let attachment = api.attachment(id, instance_id).await?;
        tracing::debug!(
            "Attachment of {} to {} is {}",
            instance_id,
            id,
            attachment.state
        );
        let state = attachment.state.clone();
        Ok::<_, ApiError>((attachment, state))
    })
    .await
}
