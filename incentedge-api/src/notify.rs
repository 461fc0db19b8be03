//! Notification and activity-log side effects.
//!
//! Both run on spawned tasks with a log-and-continue contract: a failed
//! insert is logged, never surfaced as a request failure.

use crate::db::DbClient;
use incentedge_core::{ApplicationId, OrgId, UserId};
use serde_json::Value as JsonValue;

/// Notify a user about an application. Fire-and-forget.
pub fn notify_user(
    db: &DbClient,
    org_id: OrgId,
    user_id: UserId,
    application_id: ApplicationId,
    message: String,
) {
    let db = db.clone();
    tokio::spawn(async move {
        if let Err(e) = db
            .notification_insert(org_id, user_id, application_id, &message)
            .await
        {
            tracing::warn!(
                org_id = %org_id,
                user_id = %user_id,
                application_id = %application_id,
                error = %e,
                "Failed to insert notification"
            );
        }
    });
}

/// Append an activity-log row. Fire-and-forget.
pub fn log_activity(
    db: &DbClient,
    org_id: OrgId,
    actor: UserId,
    application_id: ApplicationId,
    action: &'static str,
    detail: JsonValue,
) {
    let db = db.clone();
    tokio::spawn(async move {
        if let Err(e) = db
            .activity_log_insert(org_id, actor, application_id, action, &detail)
            .await
        {
            tracing::warn!(
                org_id = %org_id,
                actor = %actor,
                application_id = %application_id,
                action,
                error = %e,
                "Failed to append activity log"
            );
        }
    });
}
