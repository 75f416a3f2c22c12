//! Shared helpers for tracker-bound commands.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use tokio::sync::{broadcast, watch};

use studente_core::inbound::ServiceUpdate;
use studente_core::{AuthState, Dashboard, InboundMessage, Service};

use crate::cli::ServiceArg;
use crate::config::Resolved;
use crate::error::CliError;

/// Time given to the socket task to write queued frames before exit.
const FLUSH_GRACE: Duration = Duration::from_millis(150);

/// Open the link, failing with a connection error after `timeout`.
pub async fn connect(dashboard: &Dashboard, timeout: Duration) -> Result<(), CliError> {
    dashboard.connect();
    dashboard.wait_connected(timeout).await?;
    tracing::info!(url = %dashboard.connection().url(), "connected");
    Ok(())
}

/// Shut the dashboard down and let the last frames reach the socket.
pub async fn finish(dashboard: &Dashboard) {
    dashboard.shutdown();
    tokio::time::sleep(FLUSH_GRACE).await;
}

/// Wait on a watch channel until `pred` holds, returning the value seen.
pub async fn wait_for<T: Clone>(
    rx: &mut watch::Receiver<T>,
    timeout: Duration,
    pred: impl FnMut(&T) -> bool,
) -> Result<T, CliError> {
    match tokio::time::timeout(timeout, rx.wait_for(pred)).await {
        Ok(Ok(value)) => Ok(T::clone(&value)),
        Ok(Err(_)) => Err(CliError::Disconnected),
        Err(_) => Err(CliError::Timeout {
            seconds: timeout.as_secs(),
        }),
    }
}

/// Next broadcast update matching `pred`.
pub async fn next_update(
    rx: &mut broadcast::Receiver<Arc<InboundMessage>>,
    timeout: Duration,
    mut pred: impl FnMut(&InboundMessage) -> bool,
) -> Result<Arc<InboundMessage>, CliError> {
    let wait = async {
        loop {
            match rx.recv().await {
                Ok(msg) if pred(&msg) => return Ok(msg),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "update receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return Err(CliError::Disconnected),
            }
        }
    };
    tokio::time::timeout(timeout, wait)
        .await
        .map_err(|_| CliError::Timeout {
            seconds: timeout.as_secs(),
        })?
}

/// Log in with `password` and wait for the tracker's verdict.
pub async fn login(
    dashboard: &Dashboard,
    profile: &str,
    password: &SecretString,
    timeout: Duration,
) -> Result<(), CliError> {
    let mut auth = dashboard.store().subscribe_auth();
    auth.borrow_and_update();
    dashboard.session().verify_password(password)?;
    settle_auth(&mut auth, profile, timeout).await
}

/// Log in when the profile has a password; `Ok(false)` when it has none.
pub async fn login_if_configured(
    dashboard: &Dashboard,
    resolved: &Resolved,
) -> Result<bool, CliError> {
    let Some(password) = resolved.password()? else {
        tracing::debug!(profile = %resolved.profile_name, "no password configured, skipping login");
        return Ok(false);
    };
    login(dashboard, &resolved.profile_name, &password, resolved.timeout).await?;
    Ok(true)
}

/// Wait until the auth state reports success, failure or first-run setup.
pub async fn settle_auth(
    auth: &mut watch::Receiver<AuthState>,
    profile: &str,
    timeout: Duration,
) -> Result<(), CliError> {
    let state = wait_for(auth, timeout, |a| {
        a.authenticated || a.error.is_some() || a.initial_setup
    })
    .await?;

    if state.authenticated {
        Ok(())
    } else if let Some(message) = state.error {
        Err(CliError::AuthFailed {
            profile: profile.into(),
            message,
        })
    } else {
        Err(CliError::InitialSetupRequired)
    }
}

pub fn services(arg: ServiceArg) -> &'static [Service] {
    match arg {
        ServiceArg::Ec2 => &[Service::Ec2],
        ServiceArg::Ecs => &[Service::Ecs],
        ServiceArg::Eks => &[Service::Eks],
        ServiceArg::All => &[Service::Ec2, Service::Ecs, Service::Eks],
    }
}

/// Services whose data (or error) `msg` carries.
pub fn services_in(msg: &InboundMessage) -> Vec<Service> {
    fn of_update(update: &ServiceUpdate) -> Option<Service> {
        match update {
            ServiceUpdate::Ec2 {
                instances: Some(_), ..
            } => Some(Service::Ec2),
            ServiceUpdate::Ecs(_) => Some(Service::Ecs),
            ServiceUpdate::Eks(_) => Some(Service::Eks),
            _ => None,
        }
    }

    match msg {
        InboundMessage::Service(update)
        | InboundMessage::ResourceUpdate(update)
        | InboundMessage::Legacy(update) => of_update(update).into_iter().collect(),
        InboundMessage::ResourceError { service, .. } => vec![*service],
        InboundMessage::Content(content) => {
            let mut found = Vec::new();
            if content.instances.is_some() {
                found.push(Service::Ec2);
            }
            if content.ecs_clusters.is_some() {
                found.push(Service::Ecs);
            }
            if content.eks_clusters.is_some() {
                found.push(Service::Eks);
            }
            found
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use studente_core::classify;

    use super::*;

    #[test]
    fn services_in_reads_every_payload_shape() {
        let ec2 = classify(&json!({
            "type": "AWS_EC2_UPDATE",
            "content": {"instances": [{"id": "i-1"}]},
        }));
        assert_eq!(services_in(&ec2), vec![Service::Ec2]);

        let err = classify(&json!({"type": "AWS_EKS_ERROR", "content": {"message": "denied"}}));
        assert_eq!(services_in(&err), vec![Service::Eks]);

        let timer = classify(&json!({"type": "TIMER_TICK", "content": {"nowtime": 1000}}));
        assert!(services_in(&timer).is_empty());
    }

    #[test]
    fn all_expands_to_three_services() {
        assert_eq!(services(ServiceArg::All).len(), 3);
        assert_eq!(services(ServiceArg::Ecs), &[Service::Ecs]);
    }

    #[tokio::test]
    async fn wait_for_times_out_with_seconds() {
        let (_tx, mut rx) = watch::channel(0_u8);
        let err = wait_for(&mut rx, Duration::from_millis(20), |v| *v > 0)
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Timeout { seconds: 0 }));
    }

    #[tokio::test]
    async fn settle_auth_reports_first_run_setup() {
        let (tx, mut rx) = watch::channel(AuthState::default());
        tx.send_modify(|a| a.initial_setup = true);
        let err = settle_auth(&mut rx, "default", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::InitialSetupRequired));
    }
}
