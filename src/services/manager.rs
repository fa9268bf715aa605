use axum::body::Bytes;
use axum::http::{HeaderMap, Method, Uri, header};
use tokio::sync::mpsc;

use crate::classify::{self, Action};
use crate::error::Result;
use crate::models::{StackStatus, describe};
use crate::proxy::{ForwardedResponse, ProxyForwarder};
use crate::registry::StackRegistry;

/// Ties the relay together: classify, track, forward, rewrite, notify.
#[derive(Clone)]
pub struct Manager {
    registry: StackRegistry,
    forwarder: ProxyForwarder,
    notify_tx: mpsc::Sender<()>,
}

impl Manager {
    pub fn new(
        registry: StackRegistry,
        forwarder: ProxyForwarder,
        notify_tx: mpsc::Sender<()>,
    ) -> Self {
        Self {
            registry,
            forwarder,
            notify_tx,
        }
    }

    /// Relays one inbound request. The caller gets the real upstream
    /// status, headers and body, except when the body is deliberately
    /// rewritten for a skipped stack.
    pub async fn relay(
        &self,
        method: Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<ForwardedResponse> {
        // Classification reads the body as text; the forwarded bytes stay
        // untouched.
        let request = classify::classify(&String::from_utf8_lossy(&body));
        self.track_create(&request);

        let response = self.forwarder.forward(method, uri, headers, body).await?;

        if request.action == Action::DescribeStacks {
            if let Some(name) = &request.stack_name {
                if let Some(rewritten) = self.settle_describe(name, &response)? {
                    return Ok(rewritten);
                }
            }
        }

        Ok(response)
    }

    /// Registers a new stack for a create-change-set request. Requests
    /// without a stack name are left untracked.
    fn track_create(&self, request: &classify::ProvisionRequest) {
        if request.action != Action::CreateChangeSet {
            return;
        }
        let Some(name) = &request.stack_name else {
            return;
        };

        let stack = self.registry.add(name, request.is_create);
        tracing::info!("tracking stack {} (id {})", stack.name, stack.id);
        self.trigger_broadcast();
    }

    /// Post-forward handling of a describe poll for a tracked stack.
    /// Returns a replacement response when the stack is skipped.
    fn settle_describe(
        &self,
        name: &str,
        response: &ForwardedResponse,
    ) -> Result<Option<ForwardedResponse>> {
        let Some(stack) = self.registry.get_by_name(name) else {
            // Not a stack we track; the real reply goes back untouched.
            return Ok(None);
        };

        if stack.status == StackStatus::Skipped {
            // The upstream call already happened; only the reported status
            // lies. The polling tool must not be able to tell.
            let body = describe::rewrite_stack_status(&response.body, stack.synthetic_status());
            let mut rewritten = response.clone();
            rewritten.headers.remove(header::CONTENT_LENGTH);
            rewritten.body = Bytes::from(body);
            return Ok(Some(rewritten));
        }

        if !response.status.is_success() {
            // Throttling and API errors are not status updates.
            return Ok(None);
        }

        let raw_status = describe::extract_stack_status(&response.body)?;
        if self.registry.apply_backend_status(name, &raw_status)? {
            tracing::info!("stack {} moved on {}", name, raw_status);
            self.trigger_broadcast();
        }

        Ok(None)
    }

    fn trigger_broadcast(&self) {
        // Best effort; the refresh ticker re-renders the card soon anyway.
        if self.notify_tx.try_send(()).is_err() {
            tracing::debug!("broadcast queue full; dropping trigger");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn manager() -> (Manager, StackRegistry, mpsc::Receiver<()>) {
        let registry = StackRegistry::new();
        let forwarder = ProxyForwarder::new("cloudformation.us-east-1.amazonaws.com".to_string())
            .expect("client builds");
        let (tx, rx) = mpsc::channel(8);
        (Manager::new(registry.clone(), forwarder, tx), registry, rx)
    }

    fn describe_reply(status: &str) -> ForwardedResponse {
        let body = format!(
            "<DescribeStacksResponse><DescribeStacksResult><Stacks><member>\
             <StackStatus>{}</StackStatus>\
             </member></Stacks></DescribeStacksResult></DescribeStacksResponse>",
            status
        );
        ForwardedResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::from(body),
        }
    }

    #[test]
    fn a_create_change_set_registers_a_stack() {
        let (manager, registry, mut rx) = manager();

        let request =
            classify::classify("Action=CreateChangeSet&StackName=orders-api&ChangeSetType=CREATE&");
        manager.track_create(&request);

        let stacks = registry.snapshot();
        assert_eq!(stacks.len(), 1);
        assert_eq!(stacks[0].id, 0);
        assert_eq!(stacks[0].name, "orders-api");
        assert!(stacks[0].create);
        assert_eq!(stacks[0].status, StackStatus::Working);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn an_update_change_set_registers_a_non_create_stack() {
        let (manager, registry, _rx) = manager();

        let request =
            classify::classify("Action=CreateChangeSet&StackName=orders-api&ChangeSetType=UPDATE&");
        manager.track_create(&request);

        assert!(!registry.get_by_name("orders-api").unwrap().create);
    }

    #[test]
    fn describe_polls_do_not_register_stacks() {
        let (manager, registry, _rx) = manager();

        let request = classify::classify("Action=DescribeStacks&StackName=orders-api&");
        manager.track_create(&request);

        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn a_describe_reply_advances_the_tracked_stack() {
        let (manager, registry, mut rx) = manager();
        registry.add("orders-api", true);

        let result = manager
            .settle_describe("orders-api", &describe_reply("CREATE_COMPLETE"))
            .unwrap();
        assert!(result.is_none());
        assert_eq!(
            registry.get_by_name("orders-api").unwrap().status,
            StackStatus::Done
        );
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn an_in_progress_reply_changes_nothing() {
        let (manager, registry, mut rx) = manager();
        registry.add("orders-api", true);

        let result = manager
            .settle_describe("orders-api", &describe_reply("UPDATE_IN_PROGRESS"))
            .unwrap();
        assert!(result.is_none());
        assert_eq!(
            registry.get_by_name("orders-api").unwrap().status,
            StackStatus::Working
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn a_skipped_stack_gets_a_forged_success_reply() {
        let (manager, registry, _rx) = manager();
        registry.add("orders-api", true);
        registry.mark_skipped("orders-api").unwrap();

        let rewritten = manager
            .settle_describe("orders-api", &describe_reply("UPDATE_ROLLBACK_FAILED"))
            .unwrap()
            .expect("skipped stacks rewrite the reply");

        let body = String::from_utf8(rewritten.body.to_vec()).unwrap();
        assert!(body.contains("<StackStatus>CREATE_COMPLETE</StackStatus>"));
        assert!(!body.contains("UPDATE_ROLLBACK_FAILED"));
        // The true status must not leak into the state machine either.
        assert_eq!(
            registry.get_by_name("orders-api").unwrap().status,
            StackStatus::Skipped
        );
    }

    #[test]
    fn a_skipped_update_stack_forges_update_complete() {
        let (manager, registry, _rx) = manager();
        registry.add("orders-api", false);
        registry.mark_skipped("orders-api").unwrap();

        let rewritten = manager
            .settle_describe("orders-api", &describe_reply("UPDATE_IN_PROGRESS"))
            .unwrap()
            .expect("skipped stacks rewrite the reply");

        let body = String::from_utf8(rewritten.body.to_vec()).unwrap();
        assert!(body.contains("<StackStatus>UPDATE_COMPLETE</StackStatus>"));
    }

    #[test]
    fn untracked_stacks_pass_through() {
        let (manager, _registry, mut rx) = manager();
        let result = manager
            .settle_describe("nobody", &describe_reply("CREATE_COMPLETE"))
            .unwrap();
        assert!(result.is_none());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn upstream_error_replies_are_not_status_updates() {
        let (manager, registry, _rx) = manager();
        registry.add("orders-api", true);

        let reply = ForwardedResponse {
            status: StatusCode::BAD_REQUEST,
            headers: HeaderMap::new(),
            body: Bytes::from_static(b"<ErrorResponse><Error>Throttling</Error></ErrorResponse>"),
        };
        let result = manager.settle_describe("orders-api", &reply).unwrap();
        assert!(result.is_none());
        assert_eq!(
            registry.get_by_name("orders-api").unwrap().status,
            StackStatus::Working
        );
    }

    #[test]
    fn a_malformed_success_reply_is_an_error() {
        let (manager, registry, _rx) = manager();
        registry.add("orders-api", true);

        let reply = ForwardedResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::from_static(b"definitely not xml"),
        };
        let err = manager.settle_describe("orders-api", &reply).unwrap_err();
        assert!(matches!(err, crate::error::AppError::MalformedReply(_)));
    }
}
