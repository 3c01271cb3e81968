//! Bridge connection seam.
//!
//! The controller talks to the videobridge through [`BridgeConnection`]:
//! awaited requests get the bridge's reply, fire-and-forget requests only
//! get handed to the transport. Timeouts are applied by the caller, so an
//! implementation may wait for a reply indefinitely.

use super::model::{BridgeReply, ColibriRequest};
use crate::errors::ColibriError;
use async_trait::async_trait;

/// Request/reply transport to a videobridge.
#[async_trait]
pub trait BridgeConnection: Send + Sync {
    /// Send a request and wait for the bridge's reply.
    ///
    /// # Errors
    ///
    /// - `ColibriError::Transport` - the request could not be sent
    async fn send_and_await_reply(
        &self,
        request: ColibriRequest,
    ) -> Result<BridgeReply, ColibriError>;

    /// Send a request without waiting for a reply.
    ///
    /// # Errors
    ///
    /// - `ColibriError::Transport` - the request could not be sent
    async fn send(&self, request: ColibriRequest) -> Result<(), ColibriError>;
}

/// Mock bridge connection for testing.
///
/// Replies are scripted in order; every request is recorded.
pub mod mock {
    use super::*;
    use crate::colibri::model::{ConferenceDescription, ErrorCondition};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Mutex, PoisonError};

    /// Scripted behaviour for one awaited request.
    #[derive(Debug, Clone)]
    pub enum MockReply {
        /// Answer with a conference description.
        Conference(ConferenceDescription),
        /// Answer with an error element.
        Error(ErrorCondition),
        /// Answer with something that is not a conference.
        Unexpected(String),
        /// Never answer.
        Timeout,
        /// Fail the send.
        Disconnected,
    }

    /// A request seen by the mock.
    #[derive(Debug, Clone)]
    pub struct SentRequest {
        pub request: ColibriRequest,
        /// Whether the caller waited for a reply.
        pub awaited: bool,
    }

    /// Mock bridge connection.
    #[derive(Debug, Default)]
    pub struct MockBridgeConnection {
        replies: Mutex<VecDeque<MockReply>>,
        sent: Mutex<Vec<SentRequest>>,
        fail_sends: AtomicBool,
    }

    impl MockBridgeConnection {
        /// Create a mock with no scripted replies.
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a mock answering awaited requests with `replies` in order.
        pub fn with_replies(replies: Vec<MockReply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                ..Self::default()
            }
        }

        /// Queue one more reply.
        pub fn push_reply(&self, reply: MockReply) {
            self.replies
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_back(reply);
        }

        /// Make fire-and-forget sends fail from now on.
        pub fn fail_sends(&self) {
            self.fail_sends.store(true, Ordering::SeqCst);
        }

        /// Every request seen so far, in send order.
        pub fn sent(&self) -> Vec<SentRequest> {
            self.sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// The requests seen so far, without the awaited flag.
        pub fn requests(&self) -> Vec<ColibriRequest> {
            self.sent().into_iter().map(|s| s.request).collect()
        }

        /// Number of requests seen so far.
        pub fn request_count(&self) -> usize {
            self.sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
        }

        fn record(&self, request: ColibriRequest, awaited: bool) {
            self.sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(SentRequest { request, awaited });
        }
    }

    #[async_trait]
    impl BridgeConnection for MockBridgeConnection {
        async fn send_and_await_reply(
            &self,
            request: ColibriRequest,
        ) -> Result<BridgeReply, ColibriError> {
            let scripted = self
                .replies
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();

            if matches!(scripted, Some(MockReply::Disconnected)) {
                return Err(ColibriError::Transport("mock bridge disconnected".to_string()));
            }
            self.record(request, true);

            match scripted {
                Some(MockReply::Conference(conference)) => Ok(BridgeReply::Conference(conference)),
                Some(MockReply::Error(condition)) => Ok(BridgeReply::Error(condition)),
                Some(MockReply::Unexpected(kind)) => Ok(BridgeReply::Unexpected(kind)),
                Some(MockReply::Timeout) => std::future::pending().await,
                Some(MockReply::Disconnected) | None => {
                    Ok(BridgeReply::Unexpected("no scripted reply".to_string()))
                }
            }
        }

        async fn send(&self, request: ColibriRequest) -> Result<(), ColibriError> {
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(ColibriError::Transport("mock bridge disconnected".to_string()));
            }
            self.record(request, false);
            Ok(())
        }
    }

}
