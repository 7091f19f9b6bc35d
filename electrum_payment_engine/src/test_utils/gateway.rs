use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;

use crate::{
    db_types::{PaymentParameters, PaymentRequest},
    gateway::{GatewayError, PaymentGateway},
};

/// A gateway that answers from a queue of canned outcomes and records every envelope it was
/// asked to send. With an empty queue it behaves like an unreachable endpoint.
#[derive(Clone, Default)]
pub struct ScriptedGateway {
    inner: Arc<Mutex<Script>>,
}

#[derive(Default)]
struct Script {
    replies: VecDeque<Result<PaymentParameters, GatewayError>>,
    sent: Vec<PaymentRequest>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_reply(&self, reply: PaymentParameters) {
        self.inner.lock().unwrap().replies.push_back(Ok(reply));
    }

    pub fn push_error(&self, error: GatewayError) {
        self.inner.lock().unwrap().replies.push_back(Err(error));
    }

    /// Every envelope sent so far, in order.
    pub fn sent(&self) -> Vec<PaymentRequest> {
        self.inner.lock().unwrap().sent.clone()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn send(&self, request: &PaymentRequest) -> Result<PaymentParameters, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.sent.push(request.clone());
        inner
            .replies
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::Transport("no scripted reply".to_string())))
    }
}
