use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    dispatch::Dispatcher,
    transport::{ActionTransport, DispatchRequest, TransportError},
};

/// Calls a dispatcher living in the same process.
#[derive(Clone)]
pub struct LocalTransport {
    dispatcher: Arc<Dispatcher>,
}

impl LocalTransport {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        LocalTransport { dispatcher }
    }
}

#[async_trait]
impl ActionTransport for LocalTransport {
    async fn dispatch(&self, request: DispatchRequest) -> Result<Value, TransportError> {
        self.dispatcher
            .dispatch(request)
            .await
            .map_err(|e| TransportError::Dispatch {
                kind: e.kind().to_string(),
                message: e.to_string(),
            })
    }
}
