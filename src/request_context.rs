use uuid::Uuid;

use crate::request::OutboundRequest;

/// Per-call state carried alongside one logical request through send, refresh and retry.
#[derive(Debug)]
pub struct CallContext {
    id: Uuid,
    request: OutboundRequest,
    retried: bool,
    generation: u64,
}

impl CallContext {
    pub fn new(request: OutboundRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            retried: false,
            generation: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn request(&self) -> &OutboundRequest {
        &self.request
    }

    /// Whether this call already consumed its single post-refresh retry.
    pub fn retried(&self) -> bool {
        self.retried
    }

    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
    }

    /// Credential generation the last attempt was decorated with.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn observe_generation(&mut self, generation: u64) {
        self.generation = generation;
    }
}
