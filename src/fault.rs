//! Per-request fault isolation.
//!
//! One `FaultDomain` guards a single request from creation to completion.
//! A panic escaping a handler is caught at the domain boundary and handed
//! back to the chain walker as a `ProcessFault`, which flows into the same
//! terminal-error path as an ordinary handler failure. The process and any
//! concurrently running requests never see the panic.
use std::panic::{catch_unwind, AssertUnwindSafe};

use log::error;

/// A synchronous fault (panic) contained by a [`FaultDomain`].
#[derive(Debug)]
pub struct ProcessFault {
    pub message: String,
}

pub struct FaultDomain {
    request_id: String,
}

impl FaultDomain {
    pub fn new(request_id: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Run one handler inside the domain. Handlers only mutate plain
    /// request/response fields, so observing their state after an unwind
    /// is sound.
    pub fn guard<T>(&self, f: impl FnOnce() -> T) -> Result<T, ProcessFault> {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => Ok(value),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("request {}: contained fault: {}", self.request_id, message);
                Err(ProcessFault { message })
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_value_passes_through() {
        let domain = FaultDomain::new("req-1");
        assert_eq!(domain.guard(|| 7).unwrap(), 7);
    }

    #[test]
    fn test_panic_is_contained_with_message() {
        let domain = FaultDomain::new("req-1");
        let fault = domain.guard(|| -> u32 { panic!("boom") }).unwrap_err();
        assert_eq!(fault.message, "boom");
    }

    #[test]
    fn test_formatted_panic_message() {
        let domain = FaultDomain::new("req-1");
        let fault = domain
            .guard(|| -> u32 { panic!("bad id {}", 42) })
            .unwrap_err();
        assert_eq!(fault.message, "bad id 42");
    }
}
