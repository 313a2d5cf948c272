use std::{future::Future, io, thread};

use tokio::runtime::{self, Handle, Runtime};

pub fn new_runtime() -> io::Result<Runtime> {
    runtime::Builder::new_current_thread().enable_all().build()
}

/// Drives `future` to completion on `runtime`, blocking the calling thread.
///
/// A runtime cannot be entered from inside another one, so when the caller is
/// already running on a Tokio worker the future is driven from a scoped helper
/// thread instead.
pub fn poll_until_ready<Fut>(runtime: &Runtime, future: Fut) -> Fut::Output
where
    Fut: Future + Send,
    Fut::Output: Send,
{
    if Handle::try_current().is_err() {
        return runtime.block_on(future);
    }

    thread::scope(|scope| {
        match scope.spawn(|| runtime.block_on(future)).join() {
            Ok(output) => output,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_until_ready() {
        let rt = new_runtime().unwrap();
        let result = poll_until_ready(&rt, async { 40 + 2 });
        assert_eq!(result, 42);
    }

    #[test]
    fn test_poll_until_ready_error() {
        let rt = new_runtime().unwrap();
        let result: Result<(), String> =
            poll_until_ready(&rt, async { Err("failed".to_string()) });
        assert_eq!(result, Err("failed".to_string()));
    }

    #[test]
    fn test_poll_until_ready_inside_runtime() {
        let outer = runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let inner = new_runtime().unwrap();

        let result = outer.block_on(async { poll_until_ready(&inner, async { "done" }) });
        assert_eq!(result, "done");
    }
}
