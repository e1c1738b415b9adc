use log::info;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use crate::log_file_error;

/// Extract panic info from panic value
fn extract_panic_info(panic_err: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic_err.downcast_ref::<&str>() {
        format!("Panic with message: {}", s)
    } else if let Some(s) = panic_err.downcast_ref::<String>() {
        format!("Panic with message: {}", s)
    } else {
        "Unknown panic occurred".to_string()
    }
}

/// Execute a function with a timeout.
///
/// Returns `Ok(T)` if the function completes within the timeout, and a
/// `TimedOut` or `Other` I/O error if it times out or panics. A timed-out
/// worker thread is detached; its result is discarded.
pub fn execute_with_timeout<T, F>(
    path: &Path,
    operation_name: &str,
    timeout: Duration,
    task: F,
) -> Result<T, std::io::Error>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let cancel_token = Arc::new(AtomicBool::new(false));
    let cancel_token_clone = cancel_token.clone();
    let (tx, rx) = mpsc::channel();

    let handle = thread::Builder::new()
        .name(format!("{}-worker", operation_name.to_lowercase().replace(' ', "-")))
        .spawn(move || {
            if cancel_token_clone.load(Ordering::SeqCst) {
                return;
            }
            let result = task();
            if !cancel_token_clone.load(Ordering::SeqCst) {
                let _ = tx.send(result);
            }
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            let _ = handle.join();
            Ok(result)
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            // Sender dropped without a result: the task panicked
            let reason = match handle.join() {
                Err(panic_err) => extract_panic_info(panic_err),
                Ok(()) => "worker exited without a result".to_string(),
            };
            let err = std::io::Error::new(std::io::ErrorKind::Other, reason);
            log_file_error!(path, operation_name, err);
            Err(err)
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            cancel_token.store(true, Ordering::SeqCst);

            info!(
                "TIMEOUT: {} took too long for '{}'",
                operation_name,
                path.display()
            );

            let err = std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("{} timed out after {:?}", operation_name, timeout),
            );
            log_file_error!(path, operation_name, err);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completes_within_timeout() {
        let result = execute_with_timeout(Path::new("/tmp/x"), "Quick", Duration::from_secs(2), || 42);
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_times_out() {
        let result = execute_with_timeout(Path::new("/tmp/x"), "Slow", Duration::from_millis(20), || {
            thread::sleep(Duration::from_millis(300));
            1
        });
        assert_eq!(result.unwrap_err().kind(), std::io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_panic_is_reported() {
        let result: Result<(), _> =
            execute_with_timeout(Path::new("/tmp/x"), "Panicky", Duration::from_secs(2), || {
                panic!("bad tag")
            });
        let err = result.unwrap_err();
        assert!(err.to_string().contains("bad tag"));
    }
}
