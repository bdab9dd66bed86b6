use cadence_lib::debounce::{Debounce, DebounceOptions};
use cadence_lib::CadenceError;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::sleep;

type TestResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

const WAIT: Duration = Duration::from_millis(50);

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

/// Records every argument the wrapped function was executed with.
#[derive(Clone, Default)]
struct Calls(Arc<Mutex<Vec<u32>>>);

impl Calls {
    fn recorder(&self) -> impl Fn(u32) + Send + Sync + 'static {
        let calls = self.clone();
        move |value| calls.0.lock().unwrap_or_else(PoisonError::into_inner).push(value)
    }

    fn seen(&self) -> Vec<u32> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[tokio::test(start_paused = true)]
async fn test_burst_collapses_into_one_trailing_execution() -> TestResult {
    let calls = Calls::default();
    let debounce = Debounce::new(calls.recorder(), WAIT, DebounceOptions::default())?;

    // Calls at 0, 20, 40, 60 and 80ms
    for value in 1..=5 {
        if value > 1 {
            sleep(ms(20)).await;
        }
        debounce.call(value);
    }
    assert!(debounce.is_pending());

    sleep(ms(40)).await;
    assert!(calls.seen().is_empty(), "quiet period restarts on every call");

    sleep(ms(20)).await;
    assert_eq!(calls.seen(), vec![5]);
    assert!(!debounce.is_pending());

    sleep(ms(200)).await;
    assert_eq!(calls.seen(), vec![5]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_separate_bursts_execute_separately() -> TestResult {
    let calls = Calls::default();
    let debounce = Debounce::new(calls.recorder(), WAIT, DebounceOptions::default())?;

    debounce.call(1);
    debounce.call(2);
    sleep(ms(100)).await;
    debounce.call(3);
    sleep(ms(100)).await;

    assert_eq!(calls.seen(), vec![2, 3]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_leading_isolated_call_executes_once() -> TestResult {
    let calls = Calls::default();
    let options = DebounceOptions { leading: true, ..Default::default() };
    let debounce = Debounce::new(calls.recorder(), WAIT, options)?;

    debounce.call(1);
    assert_eq!(calls.seen(), vec![1], "leading edge runs synchronously");
    assert!(debounce.is_pending());

    sleep(ms(100)).await;
    assert_eq!(calls.seen(), vec![1], "no second execution for an isolated call");
    assert!(!debounce.is_pending());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_leading_then_trailing_when_burst_continues() -> TestResult {
    let calls = Calls::default();
    let options = DebounceOptions { leading: true, ..Default::default() };
    let debounce = Debounce::new(calls.recorder(), WAIT, options)?;

    debounce.call(1);
    sleep(ms(20)).await;
    debounce.call(2);
    debounce.call(3);
    assert_eq!(calls.seen(), vec![1]);

    sleep(ms(60)).await;
    assert_eq!(calls.seen(), vec![1, 3]);

    // The burst is over, the next call is a new leading edge.
    sleep(ms(100)).await;
    debounce.call(4);
    assert_eq!(calls.seen(), vec![1, 3, 4]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_max_wait_forces_execution_under_pressure() -> TestResult {
    let calls = Calls::default();
    let options = DebounceOptions { max_wait: Some(ms(80)), ..Default::default() };
    let debounce = Debounce::new(calls.recorder(), WAIT, options)?;

    // A call every 30ms from 0 to 150ms keeps resetting the 50ms quiet period.
    for value in 0..6 {
        if value > 0 {
            sleep(ms(30)).await;
        }
        debounce.call(value);
        if value == 3 {
            // t = 90ms: the ceiling fired at 80ms with the arguments of the 60ms call
            assert_eq!(calls.seen(), vec![2]);
        }
    }

    // Second burst started at 90ms, so its ceiling fires at 170ms.
    sleep(ms(15)).await;
    assert_eq!(calls.seen(), vec![2]);
    sleep(ms(10)).await;
    assert_eq!(calls.seen(), vec![2, 5]);
    assert!(!debounce.is_pending());

    sleep(ms(200)).await;
    assert_eq!(calls.seen(), vec![2, 5], "quiet timer was cancelled by the ceiling");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_without_max_wait_pressure_defers_indefinitely() -> TestResult {
    let calls = Calls::default();
    let debounce = Debounce::new(calls.recorder(), WAIT, DebounceOptions::default())?;

    for value in 0..10 {
        if value > 0 {
            sleep(ms(30)).await;
        }
        debounce.call(value);
    }
    assert!(calls.seen().is_empty());

    sleep(ms(60)).await;
    assert_eq!(calls.seen(), vec![9]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_max_wait_ceiling_cancelled_by_quiet_fire() -> TestResult {
    let calls = Calls::default();
    let options = DebounceOptions { max_wait: Some(ms(80)), ..Default::default() };
    let debounce = Debounce::new(calls.recorder(), WAIT, options)?;

    debounce.call(1);
    sleep(ms(60)).await;
    assert_eq!(calls.seen(), vec![1]);

    // Past the old ceiling deadline: nothing else runs.
    sleep(ms(100)).await;
    assert_eq!(calls.seen(), vec![1]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_cancel_discards_burst() -> TestResult {
    let calls = Calls::default();
    let options = DebounceOptions { max_wait: Some(ms(80)), ..Default::default() };
    let debounce = Debounce::new(calls.recorder(), WAIT, options)?;

    debounce.call(1);
    debounce.call(2);
    debounce.cancel();
    assert!(!debounce.is_pending());

    sleep(ms(200)).await;
    assert!(calls.seen().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_flush_executes_latest_arguments() -> TestResult {
    let calls = Calls::default();
    let options = DebounceOptions { max_wait: Some(ms(80)), ..Default::default() };
    let debounce = Debounce::new(calls.recorder(), WAIT, options)?;

    debounce.call(1);
    debounce.call(2);
    assert!(debounce.flush());
    assert_eq!(calls.seen(), vec![2]);
    assert!(!debounce.is_pending());

    assert!(!debounce.flush(), "nothing left to flush");

    sleep(ms(200)).await;
    assert_eq!(calls.seen(), vec![2]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_flush_after_isolated_leading_call_does_not_repeat() -> TestResult {
    let calls = Calls::default();
    let options = DebounceOptions { leading: true, ..Default::default() };
    let debounce = Debounce::new(calls.recorder(), WAIT, options)?;

    debounce.call(1);
    assert!(!debounce.flush());
    assert!(!debounce.is_pending());
    assert_eq!(calls.seen(), vec![1]);
    Ok(())
}

#[tokio::test]
async fn test_invalid_durations_rejected() {
    let result = Debounce::new(|_: u32| {}, Duration::ZERO, DebounceOptions::default());
    assert!(matches!(result, Err(CadenceError::Config(_))));

    let options = DebounceOptions { max_wait: Some(Duration::ZERO), ..Default::default() };
    let result = Debounce::new(|_: u32| {}, WAIT, options);
    assert!(matches!(result, Err(CadenceError::Config(_))));
}
