//! Asynchronous timer abstraction providing the timing primitives required
//! by the protocol engine (delays, timeouts, timestamps).
use core::time::Duration;

use futures_util::Future;

/// Timer trait abstraction; must remain thread-safe when applicable.
pub trait KorriTimer {
    /// Asynchronously wait for `duration`.
    fn delay<'a>(&'a self, duration: Duration) -> impl Future<Output = ()> + 'a;
    /// Monotonic time elapsed since an arbitrary, fixed epoch.
    fn now(&self) -> Duration;
}

//==================================================================================EMBASSY
/// [`KorriTimer`] backed by `embassy-time`.
#[cfg(feature = "embassy")]
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyTimer;

#[cfg(feature = "embassy")]
impl KorriTimer for EmbassyTimer {
    fn delay<'a>(&'a self, duration: Duration) -> impl Future<Output = ()> + 'a {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        embassy_time::Timer::after(embassy_time::Duration::from_micros(micros))
    }

    fn now(&self) -> Duration {
        Duration::from_micros(embassy_time::Instant::now().as_micros())
    }
}
