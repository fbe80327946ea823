use crate::driver::Glossy;
use crate::radio::Radio;
use crate::timer::Timer;
use core::cell::RefCell;
use critical_section::Mutex;
use embedded_hal::digital::OutputPin;

/// Used to initialize the global static `Glossy` instance for use with
/// `critical_section`.
///
/// # Returns
/// * An empty mutable ref-cell
///
/// # Example
/// ```rust,ignore
/// use glossy433::driver::Glossy;
/// use glossy433::timer::global_glossy_init;
///
/// static GLOSSY: critical_section::Mutex<
///     core::cell::RefCell<Option<Glossy<MyRadio, MyTimer, MyPin>>>,
/// > = global_glossy_init::<MyRadio, MyTimer, MyPin>();
/// ```
pub const fn global_glossy_init<R: Radio, T: Timer, P: OutputPin>()
-> Mutex<RefCell<Option<Glossy<R, T, P>>>> {
    Mutex::new(RefCell::new(None))
}

/// Stores a configured driver instance in the global singleton.
///
/// Call once during board bring-up, before any radio or timer interrupt
/// is unmasked.
///
/// # Example
/// ```rust,ignore
/// fn main() {
///     let glossy = Glossy::new(radio, timer, node_id, None);
///     global_glossy_setup(&GLOSSY, glossy);
/// }
/// ```
pub fn global_glossy_setup<R: Radio, T: Timer, P: OutputPin>(
    global: &'static Mutex<RefCell<Option<Glossy<R, T, P>>>>,
    glossy: Glossy<R, T, P>,
) {
    critical_section::with(|cs| {
        let _ = global.borrow(cs).replace(Some(glossy));
    });
}

/// Runs a closure on the global driver inside a critical section.
///
/// This is the dispatch point for the radio interrupt handlers: each
/// hardware event forwards its timestamp and FIFO data to the matching
/// driver callback. Returns `None` when the singleton was never set up.
///
/// # Example
/// ```rust,ignore
/// #[interrupt]
/// fn RF_VECTOR() {
///     let timestamp = capture_timestamp();
///     with_glossy(&GLOSSY, |g| g.rx_started(timestamp));
/// }
/// ```
pub fn with_glossy<R: Radio, T: Timer, P: OutputPin, F, O>(
    global: &'static Mutex<RefCell<Option<Glossy<R, T, P>>>>,
    f: F,
) -> Option<O>
where
    F: FnOnce(&mut Glossy<R, T, P>) -> O,
{
    critical_section::with(|cs| global.borrow(cs).borrow_mut().as_mut().map(f))
}

/// Dispatches the retransmission one-shot into the global driver.
///
/// # Example
/// ```rust,ignore
/// #[interrupt]
/// fn TIMER_CCR1() {
///     global_glossy_timeout(&GLOSSY);
/// }
/// ```
#[cfg(feature = "rtx-timeout")]
pub fn global_glossy_timeout<R: Radio, T: Timer, P: OutputPin>(
    global: &'static Mutex<RefCell<Option<Glossy<R, T, P>>>>,
) {
    critical_section::with(|cs| {
        if let Some(glossy) = global.borrow(cs).borrow_mut().as_mut() {
            glossy.timeout_expired();
        }
    });
}
