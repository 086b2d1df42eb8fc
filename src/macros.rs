/// A macro wrapper for returning an [`Result::Err`] that allows logging of
/// errors.
///
/// Specifically, in debug build mode (with the `log` feature enabled), before
/// an `Err` is returned calls are made to [`log::debug`] and [`log::trace`]
/// that describe the error and the stack backtrace, respectively.
///
/// Usage:  `err!(trace, U) -> U`   .
macro_rules! err {
  ($level:ident, $error:expr) => {{
    // If testing, log the error at the debug level
    let error = $error;

    #[cfg(all(debug_assertions, feature = "log"))]
    {
      ::log::$level!("{}:{}: {:?}", file!(), line!(), &error);
      #[cfg(feature = "backtrace")]
      {
        // Symbol resolution is expensive; only backtrace_full pays for it.
        #[cfg(feature = "backtrace_full")]
        let bt = backtrace::Backtrace::new();
        #[cfg(not(feature = "backtrace_full"))]
        let bt = backtrace::Backtrace::new_unresolved();
        ::log::$level!("{:?}", bt);
      }
    }

    error
  }};
}
