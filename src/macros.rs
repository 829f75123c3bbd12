// (c) Copyright 2025 Helsing GmbH. All rights reserved.
/// Convenience macro for creating [`Value`](crate::Value) trees.
///
/// Strings become leaves and bracketed groups become lists, nested arbitrarily:
///
/// ```rust
/// # use demandlink::{value, Value};
/// let leaf = value!("ping");
/// assert_eq!(leaf, Value::from("ping"));
///
/// let call = value!(["lookup", ["user", "42"]]);
/// assert_eq!(call.depth(), 3);
/// ```
#[macro_export]
macro_rules! value {
    ([$($item:tt),* $(,)?]) => {
        $crate::Value::List(::std::vec![$($crate::value!($item)),*])
    };
    ($leaf:expr) => {
        $crate::Value::from($leaf)
    };
}

/// Convenience macro for creating a history [`Entry`](crate::Entry).
///
/// NOTE! This is mostly useful for tests. The data position takes either `_` for silence or a
/// [`value!`] argument; the end is optional and an omitted end means the entry never ends.
///
/// ```rust
/// # use demandlink::{entry, value, Entry};
/// assert_eq!(entry!("ping", 0, 10), Entry::active(value!("ping"), 0, Some(10)));
/// assert_eq!(entry!(_, 10, 20), Entry::silent(10, Some(20)));
/// assert_eq!(entry!(_, 20), Entry::silent(20, None));
/// ```
#[macro_export]
macro_rules! entry {
    (_, $start:expr) => {
        $crate::Entry::<$crate::Value>::silent($start, ::std::option::Option::None)
    };
    (_, $start:expr, $end:expr) => {
        $crate::Entry::<$crate::Value>::silent($start, ::std::option::Option::Some($end))
    };
    ($data:tt, $start:expr) => {
        $crate::Entry::active($crate::value!($data), $start, ::std::option::Option::None)
    };
    ($data:tt, $start:expr, $end:expr) => {
        $crate::Entry::active(
            $crate::value!($data),
            $start,
            ::std::option::Option::Some($end),
        )
    };
}
