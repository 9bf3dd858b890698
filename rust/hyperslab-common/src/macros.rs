/// Unwraps a `Result` inside a function returning `Option<Result<T, E>>`.
///
/// Block and run decoders are exposed as `Iterator<Item = Result<..>>`; this
/// macro lets their `next()` bodies use fallible helpers: on `Err(e)` the
/// enclosing function returns `Some(Err(e))`, on `Ok(t)` it evaluates to `t`.
#[macro_export]
macro_rules! try_or_ret_some_err {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(err) => {
                return Some(Err(err));
            }
        }
    };
}

/// Verifies that two ranks (dimension counts) match, returning an
/// `InvalidArgument` error naming both values otherwise.
#[macro_export]
macro_rules! verify_rank {
    ($name:expr, $actual:expr, $expected:expr) => {{
        let actual: usize = $actual;
        let expected: usize = $expected;
        if actual != expected {
            return Err($crate::error::Error::invalid_arg(
                $name,
                format!("rank {actual} does not match the expected rank {expected}"),
            ));
        }
    }};
}
