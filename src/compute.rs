use thiserror::Error;

// ─── Input bounds ────────────────────────────────────────────────

/// Largest `n` whose Fibonacci number still fits in an `f64`.
pub const MAX_FIBONACCI_N: i64 = 1476;

/// Largest `n` whose factorial still fits in an `f64`.
pub const MAX_FACTORIAL_N: i64 = 170;

// ─── Errors ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComputeError {
    #[error("{operation} is undefined for negative n ({n})")]
    NegativeInput { operation: &'static str, n: i64 },

    #[error("{operation}({n}) exceeds the supported maximum n = {max}")]
    InputTooLarge {
        operation: &'static str,
        n: i64,
        max: i64,
    },

    #[error("{0}")]
    Domain(String),
}

// ─── Operations ──────────────────────────────────────────────────

/// `base ^ exponent` with IEEE-754 semantics. A NaN or infinite result
/// (e.g. `0 ^ -1`, `(-8) ^ 0.5`, `10 ^ 400`) is reported as a domain error.
pub fn power(base: f64, exponent: f64) -> Result<f64, ComputeError> {
    let value = base.powf(exponent);
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ComputeError::Domain(format!(
            "{base} ^ {exponent} has no finite result"
        )))
    }
}

/// nth Fibonacci number, 0-indexed, computed iteratively in O(n).
pub fn fibonacci(n: i64) -> Result<f64, ComputeError> {
    check_bounds("fibonacci", n, MAX_FIBONACCI_N)?;
    if n <= 1 {
        return Ok(n as f64);
    }

    let (mut a, mut b) = (0.0_f64, 1.0_f64);
    for _ in 2..=n {
        let next = a + b;
        a = b;
        b = next;
    }
    Ok(b)
}

/// `n!`, computed iteratively in O(n). `0! = 1`.
pub fn factorial(n: i64) -> Result<f64, ComputeError> {
    check_bounds("factorial", n, MAX_FACTORIAL_N)?;

    let mut acc = 1.0_f64;
    for i in 2..=n {
        acc *= i as f64;
    }
    Ok(acc)
}

fn check_bounds(operation: &'static str, n: i64, max: i64) -> Result<(), ComputeError> {
    if n < 0 {
        return Err(ComputeError::NegativeInput { operation, n });
    }
    if n > max {
        return Err(ComputeError::InputTooLarge { operation, n, max });
    }
    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fibonacci_base_cases() {
        assert_eq!(fibonacci(0), Ok(0.0));
        assert_eq!(fibonacci(1), Ok(1.0));
        assert_eq!(fibonacci(10), Ok(55.0));
    }

    #[test]
    fn fibonacci_follows_recurrence() {
        for n in 2..=200 {
            let expected = fibonacci(n - 1).unwrap() + fibonacci(n - 2).unwrap();
            assert_eq!(fibonacci(n).unwrap(), expected, "n = {n}");
        }
    }

    #[test]
    fn fibonacci_is_exact_for_small_n() {
        // fib(78) is the largest Fibonacci number below 2^53.
        assert_eq!(fibonacci(78).unwrap(), 8_944_394_323_791_464.0);
    }

    #[test]
    fn fibonacci_bounds() {
        assert!(fibonacci(MAX_FIBONACCI_N).unwrap().is_finite());
        assert!(matches!(
            fibonacci(MAX_FIBONACCI_N + 1),
            Err(ComputeError::InputTooLarge { .. })
        ));
        assert!(matches!(
            fibonacci(-1),
            Err(ComputeError::NegativeInput { n: -1, .. })
        ));
    }

    #[test]
    fn factorial_values() {
        assert_eq!(factorial(0), Ok(1.0));
        assert_eq!(factorial(1), Ok(1.0));
        assert_eq!(factorial(5), Ok(120.0));
        assert_eq!(factorial(20), Ok(2_432_902_008_176_640_000.0));
    }

    #[test]
    fn factorial_follows_recurrence() {
        for n in 1..=MAX_FACTORIAL_N {
            let expected = n as f64 * factorial(n - 1).unwrap();
            assert_eq!(factorial(n).unwrap(), expected, "n = {n}");
        }
    }

    #[test]
    fn factorial_bounds() {
        assert!(factorial(MAX_FACTORIAL_N).unwrap().is_finite());
        assert!(matches!(
            factorial(MAX_FACTORIAL_N + 1),
            Err(ComputeError::InputTooLarge { .. })
        ));
        assert!(matches!(
            factorial(-3),
            Err(ComputeError::NegativeInput { .. })
        ));
    }

    #[test]
    fn power_identities() {
        for base in [-3.5, -1.0, 0.5, 2.0, 7.0, 1e10] {
            assert_eq!(power(base, 0.0), Ok(1.0));
            assert_eq!(power(base, 1.0), Ok(base));
        }
        assert_eq!(power(2.0, 10.0), Ok(1024.0));
        assert_eq!(power(4.0, 0.5), Ok(2.0));
        assert_eq!(power(2.0, -2.0), Ok(0.25));
    }

    #[test]
    fn power_without_finite_result_is_domain_error() {
        assert!(matches!(power(0.0, -1.0), Err(ComputeError::Domain(_))));
        assert!(matches!(power(-8.0, 0.5), Err(ComputeError::Domain(_))));
        assert!(matches!(power(10.0, 400.0), Err(ComputeError::Domain(_))));
    }
}
