/// Deterministic primality test by trial division over `6k ± 1`.
///
/// Table sizes stay far below the range where this gets slow, and it is only
/// called on construction and on rehash.
pub fn is_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }
    if n < 4 {
        return true;
    }
    if n % 2 == 0 || n % 3 == 0 {
        return false;
    }
    let mut i = 5usize;
    while i <= n / i {
        if n % i == 0 || n % (i + 2) == 0 {
            return false;
        }
        i += 6;
    }
    true
}

/// Smallest prime `>= n`. Table sizes never go below 2.
pub fn next_prime(n: usize) -> usize {
    let mut candidate = n.max(2);
    if candidate > 2 && candidate % 2 == 0 {
        candidate += 1;
    }
    while !is_prime(candidate) {
        candidate = candidate
            .checked_add(2)
            .expect("table size overflowed usize");
    }
    candidate
}
