/// Highest interest count that still notifies the author.
pub const MAX_TRIPWIRE: i64 = 50;

/// Interest counts at which the author is told how many suppliers are
/// interested: 1, 2, 5, then every multiple of 5 up to 50.
pub fn is_tripwire(count: i64) -> bool {
    match count {
        1 | 2 => true,
        n if n > 0 && n <= MAX_TRIPWIRE => n % 5 == 0,
        _ => false,
    }
}
