/// Generate a random, non-zero 64-bit identifier.
///
/// Collisions are possible in principle but the id space is large enough
/// that creations never check for them; `put_if_absent` at the store layer
/// catches the (astronomically unlikely) clash.
pub fn generate_id() -> u64 {
    loop {
        let id = rand::random::<u64>();
        if id != 0 {
            return id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_zero() {
        for _ in 0..1000 {
            assert_ne!(generate_id(), 0);
        }
    }
}
