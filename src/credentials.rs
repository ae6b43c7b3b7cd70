use rand::seq::SliceRandom;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%";

/// Random initial root password for a freshly created guest.
pub fn generate_password(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .filter_map(|_| ALPHABET.choose(&mut rng).map(|b| *b as char))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_length_and_alphabet() {
        let pw = generate_password(16);
        assert_eq!(pw.len(), 16);
        assert!(pw.bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn test_passwords_differ() {
        assert_ne!(generate_password(16), generate_password(16));
    }
}
