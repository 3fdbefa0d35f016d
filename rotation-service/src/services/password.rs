use rand::seq::SliceRandom;
use rand::Rng;
use secrecy::SecretString;

use crate::services::directory::PasswordPolicy;

const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*()_+-=[]{}|'";

pub const DEFAULT_PASSWORD_LENGTH: usize = 16;
const MAX_PASSWORD_LENGTH: usize = 128;

fn password_length(policy: Option<&PasswordPolicy>) -> usize {
    policy
        .and_then(|p| p.minimum_length)
        .map(|min| usize::try_from(min).unwrap_or(MAX_PASSWORD_LENGTH))
        .unwrap_or(DEFAULT_PASSWORD_LENGTH)
        .clamp(DEFAULT_PASSWORD_LENGTH, MAX_PASSWORD_LENGTH)
}

fn character_classes(policy: Option<&PasswordPolicy>) -> Vec<&'static [u8]> {
    let mut classes = vec![LOWERCASE, UPPERCASE, DIGITS];
    // Without a policy IAM's default policy applies, which accepts symbols.
    if policy.map_or(true, |p| p.require_symbols) {
        classes.push(SYMBOLS);
    }
    classes
}

/// Random console password that satisfies the account password policy.
///
/// Holds at least one character of every class in use; symbols are only
/// used when the policy requires them.
pub fn generate_password(policy: Option<&PasswordPolicy>) -> SecretString {
    generate_with(&mut rand::thread_rng(), policy)
}

fn generate_with<R: Rng + ?Sized>(rng: &mut R, policy: Option<&PasswordPolicy>) -> SecretString {
    let length = password_length(policy);
    let classes = character_classes(policy);
    let alphabet: Vec<u8> = classes.iter().flat_map(|class| class.iter().copied()).collect();

    let mut chars: Vec<u8> = classes
        .iter()
        .filter_map(|class| class.choose(rng).copied())
        .collect();
    while chars.len() < length {
        if let Some(c) = alphabet.choose(rng) {
            chars.push(*c);
        }
    }
    chars.shuffle(rng);

    SecretString::new(chars.into_iter().map(char::from).collect())
}
