use rand::{rngs::OsRng, Rng};

pub const CODE_MIN: u32 = 100_000;
pub const CODE_MAX: u32 = 999_999;

/// Source of emailed verification codes.
pub trait CodeGenerator: Send + Sync {
    fn next_code(&self) -> String;
}

/// Draws codes uniformly from `[100000, 999999]` using the OS CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRngCodeGenerator;

impl CodeGenerator for OsRngCodeGenerator {
    fn next_code(&self) -> String {
        OsRng.gen_range(CODE_MIN..=CODE_MAX).to_string()
    }
}

/// Compares a stored code with user input without short-circuiting on the
/// first differing byte.
pub fn codes_match(expected: &str, provided: &str) -> bool {
    let (a, b) = (expected.as_bytes(), provided.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
