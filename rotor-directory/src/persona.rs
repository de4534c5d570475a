//! Identity persona generation
//!
//! Fresh identities get a human-plausible name so they blend into the
//! directory, a numeric suffix for uniqueness, and a random password.

use rand::Rng;
use rand::distr::Alphanumeric;

const GIVEN_NAMES: &[&str] = &[
    "Alex", "Blake", "Casey", "Dana", "Elliot", "Frankie", "Harper", "Jamie", "Jordan", "Kendall",
    "Logan", "Morgan", "Noel", "Parker", "Quinn", "Reese", "Riley", "Robin", "Rowan", "Sage",
    "Sam", "Skyler", "Taylor", "Toni",
];

const FAMILY_NAMES: &[&str] = &[
    "Adler", "Barnes", "Calder", "Dawson", "Ellis", "Foster", "Grant", "Hayes", "Ingram",
    "Keller", "Lane", "Mercer", "Nolan", "Osborn", "Porter", "Quigley", "Reed", "Slater",
    "Turner", "Vance", "Walsh", "Yates",
];

const PASSWORD_LEN: usize = 16;

/// A generated identity body, ready to submit to the directory
#[derive(Debug, Clone)]
pub struct Persona {
    pub given_name: String,
    pub family_name: String,
    pub email: String,
    pub password: String,
}

impl Persona {
    /// Generates a random persona under the given domain
    pub fn generate(domain_name: &str) -> Self {
        let mut rng = rand::rng();
        let given = GIVEN_NAMES[rng.random_range(0..GIVEN_NAMES.len())];
        let family = FAMILY_NAMES[rng.random_range(0..FAMILY_NAMES.len())];
        let suffix: u32 = rng.random_range(1000..10000);
        let email = format!(
            "{}.{}.{}@{}",
            given.to_ascii_lowercase(),
            family.to_ascii_lowercase(),
            suffix,
            domain_name
        );
        let password: String = std::iter::repeat_with(|| rng.sample(Alphanumeric) as char)
            .take(PASSWORD_LEN)
            .collect();

        Self {
            given_name: given.to_string(),
            family_name: family.to_string(),
            email,
            password,
        }
    }
}
