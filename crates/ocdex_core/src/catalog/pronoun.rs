use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Pronoun {
    He,
    She,
    #[default]
    Them,
}

impl Pronoun {
    pub const ALL: [Pronoun; 3] = [Pronoun::He, Pronoun::She, Pronoun::Them];

    pub fn all() -> &'static [Pronoun] {
        &Self::ALL
    }

    pub fn label(self) -> &'static str {
        match self {
            Pronoun::He => "He",
            Pronoun::She => "She",
            Pronoun::Them => "Them",
        }
    }

    /// Keyword based deduction. Anything unrecognised falls back to [`Pronoun::Them`].
    pub fn deduce(text: &str) -> Self {
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_uppercase)
            .collect();
        let has = |keys: &[&str]| words.iter().any(|w| keys.contains(&w.as_str()));

        if has(&["THEM", "THEY", "THEIR"]) {
            Pronoun::Them
        } else if has(&["FEMALE", "SHE", "HER"]) {
            Pronoun::She
        } else if has(&["MALE", "HE", "HIM", "HIS"]) {
            Pronoun::He
        } else {
            Pronoun::Them
        }
    }
}

impl fmt::Display for Pronoun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deduce_keywords() {
        assert_eq!(Pronoun::deduce("she/her"), Pronoun::She);
        assert_eq!(Pronoun::deduce("Male"), Pronoun::He);
        assert_eq!(Pronoun::deduce("he/they"), Pronoun::Them);
        assert_eq!(Pronoun::deduce("???"), Pronoun::Them);
    }
}
