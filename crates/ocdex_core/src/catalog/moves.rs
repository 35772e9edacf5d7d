use super::typing::Typing;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveCategory {
    Physical,
    Special,
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub name: CompactString,
    #[serde(rename = "type")]
    pub typing: Typing,
    pub category: MoveCategory,
    #[serde(default)]
    pub power: Option<u16>,
    #[serde(default)]
    pub accuracy: Option<u8>,
    pub pp: u8,
    #[serde(default)]
    pub banned: bool,
}

/// Every move a species can obtain, partitioned by acquisition method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movepool {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub level: BTreeMap<u8, BTreeSet<CompactString>>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tm: BTreeSet<CompactString>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tutor: BTreeSet<CompactString>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub egg: BTreeSet<CompactString>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub event: BTreeSet<CompactString>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub other: BTreeSet<CompactString>,
}

impl Movepool {
    /// A pool without acquisition detail, used for fan-made species.
    pub fn from_moves<I, S>(moves: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        Self {
            other: moves.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    fn sets(&self) -> impl Iterator<Item = &BTreeSet<CompactString>> {
        self.level
            .values()
            .chain([&self.tm, &self.tutor, &self.egg, &self.event, &self.other])
    }

    fn sets_mut(&mut self) -> impl Iterator<Item = &mut BTreeSet<CompactString>> {
        self.level.values_mut().chain([
            &mut self.tm,
            &mut self.tutor,
            &mut self.egg,
            &mut self.event,
            &mut self.other,
        ])
    }

    /// Every move in the pool, sorted by name
    pub fn all(&self) -> BTreeSet<CompactString> {
        self.sets().flatten().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sets().any(|set| set.iter().any(|m| m == name))
    }

    pub fn is_empty(&self) -> bool {
        self.sets().all(BTreeSet::is_empty)
    }

    pub fn len(&self) -> usize {
        self.all().len()
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&CompactString) -> bool) {
        for set in self.sets_mut() {
            set.retain(|m| keep(m));
        }
        self.level.retain(|_, set| !set.is_empty());
    }

    pub fn union(&self, other: &Movepool) -> Movepool {
        let mut result = self.clone();
        for (lvl, moves) in &other.level {
            result.level.entry(*lvl).or_default().extend(moves.iter().cloned());
        }
        result.tm.extend(other.tm.iter().cloned());
        result.tutor.extend(other.tutor.iter().cloned());
        result.egg.extend(other.egg.iter().cloned());
        result.event.extend(other.event.iter().cloned());
        result.other.extend(other.other.iter().cloned());
        result
    }

    /// Moves of `self` that `other` cannot learn
    pub fn difference(&self, other: &Movepool) -> Movepool {
        let theirs = other.all();
        let mut result = self.clone();
        result.retain(|m| !theirs.contains(m));
        result
    }

    pub fn intersection(&self, other: &Movepool) -> Movepool {
        let theirs = other.all();
        let mut result = self.clone();
        result.retain(|m| theirs.contains(m));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pool(level: &[(u8, &[&str])], tm: &[&str]) -> Movepool {
        Movepool {
            level: level
                .iter()
                .map(|(l, moves)| (*l, moves.iter().map(|m| (*m).into()).collect()))
                .collect(),
            tm: tm.iter().map(|m| (*m).into()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_all_merges_sources() {
        let p = pool(&[(1, &["Tackle", "Growl"]), (5, &["Ember"])], &["Tackle", "Protect"]);
        let all: Vec<_> = p.all().into_iter().collect();
        assert_eq!(all, vec!["Ember", "Growl", "Protect", "Tackle"]);
        assert_eq!(p.len(), 4);
    }

    #[test]
    fn test_set_operations() {
        let a = pool(&[(1, &["Tackle", "Ember"])], &["Protect"]);
        let b = pool(&[], &["Protect", "Surf"]);

        assert_eq!(
            a.intersection(&b).all(),
            BTreeSet::from([CompactString::from("Protect")])
        );
        assert_eq!(
            a.difference(&b).all(),
            BTreeSet::from([CompactString::from("Ember"), CompactString::from("Tackle")])
        );
        assert_eq!(a.union(&b).len(), 4);
    }

    #[test]
    fn test_retain_drops_empty_levels() {
        let mut p = pool(&[(1, &["Tackle"]), (9, &["Ember"])], &[]);
        p.retain(|m| m != "Ember");
        assert!(p.level.get(&9).is_none());
        assert!(p.contains("Tackle"));
    }
}
