//! External-label handling for remote read.
//!
//! External labels are stripped from incoming equality matchers (storage
//! never holds them) and re-attached to every outgoing series.

use crate::model::labels::Labels;
use crate::model::matcher::{MatchType, Matcher};
use crate::remote::proto;

/// Merge two name-sorted label lists in one linear pass.
///
/// On a name collision the `primary` pair is kept. The result is sorted
/// by name with unique names.
pub fn merge_labels(primary: &[proto::Label], secondary: &[proto::Label]) -> Vec<proto::Label> {
    let mut result = Vec::with_capacity(primary.len() + secondary.len());
    let (mut i, mut j) = (0, 0);
    while i < primary.len() && j < secondary.len() {
        match primary[i].name.cmp(&secondary[j].name) {
            std::cmp::Ordering::Less => {
                result.push(primary[i].clone());
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                result.push(secondary[j].clone());
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                result.push(primary[i].clone());
                i += 1;
                j += 1;
            }
        }
    }
    result.extend_from_slice(&primary[i..]);
    result.extend_from_slice(&secondary[j..]);
    result
}

/// External labels as a name-sorted wire list.
pub fn sorted_external_labels(external: &Labels) -> Vec<proto::Label> {
    external
        .iter()
        .map(|l| proto::Label::new(l.name.clone(), l.value.clone()))
        .collect()
}

/// Replace `name="v"` with `name=""` when `name="v"` is an external label.
pub fn rewrite_matchers(matchers: Vec<Matcher>, external: &Labels) -> Vec<Matcher> {
    matchers
        .into_iter()
        .map(|m| {
            let is_external = m.match_type == MatchType::Equal
                && external.get(&m.name).is_some_and(|v| v == m.value);
            if is_external {
                Matcher::equal(m.name, "")
            } else {
                m
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> Vec<proto::Label> {
        pairs.iter().map(|(n, v)| proto::Label::new(*n, *v)).collect()
    }

    #[test]
    fn test_primary_wins_on_collision() {
        let merged = merge_labels(
            &labels(&[("job", "a")]),
            &labels(&[("job", "b"), ("region", "x")]),
        );
        assert_eq!(merged, labels(&[("job", "a"), ("region", "x")]));
    }

    #[test]
    fn test_interleaved_merge_stays_sorted() {
        let merged = merge_labels(
            &labels(&[("b", "1"), ("d", "1")]),
            &labels(&[("a", "2"), ("c", "2"), ("e", "2")]),
        );
        let names: Vec<_> = merged.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_empty_sides() {
        let one = labels(&[("a", "1")]);
        assert_eq!(merge_labels(&one, &[]), one);
        assert_eq!(merge_labels(&[], &one), one);
    }

    #[test]
    fn test_rewrite_only_matching_equality() {
        let external = Labels::from_pairs([("dc", "east")]);
        let matchers = vec![
            Matcher::equal("dc", "east"),
            Matcher::equal("dc", "west"),
            Matcher::new(MatchType::NotEqual, "dc", "east").unwrap(),
            Matcher::equal("job", "api"),
        ];
        let rewritten = rewrite_matchers(matchers, &external);
        assert_eq!(rewritten[0], Matcher::equal("dc", ""));
        assert_eq!(rewritten[1], Matcher::equal("dc", "west"));
        assert_eq!(rewritten[2].match_type, MatchType::NotEqual);
        assert_eq!(rewritten[2].value, "east");
        assert_eq!(rewritten[3], Matcher::equal("job", "api"));
    }

    #[test]
    fn test_sorted_external_labels() {
        let external = Labels::from_pairs([("region", "eu"), ("dc", "east")]);
        assert_eq!(
            sorted_external_labels(&external),
            labels(&[("dc", "east"), ("region", "eu")])
        );
    }
}
