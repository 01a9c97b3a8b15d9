//! Keywords, and the groups, people, places, and topics carved out of them.
//!
//! All five fields live in the same three properties: two hierarchical lists
//! (`digiKam:TagsList`, joined with `/`, and `lr:hierarchicalSubject`, joined
//! with `|`) and the flat `dc:subject` bag of leaf labels. Each field claims
//! the keywords its predicate matches, and setting a field only replaces
//! those.

use rustc_hash::FxHashSet;

use crate::{
    containers::rdf::{Packet, value::Name},
    providers::Tags,
    types::HierValue,
};

use super::{NS_DC, NS_DIGIKAM, NS_LR, XmpProvider, values::make_bag};

pub(super) type Predicate = fn(&HierValue) -> bool;

pub(super) const ROOT_GROUPS: &str = "Groups";
pub(super) const ROOT_PEOPLE: &str = "People";
pub(super) const ROOT_PLACES: &str = "Places";
pub(super) const ROOT_TOPICS: &str = "Topics";

pub(super) fn is_group(kw: &HierValue) -> bool {
    kw.len() >= 2 && kw.first() == Some(ROOT_GROUPS)
}

/// People are never nested: a `People` path with more labels is a keyword.
pub(super) fn is_person(kw: &HierValue) -> bool {
    kw.len() == 2 && kw.first() == Some(ROOT_PEOPLE)
}

pub(super) fn is_place(kw: &HierValue) -> bool {
    kw.len() >= 2 && kw.first() == Some(ROOT_PLACES)
}

pub(super) fn is_topic(kw: &HierValue) -> bool {
    kw.len() >= 2 && kw.first() == Some(ROOT_TOPICS)
}

pub(super) fn is_other(kw: &HierValue) -> bool {
    !is_group(kw) && !is_person(kw) && !is_place(kw) && !is_topic(kw)
}

pub(super) fn tags_list_name() -> Name {
    Name::new(NS_DIGIKAM, "TagsList")
}

pub(super) fn hierarchical_subject_name() -> Name {
    Name::new(NS_LR, "hierarchicalSubject")
}

pub(super) fn subject_name() -> Name {
    Name::new(NS_DC, "subject")
}

/// The path below its root label.
pub(super) fn below_root(kw: &HierValue) -> HierValue {
    HierValue(kw.labels().get(1..).unwrap_or_default().to_vec())
}

/// Strips the root label from tagged keywords, and notes the root in the
/// labels.
pub(super) fn tags_below_root(tags: Tags<Vec<HierValue>>, root: &str) -> Tags<Vec<HierValue>> {
    tags.into_iter()
        .map(|(label, kws)| {
            (
                format!("{label}:{root}/"),
                kws.iter().map(below_root).collect(),
            )
        })
        .collect()
}

fn leaves(lists: &[&[HierValue]]) -> FxHashSet<String> {
    lists
        .iter()
        .flat_map(|list| list.iter())
        .filter_map(HierValue::last)
        .map(ToString::to_string)
        .collect()
}

fn dedup<T: Clone + Eq + core::hash::Hash>(list: &mut Vec<T>) {
    let mut seen = FxHashSet::default();
    list.retain(|item| seen.insert(item.clone()));
}

impl XmpProvider {
    /// The keywords `pred` matches.
    ///
    /// The first hierarchical list that has anything in it wins. Without
    /// either, each `dc:subject` entry is a one-label keyword.
    pub(super) fn filtered_keywords(&self, pred: Predicate) -> Vec<HierValue> {
        for list in [&self.tags_list, &self.hierarchical_subject] {
            if !list.is_empty() {
                return list.iter().filter(|kw| pred(kw)).cloned().collect();
            }
        }

        self.subject
            .iter()
            .map(|s| HierValue::from_labels([s.as_str()]))
            .filter(pred)
            .collect()
    }

    pub(super) fn filtered_keywords_tags(&self, pred: Predicate) -> Tags<Vec<HierValue>> {
        let matching = |list: &[HierValue]| -> Vec<HierValue> {
            list.iter().filter(|kw| pred(kw)).cloned().collect()
        };

        let mut tags = vec![
            (
                "XMP  digiKam:TagsList".to_string(),
                matching(&self.tags_list),
            ),
            (
                "XMP  lr:hierarchicalSubject".to_string(),
                matching(&self.hierarchical_subject),
            ),
        ];

        // flat entries that don't just repeat a hierarchical leaf
        let leaves = leaves(&[&self.tags_list[..], &self.hierarchical_subject[..]]);
        let flat: Vec<HierValue> = self
            .subject
            .iter()
            .filter(|s| !leaves.contains(*s))
            .map(|s| HierValue::from_labels([s.as_str()]))
            .filter(pred)
            .collect();
        if !flat.is_empty() {
            tags.push(("XMP  dc:subject".to_string(), flat));
        }
        tags
    }

    /// Replaces the keywords `pred` matches with `values`, in all three
    /// properties.
    ///
    /// Both hierarchical lists get the same result: `values`, then what
    /// `pred` doesn't claim of the keywords as they read now.
    pub(super) fn set_filtered_keywords(&mut self, pred: Predicate, values: &[HierValue]) {
        let view = self.filtered_keywords(|_| true);
        let old_leaves = leaves(&[&view[..]]);

        let mut kws: Vec<HierValue> = values.to_vec();
        kws.extend(view.into_iter().filter(|kw| !pred(kw)));
        dedup(&mut kws);

        // the new leaves, plus flat-only entries this field doesn't claim
        let mut subjects: Vec<String> = kws
            .iter()
            .filter_map(HierValue::last)
            .map(ToString::to_string)
            .collect();
        subjects.extend(
            self.subject
                .iter()
                .filter(|s| !old_leaves.contains(*s))
                .filter(|s| !pred(&HierValue::from_labels([s.as_str()])))
                .cloned(),
        );
        dedup(&mut subjects);

        let mut packet = self.rdf.write();
        set_list(&mut packet, tags_list_name(), &mut self.tags_list, kws.clone(), |kw| {
            kw.join("/")
        });
        set_list(
            &mut packet,
            hierarchical_subject_name(),
            &mut self.hierarchical_subject,
            kws,
            |kw| kw.join("|"),
        );
        set_list(&mut packet, subject_name(), &mut self.subject, subjects, |s| s.clone());
    }
}

/// Stores `new` as a bag, unless it holds the same entries as `current` in
/// some order. An empty list removes the property.
fn set_list<T>(
    packet: &mut Packet,
    name: Name,
    current: &mut Vec<T>,
    new: Vec<T>,
    render: impl Fn(&T) -> String,
) {
    if new.is_empty() {
        current.clear();
        packet.remove_property(&name);
        return;
    }

    let rendered: Vec<String> = new.iter().map(&render).collect();
    let old: FxHashSet<String> = current.iter().map(&render).collect();
    if old.len() == rendered.len() && rendered.iter().all(|r| old.contains(r)) {
        return;
    }

    packet.set_property(name, make_bag(&rendered));
    *current = new;
}

#[cfg(test)]
mod tests {
    use super::{is_group, is_other, is_person, is_place, is_topic};
    use crate::{types::HierValue, util::logger};

    fn hv(path: &str) -> HierValue {
        HierValue::split(path, '/')
    }

    #[test]
    fn predicates_partition_keywords() {
        logger();

        assert!(is_person(&hv("People/Alice")));
        assert!(!is_person(&hv("People/Smiths/Alice")));
        assert!(is_other(&hv("People/Smiths/Alice")));
        assert!(is_other(&hv("People")));

        assert!(is_place(&hv("Places/USA/California")));
        assert!(is_group(&hv("Groups/Choir")));
        assert!(is_topic(&hv("Topics/Birds/Owls")));
        assert!(is_other(&hv("Topics")));
        assert!(is_other(&hv("Sunset")));
    }
}
