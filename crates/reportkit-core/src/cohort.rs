//! Population filters.
//!
//! A [`Cohort`] restricts evaluation to a set of subject identifiers. The
//! absence of a cohort (`None`) always means "every subject", so combining
//! filters is an intersection over whichever filters are present.

use std::collections::BTreeSet;
use std::fmt;

/// Identifier of one subject (patient) in the population.
pub type SubjectId = u64;

/// A named or anonymous set of subjects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cohort {
    name: Option<String>,
    members: BTreeSet<SubjectId>,
}

impl Cohort {
    pub fn new(members: impl IntoIterator<Item = SubjectId>) -> Self {
        Self {
            name: None,
            members: members.into_iter().collect(),
        }
    }

    pub fn named(name: impl Into<String>, members: impl IntoIterator<Item = SubjectId>) -> Self {
        Self {
            name: Some(name.into()),
            members: members.into_iter().collect(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn members(&self) -> &BTreeSet<SubjectId> {
        &self.members
    }

    pub fn contains(&self, subject: SubjectId) -> bool {
        self.members.contains(&subject)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Subjects present in both cohorts. The result is anonymous.
    pub fn intersect(&self, other: &Cohort) -> Cohort {
        Cohort {
            name: None,
            members: self.members.intersection(&other.members).copied().collect(),
        }
    }

    /// Parse a subject list separated by whitespace and/or commas.
    ///
    /// ```
    /// use reportkit_core::Cohort;
    ///
    /// let cohort = Cohort::parse("3, 1 2").unwrap();
    /// assert_eq!(cohort.members().iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    /// ```
    pub fn parse(text: &str) -> Result<Cohort, String> {
        let members = text
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .map(|token| {
                token
                    .parse::<SubjectId>()
                    .map_err(|_| format!("'{}' is not a subject id", token))
            })
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Cohort {
            name: None,
            members,
        })
    }

    /// Render the members in the form accepted by [`Cohort::parse`].
    pub fn members_text(&self) -> String {
        self.members
            .iter()
            .map(SubjectId::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl FromIterator<SubjectId> for Cohort {
    fn from_iter<T: IntoIterator<Item = SubjectId>>(iter: T) -> Self {
        Cohort::new(iter)
    }
}

impl fmt::Display for Cohort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({} subjects)", name, self.members.len()),
            None => write!(f, "{} subjects", self.members.len()),
        }
    }
}

/// Intersect every present filter. Returns `None` when no filter is present.
pub fn intersect_all<'a>(filters: impl IntoIterator<Item = Option<&'a Cohort>>) -> Option<Cohort> {
    filters
        .into_iter()
        .flatten()
        .fold(None, |acc: Option<Cohort>, next| match acc {
            None => Some(next.clone()),
            Some(acc) => Some(acc.intersect(next)),
        })
}
