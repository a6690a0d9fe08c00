//! Keyword intent router.
//!
//! Case-insensitive substring match against ordered keyword groups. The
//! first group with any hit wins; no hit means the completion fallback.

use crate::bot::replies;
use crate::knowledge::Knowledge;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Cybersecurity,
    CourseFees,
    Certificates,
    MastersPrograms,
    Grades,
    Location,
    Contact,
}

/// Declaration order is match priority.
const ROUTES: &[(Intent, &[&str])] = &[
    (Intent::Cybersecurity, &["cybersecurity", "cyber security training"]),
    (Intent::CourseFees, &["course fee", "price", "cost"]),
    (Intent::Certificates, &["certificate", "completion"]),
    (Intent::MastersPrograms, &["master", "postgraduate"]),
    (Intent::Grades, &["grade", "result", "mark"]),
    (Intent::Location, &["location", "address"]),
    (Intent::Contact, &["contact", "phone", "call"]),
];

pub fn route(text: &str) -> Option<Intent> {
    let text = text.to_lowercase();
    ROUTES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
        .map(|(intent, _)| *intent)
}

impl Intent {
    pub fn reply(self, knowledge: &Knowledge) -> String {
        match self {
            Intent::Cybersecurity => replies::cybersecurity(knowledge),
            Intent::CourseFees => replies::course_fees(knowledge),
            Intent::Certificates => replies::certificates(knowledge),
            Intent::MastersPrograms => replies::masters_programs(knowledge),
            Intent::Grades => replies::grades(),
            Intent::Location => replies::location(knowledge),
            Intent::Contact => replies::contact(knowledge),
        }
    }
}
