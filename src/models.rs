use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Placeholder destination meaning the student has not decided yet.
pub const UNDECIDED_TOKEN: &str = "待定";

/// Name shown in place of `name` for anonymous records.
pub const ANONYMOUS_NAME: &str = "某同学";

/// Graduation cohorts accepted by intake.
pub const YEAR_MIN: i32 = 2015;
pub const YEAR_MAX: i32 = 2030;

/// Majors offered by the add form before falling back to free text.
pub const SUGGESTED_MAJORS: [&str; 3] = ["数学与应用数学", "信息与计算科学", "统计学"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PathType {
    #[serde(alias = "保研")]
    Recommendation,
    #[serde(alias = "考研")]
    Exam,
    #[serde(alias = "工作")]
    Work,
    #[serde(alias = "出国")]
    Abroad,
}

impl PathType {
    pub const ALL: [PathType; 4] = [
        PathType::Recommendation,
        PathType::Exam,
        PathType::Work,
        PathType::Abroad,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PathType::Recommendation => "RECOMMENDATION",
            PathType::Exam => "EXAM",
            PathType::Work => "WORK",
            PathType::Abroad => "ABROAD",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PathType::Recommendation => "保研",
            PathType::Exam => "考研",
            PathType::Work => "工作",
            PathType::Abroad => "出国",
        }
    }
}

impl fmt::Display for PathType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PathType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        PathType::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value) || kind.label() == value)
            .ok_or_else(|| format!("unknown path type '{value}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: String,
    pub name: String,
    pub major: String,
    pub year: i32,
    #[serde(rename = "type")]
    pub path_type: PathType,
    #[serde(default)]
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
    pub created_at: i64,
}

impl StudentRecord {
    pub fn display_name(&self) -> &str {
        if self.is_anonymous {
            ANONYMOUS_NAME
        } else {
            &self.name
        }
    }

    /// True when the record has a destination that can be placed in a group.
    pub fn has_decided_destination(&self) -> bool {
        !self.destination.is_empty() && !self.destination.contains(UNDECIDED_TOKEN)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationGroup {
    pub destination: String,
    pub count: usize,
    pub students: Vec<StudentRecord>,
}

/// Active major selection for the grouped view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum MajorFilter {
    #[default]
    All,
    Major(String),
}

impl MajorFilter {
    pub const ALL_TOKEN: &'static str = "ALL";
    const ALL_ALIAS: &'static str = "全部";

    pub fn matches(&self, record: &StudentRecord) -> bool {
        match self {
            MajorFilter::All => true,
            MajorFilter::Major(major) => record.major == *major,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            MajorFilter::All => Self::ALL_TOKEN,
            MajorFilter::Major(major) => major,
        }
    }
}

impl fmt::Display for MajorFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MajorFilter {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value == Self::ALL_TOKEN || value == Self::ALL_ALIAS {
            Ok(MajorFilter::All)
        } else {
            Ok(MajorFilter::Major(value.to_string()))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum AccessLevel {
    #[default]
    None,
    User,
    Admin,
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            AccessLevel::None => "NONE",
            AccessLevel::User => "USER",
            AccessLevel::Admin => "ADMIN",
        };
        f.write_str(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    pub timestamp: i64,
}
