use crate::stage::StageRecord;
use std::fmt;
use std::str::FromStr;

/// Fields that may carry the checkout a stage was built from, in lookup order.
pub const ORIGIN_FIELDS: [&str; 3] = ["origin", "origin-scm", "extractionUrl"];

/// Tabs of the stage table, keyed off the stage's origin URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StageCategory {
    #[default]
    All,
    Trunks,
    Branches,
    Workspaces,
}

impl StageCategory {
    pub const TABS: [StageCategory; 4] = [
        StageCategory::All,
        StageCategory::Trunks,
        StageCategory::Branches,
        StageCategory::Workspaces,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StageCategory::All => "all",
            StageCategory::Trunks => "trunks",
            StageCategory::Branches => "branches",
            StageCategory::Workspaces => "workspaces",
        }
    }

    fn marker(self) -> Option<&'static str> {
        match self {
            StageCategory::All => None,
            StageCategory::Trunks => Some("/trunk"),
            StageCategory::Branches => Some("/branches/"),
            StageCategory::Workspaces => Some("/workspaces/"),
        }
    }

    /// Category of an origin URL; `None` when it names none of the known
    /// layouts.
    pub fn classify(origin: &str) -> Option<StageCategory> {
        Self::TABS[1..]
            .iter()
            .copied()
            .find(|category| category.marker().is_some_and(|marker| origin.contains(marker)))
    }

    /// Stages without an origin stay visible on every tab.
    pub fn admits(self, origin: Option<&str>) -> bool {
        match (self.marker(), origin) {
            (None, _) | (_, None) => true,
            (Some(marker), Some(origin)) => origin.contains(marker),
        }
    }

    pub fn next(self) -> StageCategory {
        let index = Self::TABS.iter().position(|tab| *tab == self).unwrap_or(0);
        Self::TABS[(index + 1) % Self::TABS.len()]
    }
}

impl fmt::Display for StageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageCategory {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "" | "all" => Ok(StageCategory::All),
            "trunk" | "trunks" => Ok(StageCategory::Trunks),
            "branch" | "branches" => Ok(StageCategory::Branches),
            "workspace" | "workspaces" => Ok(StageCategory::Workspaces),
            other => Err(format!("Unknown stage category: {other}")),
        }
    }
}

impl StageRecord {
    /// First non-empty origin field, if the server sent one.
    pub fn origin(&self) -> Option<String> {
        ORIGIN_FIELDS
            .iter()
            .map(|key| self.field_text(key))
            .find(|text| !text.is_empty())
    }
}

/// Tab badges. `all` is the sum of the three categories, so stages with an
/// unknown origin are shown but not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    pub trunks: usize,
    pub branches: usize,
    pub workspaces: usize,
}

impl CategoryCounts {
    pub fn tally<'a>(origins: impl IntoIterator<Item = Option<&'a str>>) -> Self {
        let mut counts = CategoryCounts::default();
        for category in origins.into_iter().flatten().filter_map(StageCategory::classify) {
            match category {
                StageCategory::Trunks => counts.trunks += 1,
                StageCategory::Branches => counts.branches += 1,
                StageCategory::Workspaces => counts.workspaces += 1,
                StageCategory::All => {}
            }
        }
        counts
    }

    pub fn get(&self, category: StageCategory) -> usize {
        match category {
            StageCategory::All => self.trunks + self.branches + self.workspaces,
            StageCategory::Trunks => self.trunks,
            StageCategory::Branches => self.branches,
            StageCategory::Workspaces => self.workspaces,
        }
    }
}
