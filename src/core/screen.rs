//! Screen registry.
//!
//! Every screen the application can show is a variant of [`ScreenId`]. The
//! descriptor factory below is an exhaustive match, so adding a screen without
//! describing it is a compile error, and the access rule table in
//! [`crate::core::access`] can be audited against the same enumeration.

use serde::{Deserialize, Serialize};

use crate::insight::InsightKind;

/// Closed set of screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenId {
    Home,
    Settings,
    Profile,
    OnboardingWelcome,
    OnboardingCompany,
    OnboardingFounders,
    OnboardingIdea,
    Dashboard,
    FoundersList,
    FounderAlignment,
    EquitySplit,
    IdeaValidation,
    InvestorsList,
    InvestorDetail,
    InvestorReadiness,
    CustomersList,
    CustomerDetail,
    TeamMembers,
}

impl ScreenId {
    /// All screens, in declaration order.
    pub const ALL: [ScreenId; 18] = [
        ScreenId::Home,
        ScreenId::Settings,
        ScreenId::Profile,
        ScreenId::OnboardingWelcome,
        ScreenId::OnboardingCompany,
        ScreenId::OnboardingFounders,
        ScreenId::OnboardingIdea,
        ScreenId::Dashboard,
        ScreenId::FoundersList,
        ScreenId::FounderAlignment,
        ScreenId::EquitySplit,
        ScreenId::IdeaValidation,
        ScreenId::InvestorsList,
        ScreenId::InvestorDetail,
        ScreenId::InvestorReadiness,
        ScreenId::CustomersList,
        ScreenId::CustomerDetail,
        ScreenId::TeamMembers,
    ];

    /// Stable snake_case identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScreenId::Home => "home",
            ScreenId::Settings => "settings",
            ScreenId::Profile => "profile",
            ScreenId::OnboardingWelcome => "onboarding_welcome",
            ScreenId::OnboardingCompany => "onboarding_company",
            ScreenId::OnboardingFounders => "onboarding_founders",
            ScreenId::OnboardingIdea => "onboarding_idea",
            ScreenId::Dashboard => "dashboard",
            ScreenId::FoundersList => "founders_list",
            ScreenId::FounderAlignment => "founder_alignment",
            ScreenId::EquitySplit => "equity_split",
            ScreenId::IdeaValidation => "idea_validation",
            ScreenId::InvestorsList => "investors_list",
            ScreenId::InvestorDetail => "investor_detail",
            ScreenId::InvestorReadiness => "investor_readiness",
            ScreenId::CustomersList => "customers_list",
            ScreenId::CustomerDetail => "customer_detail",
            ScreenId::TeamMembers => "team_members",
        }
    }

    /// Parse a raw screen id.
    ///
    /// Matching is case-insensitive and accepts `-` for `_`, so
    /// `FOUNDERS_LIST` and `founders-list` both resolve.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|s| s.as_str() == normalized)
    }

    /// Group this screen belongs to.
    pub fn group(&self) -> ScreenGroup {
        self.descriptor().group
    }

    /// Build the descriptor for this screen.
    pub fn descriptor(&self) -> ScreenDescriptor {
        use InsightKind as K;
        use ScreenGroup as G;

        let (group, title, insight) = match self {
            ScreenId::Home => (G::Shell, "Home", None),
            ScreenId::Settings => (G::Shell, "Settings", None),
            ScreenId::Profile => (G::Shell, "Profile", None),
            ScreenId::OnboardingWelcome => (G::Onboarding, "Welcome", None),
            ScreenId::OnboardingCompany => (G::Onboarding, "Your company", None),
            ScreenId::OnboardingFounders => (G::Onboarding, "Your co-founders", None),
            ScreenId::OnboardingIdea => (G::Onboarding, "Your idea", None),
            ScreenId::Dashboard => (G::Overview, "Dashboard", Some(K::Dashboard)),
            ScreenId::FoundersList => (G::Founders, "Founders", None),
            ScreenId::FounderAlignment => {
                (G::Founders, "Founder alignment", Some(K::FounderAlignment))
            }
            ScreenId::EquitySplit => (G::Founders, "Equity split", None),
            ScreenId::IdeaValidation => (G::Idea, "Idea validation", Some(K::IdeaAnalysis)),
            ScreenId::InvestorsList => (G::Investors, "Investors", None),
            ScreenId::InvestorDetail => (G::Investors, "Investor", None),
            ScreenId::InvestorReadiness => (
                G::Investors,
                "Investor readiness",
                Some(K::InvestorReadiness),
            ),
            ScreenId::CustomersList => (G::Customers, "Customers", None),
            ScreenId::CustomerDetail => (G::Customers, "Customer", None),
            ScreenId::TeamMembers => (G::Team, "Team", None),
        };

        ScreenDescriptor {
            id: *self,
            group,
            title,
            insight,
        }
    }
}

impl std::fmt::Display for ScreenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Screen groups. Access rules can target a whole group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenGroup {
    /// Global chrome reachable from anywhere.
    Shell,
    Onboarding,
    Overview,
    Founders,
    Idea,
    Investors,
    Customers,
    Team,
}

impl ScreenGroup {
    /// Stable snake_case identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScreenGroup::Shell => "shell",
            ScreenGroup::Onboarding => "onboarding",
            ScreenGroup::Overview => "overview",
            ScreenGroup::Founders => "founders",
            ScreenGroup::Idea => "idea",
            ScreenGroup::Investors => "investors",
            ScreenGroup::Customers => "customers",
            ScreenGroup::Team => "team",
        }
    }

    /// Screens in this group.
    pub fn screens(&self) -> Vec<ScreenId> {
        ScreenId::ALL
            .into_iter()
            .filter(|s| s.group() == *self)
            .collect()
    }
}

/// Static description of a screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenDescriptor {
    pub id: ScreenId,
    pub group: ScreenGroup,
    /// Human-readable title.
    pub title: &'static str,
    /// Insight kind kept in sync while the screen is mounted.
    pub insight: Option<InsightKind>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_snake_and_upper_case() {
        assert_eq!(ScreenId::parse("founders_list"), Some(ScreenId::FoundersList));
        assert_eq!(ScreenId::parse("FOUNDERS_LIST"), Some(ScreenId::FoundersList));
        assert_eq!(ScreenId::parse("founders-list"), Some(ScreenId::FoundersList));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!(ScreenId::parse("secret_lab"), None);
        assert_eq!(ScreenId::parse(""), None);
    }

    #[test]
    fn test_as_str_is_unique_and_parses_back() {
        let mut seen = std::collections::HashSet::new();
        for screen in ScreenId::ALL {
            assert!(seen.insert(screen.as_str()), "duplicate id {}", screen);
            assert_eq!(ScreenId::parse(screen.as_str()), Some(screen));
        }
    }

    #[test]
    fn test_descriptor_carries_its_own_id() {
        for screen in ScreenId::ALL {
            assert_eq!(screen.descriptor().id, screen);
        }
    }

    #[test]
    fn test_insight_screens() {
        assert_eq!(
            ScreenId::FounderAlignment.descriptor().insight,
            Some(InsightKind::FounderAlignment)
        );
        assert_eq!(
            ScreenId::IdeaValidation.descriptor().insight,
            Some(InsightKind::IdeaAnalysis)
        );
        assert_eq!(ScreenId::FoundersList.descriptor().insight, None);
    }

    #[test]
    fn test_group_screens() {
        let shell = ScreenGroup::Shell.screens();
        assert_eq!(
            shell,
            vec![ScreenId::Home, ScreenId::Settings, ScreenId::Profile]
        );
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&ScreenId::InvestorReadiness).unwrap();
        assert_eq!(json, "\"investor_readiness\"");
    }
}
