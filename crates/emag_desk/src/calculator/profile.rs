//! The three fulfilment profiles evaluated side by side.

use serde::{Deserialize, Serialize};

/// How an offer reaches the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    /// Seller ships, customer pays delivery.
    FbmNonGenius,
    /// Seller ships for free to Genius subscribers and pays the Genius fee.
    FbmGenius,
    /// Fulfilled by eMAG from its warehouse.
    Fbe,
}

impl Profile {
    pub const ALL: [Profile; 3] = [Profile::FbmNonGenius, Profile::FbmGenius, Profile::Fbe];

    pub fn label(self) -> &'static str {
        match self {
            Profile::FbmNonGenius => "FBM-NonGenius",
            Profile::FbmGenius => "FBM-Genius",
            Profile::Fbe => "FBE",
        }
    }

    pub fn is_fulfilled_by_emag(self) -> bool {
        matches!(self, Profile::Fbe)
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "fbmnongenius" | "fbm" | "nongenius" => Ok(Profile::FbmNonGenius),
            "fbmgenius" | "genius" => Ok(Profile::FbmGenius),
            "fbe" => Ok(Profile::Fbe),
            _ => Err(format!("Unknown profile: {s}")),
        }
    }
}

/// One value per profile.
///
/// Used for inputs, breakdowns and estimator shares alike so that a
/// profile can never be missing or duplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSet<T> {
    pub fbm_non_genius: T,
    pub fbm_genius: T,
    pub fbe: T,
}

impl<T> ProfileSet<T> {
    pub fn from_fn(mut f: impl FnMut(Profile) -> T) -> Self {
        Self {
            fbm_non_genius: f(Profile::FbmNonGenius),
            fbm_genius: f(Profile::FbmGenius),
            fbe: f(Profile::Fbe),
        }
    }

    pub fn get(&self, profile: Profile) -> &T {
        match profile {
            Profile::FbmNonGenius => &self.fbm_non_genius,
            Profile::FbmGenius => &self.fbm_genius,
            Profile::Fbe => &self.fbe,
        }
    }

    pub fn get_mut(&mut self, profile: Profile) -> &mut T {
        match profile {
            Profile::FbmNonGenius => &mut self.fbm_non_genius,
            Profile::FbmGenius => &mut self.fbm_genius,
            Profile::Fbe => &mut self.fbe,
        }
    }

    /// Entries in [`Profile::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (Profile, &T)> {
        Profile::ALL.into_iter().map(move |p| (p, self.get(p)))
    }

    pub fn map<U>(&self, mut f: impl FnMut(Profile, &T) -> U) -> ProfileSet<U> {
        ProfileSet::from_fn(|p| f(p, self.get(p)))
    }

    /// Like [`map`](Self::map) but stops at the first error.
    pub fn try_map<U, E>(
        &self,
        mut f: impl FnMut(Profile, &T) -> Result<U, E>,
    ) -> Result<ProfileSet<U>, E> {
        Ok(ProfileSet {
            fbm_non_genius: f(Profile::FbmNonGenius, &self.fbm_non_genius)?,
            fbm_genius: f(Profile::FbmGenius, &self.fbm_genius)?,
            fbe: f(Profile::Fbe, &self.fbe)?,
        })
    }
}
