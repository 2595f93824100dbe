//! Membership collaborator contract, an in-memory directory, and network entitlement rules.

// std
use std::{fs, path::Path};
// self
use crate::{
	_prelude::*,
	model::{MemberEmail, MemberId},
};

/// Boxed future returned by [`MembershipDirectory`] implementations.
pub type DirectoryFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Read-only lookup of plan-tier contracts by email.
///
/// Queried fresh for every request; callers never cache the result.
pub trait MembershipDirectory
where
	Self: Send + Sync,
{
	/// Returns the membership registered for `email`, if any.
	fn lookup<'a>(&'a self, email: &'a MemberEmail) -> DirectoryFuture<'a, Option<Membership>>;
}

/// Plan tiers a membership may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
	/// Entry tier.
	Basic,
	/// Middle tier.
	Standard,
	/// Top tier.
	Premium,
}
impl PlanTier {
	/// Every tier, lowest first.
	pub const ALL: [PlanTier; 3] = [PlanTier::Basic, PlanTier::Standard, PlanTier::Premium];

	/// Stable label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Basic => "basic",
			Self::Standard => "standard",
			Self::Premium => "premium",
		}
	}
}
impl Display for PlanTier {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Membership record with its plan-tier flags.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
	/// Directory-issued identifier.
	pub member_id: MemberId,
	/// Normalized email the record is registered under.
	pub email: MemberEmail,
	/// Basic tier flag.
	#[serde(default)]
	pub has_basic: bool,
	/// Standard tier flag.
	#[serde(default)]
	pub has_standard: bool,
	/// Premium tier flag.
	#[serde(default)]
	pub has_premium: bool,
}
impl Membership {
	/// Whether the record carries `tier`.
	pub fn has_tier(&self, tier: PlanTier) -> bool {
		match tier {
			PlanTier::Basic => self.has_basic,
			PlanTier::Standard => self.has_standard,
			PlanTier::Premium => self.has_premium,
		}
	}

	/// Tiers the record carries, lowest first.
	pub fn tiers(&self) -> Vec<PlanTier> {
		PlanTier::ALL.into_iter().filter(|tier| self.has_tier(*tier)).collect()
	}
}

/// Maps network names to the tiers that qualify for them.
///
/// Networks without a rule accept any tier; a membership with no tier at all never qualifies.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntitlementRules(BTreeMap<String, Vec<PlanTier>>);
impl EntitlementRules {
	/// Builds rules from `(network, tiers)` pairs.
	pub fn new<I, N, T>(rules: I) -> Self
	where
		I: IntoIterator<Item = (N, T)>,
		N: Into<String>,
		T: IntoIterator<Item = PlanTier>,
	{
		Self(rules.into_iter().map(|(n, t)| (n.into(), t.into_iter().collect())).collect())
	}

	/// Adds or replaces the rule for `network`.
	pub fn with_rule(
		mut self,
		network: impl Into<String>,
		tiers: impl IntoIterator<Item = PlanTier>,
	) -> Self {
		self.0.insert(network.into(), tiers.into_iter().collect());

		self
	}

	/// Tiers that qualify for `network`, or `None` when no rule exists.
	pub fn qualifying(&self, network: &str) -> Option<&[PlanTier]> {
		self.0.get(network).map(Vec::as_slice)
	}

	/// Whether `membership` may join `network`.
	pub fn is_entitled(&self, membership: &Membership, network: &str) -> bool {
		match self.qualifying(network) {
			Some(tiers) => tiers.iter().any(|tier| membership.has_tier(*tier)),
			None => PlanTier::ALL.into_iter().any(|tier| membership.has_tier(tier)),
		}
	}
}

/// In-process directory backed by a map, used for development and tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryDirectory(Arc<RwLock<HashMap<MemberEmail, Membership>>>);
impl MemoryDirectory {
	/// Loads a JSON array of memberships from `path`.
	pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let bytes = fs::read(path).map_err(|e| {
			Error::internal(format!("failed to read roster {}: {e}", path.display()))
		})?;

		Self::from_json_slice(&bytes)
	}

	/// Parses a JSON array of memberships.
	pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
		let mut de = serde_json::Deserializer::from_slice(bytes);
		let members: Vec<Membership> = serde_path_to_error::deserialize(&mut de)
			.map_err(|e| Error::internal(format!("invalid roster at {}: {}", e.path(), e.inner())))?;
		let directory = Self::default();

		for member in members {
			directory.insert(member);
		}

		Ok(directory)
	}

	/// Inserts or replaces a membership keyed by its email.
	pub fn insert(&self, membership: Membership) {
		self.0.write().insert(membership.email.clone(), membership);
	}

	/// Number of registered memberships.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Whether the directory is empty.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}
}
impl MembershipDirectory for MemoryDirectory {
	fn lookup<'a>(&'a self, email: &'a MemberEmail) -> DirectoryFuture<'a, Option<Membership>> {
		let found = self.0.read().get(email).cloned();

		Box::pin(async move { Ok(found) })
	}
}
